//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "QA_ORCH";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Strategy from QA_ORCH_STRATEGY
    pub strategy: Option<String>,
    /// Parallel from QA_ORCH_PARALLEL
    pub parallel: Option<bool>,
    /// Pool size from QA_ORCH_POOL_SIZE
    pub pool_size: Option<usize>,
    /// Retry backoff from QA_ORCH_RETRY_BACKOFF_MS
    pub retry_backoff_ms: Option<u64>,
    /// Results directory from QA_ORCH_RESULTS_DIR
    pub results_dir: Option<String>,
    /// API base URL from QA_ORCH_API_BASE_URL
    pub api_base_url: Option<String>,
    /// WebDriver URL from QA_ORCH_WEBDRIVER_URL
    pub webdriver_url: Option<String>,
    /// Screenshot directory from QA_ORCH_SCREENSHOT_DIR
    pub screenshot_dir: Option<String>,
    /// HTTP timeout from QA_ORCH_HTTP_TIMEOUT
    pub http_timeout_secs: Option<u64>,
    /// Config file from QA_ORCH_CONFIG
    pub config_file: Option<String>,
    /// Output format from QA_ORCH_FORMAT
    pub format: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            strategy: get_env("STRATEGY"),
            parallel: get_env_bool("PARALLEL"),
            pool_size: get_env_parse("POOL_SIZE"),
            retry_backoff_ms: get_env_parse("RETRY_BACKOFF_MS"),
            results_dir: get_env("RESULTS_DIR"),
            api_base_url: get_env("API_BASE_URL"),
            webdriver_url: get_env("WEBDRIVER_URL"),
            screenshot_dir: get_env("SCREENSHOT_DIR"),
            http_timeout_secs: get_env_parse("HTTP_TIMEOUT"),
            config_file: get_env("CONFIG"),
            format: get_env("FORMAT"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.strategy.is_some()
            || self.parallel.is_some()
            || self.pool_size.is_some()
            || self.retry_backoff_ms.is_some()
            || self.results_dir.is_some()
            || self.api_base_url.is_some()
            || self.webdriver_url.is_some()
            || self.screenshot_dir.is_some()
            || self.http_timeout_secs.is_some()
            || self.config_file.is_some()
            || self.format.is_some()
    }

    /// Get output format with fallback
    pub fn format_or(&self, default: &str) -> String {
        self.format.clone().unwrap_or_else(|| default.to_string())
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_STRATEGY:       {:?}", ENV_PREFIX, self.strategy);
        println!("  {}_PARALLEL:       {:?}", ENV_PREFIX, self.parallel);
        println!("  {}_POOL_SIZE:      {:?}", ENV_PREFIX, self.pool_size);
        println!("  {}_RETRY_BACKOFF_MS: {:?}", ENV_PREFIX, self.retry_backoff_ms);
        println!("  {}_RESULTS_DIR:    {:?}", ENV_PREFIX, self.results_dir);
        println!("  {}_API_BASE_URL:   {:?}", ENV_PREFIX, self.api_base_url);
        println!("  {}_WEBDRIVER_URL:  {:?}", ENV_PREFIX, self.webdriver_url);
        println!("  {}_SCREENSHOT_DIR: {:?}", ENV_PREFIX, self.screenshot_dir);
        println!("  {}_HTTP_TIMEOUT:   {:?}", ENV_PREFIX, self.http_timeout_secs);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_FORMAT:         {:?}", ENV_PREFIX, self.format);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all QA_ORCH environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_STRATEGY          Default strategy (balanced, type_grouped, priority_based, sequential)");
    println!("  {ENV_PREFIX}_PARALLEL          Run units concurrently (true/false)");
    println!("  {ENV_PREFIX}_POOL_SIZE         Requested worker count");
    println!("  {ENV_PREFIX}_RETRY_BACKOFF_MS  Pause between attempts");
    println!("  {ENV_PREFIX}_RESULTS_DIR       Directory for stored runs");
    println!("  {ENV_PREFIX}_API_BASE_URL      Base URL for relative API paths");
    println!("  {ENV_PREFIX}_WEBDRIVER_URL     WebDriver endpoint for UI cases");
    println!("  {ENV_PREFIX}_SCREENSHOT_DIR    Directory for UI screenshots");
    println!("  {ENV_PREFIX}_HTTP_TIMEOUT      Default HTTP timeout in seconds");
    println!("  {ENV_PREFIX}_CONFIG            Path to configuration file");
    println!("  {ENV_PREFIX}_FORMAT            Output format (table, json, summary)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WEBDRIVER_URL=http://selenium:4444");
    println!("  qa-orchestrator run suite.yaml --parallel");
}
