//! Configuration module
//!
//! Handles loading and managing configuration. Precedence, lowest first:
//! built-in defaults, config file, `QA_ORCH_*` environment, CLI flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::engine::{Strategy, DEFAULT_BACKLOG};
use crate::models::is_yaml_file;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Strategy used when the CLI does not name one
    pub default_strategy: Strategy,

    /// Run units concurrently by default
    pub parallel: bool,

    /// Requested worker count for parallel runs
    pub pool_size: usize,

    /// Pause between attempts of a failing unit
    pub retry_backoff_ms: u64,

    /// Units that may queue for a worker before the dispatcher runs them itself
    pub backlog_capacity: usize,

    /// How long a stopping run waits for in-flight units
    pub shutdown_grace_secs: u64,

    /// Interval between status polls while waiting on a run
    pub status_poll_ms: u64,

    /// Where outcomes and run snapshots are written
    pub results_dir: Option<PathBuf>,

    /// Base URL joined with relative API paths
    pub api_base_url: Option<String>,

    /// W3C WebDriver endpoint for UI cases
    pub webdriver_url: String,

    /// Where UI screenshots are written
    pub screenshot_dir: PathBuf,

    /// Default HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::Balanced,
            parallel: true,
            pool_size: 4,
            retry_backoff_ms: 1000,
            backlog_capacity: DEFAULT_BACKLOG,
            shutdown_grace_secs: 5,
            status_poll_ms: 500,
            results_dir: None,
            api_base_url: None,
            webdriver_url: "http://localhost:4444".to_string(),
            screenshot_dir: PathBuf::from("screenshots"),
            http_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Resolve the effective configuration: `explicit` file or the first
    /// standard location, then environment overrides
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvConfig::load();
        let from_env = env.config_file.as_ref().map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => ConfigFile::load(&path)?.app,
            None => ConfigFile::load_default()?.app,
        };

        config.apply_env(&env);
        config.validate()?;
        Ok(config)
    }

    /// Overlay values set in the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(strategy) = &env.strategy {
            self.default_strategy = Strategy::parse_lenient(strategy);
        }
        if let Some(parallel) = env.parallel {
            self.parallel = parallel;
        }
        if let Some(pool_size) = env.pool_size {
            self.pool_size = pool_size;
        }
        if let Some(backoff) = env.retry_backoff_ms {
            self.retry_backoff_ms = backoff;
        }
        if let Some(dir) = &env.results_dir {
            self.results_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = &env.api_base_url {
            self.api_base_url = Some(url.clone());
        }
        if let Some(url) = &env.webdriver_url {
            self.webdriver_url = url.clone();
        }
        if let Some(dir) = &env.screenshot_dir {
            self.screenshot_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = env.http_timeout_secs {
            self.http_timeout_secs = timeout;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.backlog_capacity == 0 {
            anyhow::bail!("backlog_capacity must be at least 1");
        }
        if self.status_poll_ms == 0 {
            anyhow::bail!("status_poll_ms must be at least 1");
        }
        if !is_http_url(&self.webdriver_url) {
            anyhow::bail!("webdriver_url must be http(s): {}", self.webdriver_url);
        }
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                anyhow::bail!("api_base_url must be http(s): {url}");
            }
        }
        if self.pool_size == 0 && self.parallel {
            warn!("pool_size is 0; parallel runs will fail to schedule");
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_strategy, Strategy::Balanced);
        assert_eq!(config.backlog_capacity, 100);
        assert_eq!(config.status_poll_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "default_strategy: TYPE_GROUPED\npool_size: 12\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.default_strategy, Strategy::TypeGrouped);
        assert_eq!(config.pool_size, 12);
        assert_eq!(config.shutdown_grace_secs, 5);
    }

    #[test]
    fn test_save_load_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig {
            api_base_url: Some("https://shop.example.com".to_string()),
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_zero_backlog_and_poll() {
        let zero_backlog = AppConfig {
            backlog_capacity: 0,
            ..Default::default()
        };
        assert!(zero_backlog.validate().is_err());

        let zero_poll = AppConfig {
            status_poll_ms: 0,
            ..Default::default()
        };
        assert!(zero_poll.validate().is_err());

        let bad_url = AppConfig {
            webdriver_url: "localhost:4444".to_string(),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            strategy: Some("priority".to_string()),
            parallel: Some(false),
            pool_size: Some(2),
            webdriver_url: Some("http://grid:4444".to_string()),
            ..Default::default()
        };

        config.apply_env(&env);
        assert_eq!(config.default_strategy, Strategy::PriorityBased);
        assert!(!config.parallel);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.webdriver_url, "http://grid:4444");
        assert_eq!(config.http_timeout_secs, 30);
    }
}
