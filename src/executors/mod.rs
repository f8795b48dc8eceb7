//! Test executors
//!
//! One implementation per test category behind the [`TestExecutor`]
//! capability. The engine picks the executor by category through an
//! [`ExecutorSet`]; adding a category means adding one implementation.

mod api;
mod ui;

pub use api::ApiTestExecutor;
pub use ui::UiTestExecutor;

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::{ExecutionReport, TestType};

/// Performs a single check
///
/// Calls are synchronous and may block for as long as the check takes. The
/// engine runs them on the blocking thread pool and turns errors and panics
/// into failed outcomes.
pub trait TestExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Run `functionality` with `payload`, honouring the advisory `timeout`
    fn execute(
        &self,
        functionality: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ExecutionReport>;
}

/// Executors keyed by the category they handle
#[derive(Clone, Default)]
pub struct ExecutorSet {
    executors: HashMap<TestType, Arc<dyn TestExecutor>>,
}

impl ExecutorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `test_type`, replacing any previous one
    pub fn with(mut self, test_type: TestType, executor: Arc<dyn TestExecutor>) -> Self {
        self.executors.insert(test_type, executor);
        self
    }

    /// Build the HTTP-backed UI and API executors from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api = ApiTestExecutor::new(config.api_base_url.clone(), config.http_timeout_secs)?;
        let ui = UiTestExecutor::new(&config.webdriver_url, &config.screenshot_dir)?;

        Ok(Self::new()
            .with(TestType::Api, Arc::new(api))
            .with(TestType::Ui, Arc::new(ui)))
    }

    pub fn get(&self, test_type: TestType) -> Option<Arc<dyn TestExecutor>> {
        self.executors.get(&test_type).cloned()
    }

    pub fn supports(&self, test_type: TestType) -> bool {
        self.executors.contains_key(&test_type)
    }
}

impl fmt::Debug for ExecutorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(String, &str)> = self
            .executors
            .iter()
            .map(|(t, e)| (t.to_string(), e.name()))
            .collect();
        entries.sort();
        f.debug_map().entries(entries).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl TestExecutor for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn execute(
            &self,
            functionality: &str,
            _payload: &serde_json::Value,
            _timeout: Duration,
        ) -> Result<ExecutionReport> {
            Ok(ExecutionReport::passed(functionality))
        }
    }

    #[test]
    fn test_executor_set_lookup() {
        let set = ExecutorSet::new().with(TestType::Api, Arc::new(Fixed));
        assert!(set.supports(TestType::Api));
        assert!(!set.supports(TestType::Ui));

        let report = set
            .get(TestType::Api)
            .unwrap()
            .execute("ping", &serde_json::Value::Null, Duration::from_secs(1))
            .unwrap();
        assert_eq!(report.detail, "ping");
        assert_eq!(format!("{set:?}"), "{\"API\": \"fixed\"}");
    }

    #[test]
    fn test_from_config_registers_both_categories() {
        let set = ExecutorSet::from_config(&AppConfig::default()).unwrap();
        assert!(set.supports(TestType::Api));
        assert!(set.supports(TestType::Ui));
    }
}
