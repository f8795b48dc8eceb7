//! Test case models
//!
//! Defines the caller-owned test case input and the suite files it is loaded from.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Category of a test case, selecting the executor that runs it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestType {
    Ui,
    Api,
}

impl TestType {
    pub fn name(&self) -> &'static str {
        match self {
            TestType::Ui => "UI",
            TestType::Api => "API",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ui" | "web" | "browser" => Some(TestType::Ui),
            "api" | "http" | "rest" => Some(TestType::Api),
            _ => None,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Scheduling priority of a test case
///
/// Ordered so that `High > Medium > Low`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    /// Tiers from most to least urgent
    pub fn descending() -> [Priority; 3] {
        [Priority::High, Priority::Medium, Priority::Low]
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// A single UI or API check to run against the target application
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Caller-assigned identifier
    pub id: String,

    /// Category, decides which executor handles the case
    #[serde(rename = "type")]
    pub test_type: TestType,

    /// Functionality under test, passed through to the executor
    pub functionality: String,

    /// Executor-specific payload
    #[serde(default)]
    pub data: serde_json::Value,

    /// Advisory timeout, enforced by the executor
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first failure
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub priority: Priority,
}

impl TestCase {
    pub fn new(id: impl Into<String>, test_type: TestType, functionality: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            test_type,
            functionality: functionality.into(),
            data: serde_json::Value::Null,
            timeout_secs: default_timeout_secs(),
            retry_count: 0,
            priority: Priority::default(),
        }
    }

    pub fn ui(id: impl Into<String>, functionality: impl Into<String>) -> Self {
        Self::new(id, TestType::Ui, functionality)
    }

    pub fn api(id: impl Into<String>, functionality: impl Into<String>) -> Self {
        Self::new(id, TestType::Api, functionality)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} ({})",
            self.id, self.test_type, self.functionality, self.priority
        )
    }
}

/// A file of test cases, in YAML or JSON
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    /// Load a suite, picking the format from the file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        let suite: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML suite: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON suite: {}", path.display()))?
        };

        suite.validate()?;
        Ok(suite)
    }

    /// Reject suites whose case identifiers collide
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for case in &self.test_cases {
            if case.id.is_empty() {
                anyhow::bail!("Test case with empty id in suite '{}'", self.name);
            }
            if !seen.insert(case.id.as_str()) {
                anyhow::bail!("Duplicate test case id '{}' in suite '{}'", case.id, self.name);
            }
        }
        Ok(())
    }

    pub fn count_by_type(&self, test_type: TestType) -> usize {
        self.test_cases
            .iter()
            .filter(|c| c.test_type == test_type)
            .count()
    }
}

pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
