//! Outcome models
//!
//! Defines what an executor reports for one attempt and the recorded
//! outcome of one execution unit after retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::test_case::{TestCase, TestType};

/// Final status of one execution unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Passed,
    Failed,
}

impl OutcomeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "✓",
            OutcomeStatus::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Passed)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Passed => write!(f, "PASSED"),
            OutcomeStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// What a test executor returns for a single attempt
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub detail: String,
    pub error_message: Option<String>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub screenshot_path: Option<String>,
}

impl ExecutionReport {
    pub fn passed(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
            ..Default::default()
        }
    }

    pub fn failed(detail: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_response(mut self, status_code: u16, body: impl Into<String>) -> Self {
        self.status_code = Some(status_code);
        self.response_body = Some(body.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }
}

/// HTTP response captured for API units
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

/// Recorded result of one execution unit
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub test_case_id: String,
    pub test_type: TestType,
    pub functionality: String,
    pub status: OutcomeStatus,
    pub detail: String,
    pub error_message: Option<String>,
    pub response: Option<ApiResponse>,
    pub screenshot_path: Option<String>,

    /// Executor invocations made, including the first
    pub attempts: u32,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Outcome {
    /// Build the outcome from the report of the deciding attempt
    pub fn from_report(
        case: &TestCase,
        report: ExecutionReport,
        attempts: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let response = report.status_code.map(|status_code| ApiResponse {
            status_code,
            body: report.response_body.unwrap_or_default(),
        });

        Self {
            test_case_id: case.id.clone(),
            test_type: case.test_type,
            functionality: case.functionality.clone(),
            status: if report.success {
                OutcomeStatus::Passed
            } else {
                OutcomeStatus::Failed
            },
            detail: report.detail,
            error_message: report.error_message,
            response,
            screenshot_path: report.screenshot_path,
            attempts,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
        }
    }

    /// Outcome for an attempt where the executor itself errored
    pub fn from_error(
        case: &TestCase,
        error: impl Into<String>,
        attempts: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        let error = error.into();
        let report = ExecutionReport::failed(format!("Executor error: {error}"), error);
        Self::from_report(case, report, attempts, started_at)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {} [{}ms, {} attempt(s)]",
            self.status.symbol(),
            self.test_case_id,
            self.test_type,
            self.functionality,
            self.duration_ms,
            self.attempts
        )?;
        if let Some(err) = &self.error_message {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
