//! API test executor
//!
//! Sends the HTTP request described by the payload and checks the status
//! code and, optionally, the body.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::TestExecutor;
use crate::http::{HttpClient, HttpRequest};
use crate::models::ExecutionReport;

/// Payload of an API test case
#[derive(Clone, Debug, Deserialize)]
struct ApiCheck {
    #[serde(flatten)]
    request: HttpRequest,

    /// Any 2xx passes when unset
    #[serde(default)]
    expected_status: Option<u16>,

    #[serde(default)]
    expected_body_contains: Option<String>,
}

/// Executes API test cases over HTTP
#[derive(Clone, Debug)]
pub struct ApiTestExecutor {
    base_url: Option<String>,
    default_timeout_secs: u64,
}

impl ApiTestExecutor {
    pub fn new(base_url: Option<String>, default_timeout_secs: u64) -> Result<Self> {
        if let Some(url) = &base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("API base URL must be http(s): {url}");
            }
        }
        Ok(Self {
            base_url,
            default_timeout_secs,
        })
    }

    fn effective_timeout(&self, timeout: Duration) -> Duration {
        if timeout.is_zero() {
            Duration::from_secs(self.default_timeout_secs)
        } else {
            timeout
        }
    }
}

impl TestExecutor for ApiTestExecutor {
    fn name(&self) -> &str {
        "api"
    }

    fn execute(
        &self,
        functionality: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<ExecutionReport> {
        let check: ApiCheck = serde_json::from_value(payload.clone())
            .with_context(|| format!("Invalid API payload for '{functionality}'"))?;

        let client = HttpClient::with_timeout(self.effective_timeout(timeout))?
            .base_url(self.base_url.clone());
        let response = client.send(&check.request)?;

        debug!(
            functionality = %functionality,
            status = response.status_code,
            "API check responded in {}ms",
            response.duration_ms
        );

        let status_ok = match check.expected_status {
            Some(expected) => response.status_code == expected,
            None => response.is_success(),
        };
        let body_ok = check
            .expected_body_contains
            .as_deref()
            .map(|text| response.body_contains(text))
            .unwrap_or(true);

        let summary = format!(
            "{} {} -> {} in {}ms",
            check.request.method.to_uppercase(),
            check.request.url,
            response.status_code,
            response.duration_ms
        );

        let report = if status_ok && body_ok {
            ExecutionReport::passed(summary)
        } else if !status_ok {
            let expected = check
                .expected_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "2xx".to_string());
            ExecutionReport::failed(
                summary,
                format!("Expected status {expected}, got {}", response.status_code),
            )
        } else {
            ExecutionReport::failed(
                summary,
                format!(
                    "Response body does not contain '{}'",
                    check.expected_body_contains.unwrap_or_default()
                ),
            )
        };

        Ok(report.with_response(response.status_code, response.body))
    }
}
