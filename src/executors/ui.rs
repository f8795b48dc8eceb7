//! UI test executor
//!
//! Drives a browser through a W3C WebDriver endpoint: open a session,
//! navigate, optionally check an element's text, capture a screenshot and
//! close the session again.

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::TestExecutor;
use crate::http::HttpClient;
use crate::models::ExecutionReport;

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Used when a case carries a zero timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_browser() -> String {
    "chrome".to_string()
}

/// Payload of a UI test case
#[derive(Clone, Debug, Deserialize)]
struct UiCheck {
    url: String,

    /// CSS selector of the element to inspect
    #[serde(default)]
    selector: Option<String>,

    #[serde(default)]
    expected_text: Option<String>,

    /// Capture a screenshot even when the check passes
    #[serde(default)]
    screenshot: bool,

    #[serde(default = "default_browser")]
    browser: String,
}

/// Executes UI test cases against a WebDriver server
#[derive(Clone, Debug)]
pub struct UiTestExecutor {
    webdriver_url: String,
    screenshot_dir: PathBuf,
}

impl UiTestExecutor {
    pub fn new(webdriver_url: &str, screenshot_dir: impl AsRef<Path>) -> Result<Self> {
        if !webdriver_url.starts_with("http://") && !webdriver_url.starts_with("https://") {
            anyhow::bail!("WebDriver URL must be http(s): {webdriver_url}");
        }
        Ok(Self {
            webdriver_url: webdriver_url.trim_end_matches('/').to_string(),
            screenshot_dir: screenshot_dir.as_ref().to_path_buf(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.webdriver_url, path)
    }

    fn open_session(&self, client: &HttpClient, browser: &str) -> Result<String> {
        let body = json!({"capabilities": {"alwaysMatch": {"browserName": browser}}});
        let (status, reply) = client.send_json("POST", &self.endpoint("/session"), Some(body))?;
        let value = webdriver_value(status, reply).context("Failed to open WebDriver session")?;

        value["sessionId"]
            .as_str()
            .map(str::to_string)
            .context("WebDriver reply has no sessionId")
    }

    fn close_session(&self, client: &HttpClient, session: &str) {
        let url = self.endpoint(&format!("/session/{session}"));
        if let Err(e) = client.send_json("DELETE", &url, None) {
            warn!(session = %session, "Failed to close WebDriver session: {:#}", e);
        }
    }

    fn command(
        &self,
        client: &HttpClient,
        method: &str,
        session: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = self.endpoint(&format!("/session/{session}{path}"));
        let (status, reply) = client.send_json(method, &url, body)?;
        webdriver_value(status, reply)
    }

    /// Navigate and check, returning the pass/fail report without screenshot
    fn check(&self, client: &HttpClient, session: &str, check: &UiCheck) -> Result<ExecutionReport> {
        self.command(client, "POST", session, "/url", Some(json!({"url": check.url})))?;

        let Some(selector) = &check.selector else {
            return Ok(ExecutionReport::passed(format!("Loaded {}", check.url)));
        };

        let element = self.command(
            client,
            "POST",
            session,
            "/element",
            Some(json!({"using": "css selector", "value": selector})),
        );
        let element_id = match element {
            Ok(value) => value[ELEMENT_KEY]
                .as_str()
                .map(str::to_string)
                .context("WebDriver element reply has no element id")?,
            Err(e) => {
                return Ok(ExecutionReport::failed(
                    format!("Element '{selector}' not found on {}", check.url),
                    format!("{e:#}"),
                ));
            }
        };

        let text_value =
            self.command(client, "GET", session, &format!("/element/{element_id}/text"), None)?;
        let text = text_value.as_str().unwrap_or_default();

        match &check.expected_text {
            Some(expected) if !text.contains(expected.as_str()) => Ok(ExecutionReport::failed(
                format!("Element '{selector}' text mismatch on {}", check.url),
                format!("Expected text containing '{expected}', got '{text}'"),
            )),
            _ => Ok(ExecutionReport::passed(format!(
                "Element '{selector}' found on {}",
                check.url
            ))),
        }
    }

    fn save_screenshot(&self, client: &HttpClient, session: &str, functionality: &str) -> Result<PathBuf> {
        let encoded = self.command(client, "GET", session, "/screenshot", None)?;
        let bytes = general_purpose::STANDARD
            .decode(encoded.as_str().unwrap_or_default())
            .context("Screenshot is not valid base64")?;

        std::fs::create_dir_all(&self.screenshot_dir).with_context(|| {
            format!(
                "Failed to create screenshot directory: {}",
                self.screenshot_dir.display()
            )
        })?;

        let path = self.screenshot_dir.join(screenshot_file_name(functionality));
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write screenshot: {}", path.display()))?;
        Ok(path)
    }
}

impl TestExecutor for UiTestExecutor {
    fn name(&self) -> &str {
        "ui"
    }

    fn execute(&self, functionality: &str, payload: &Value, timeout: Duration) -> Result<ExecutionReport> {
        let check: UiCheck = serde_json::from_value(payload.clone())
            .with_context(|| format!("Invalid UI payload for '{functionality}'"))?;

        let timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        let client = HttpClient::with_timeout(timeout)?;
        let session = self.open_session(&client, &check.browser)?;
        debug!(session = %session, functionality = %functionality, "WebDriver session opened");

        let result = self.check(&client, &session, &check);

        let wants_screenshot = check.screenshot || !matches!(&result, Ok(r) if r.success);
        let screenshot = if wants_screenshot {
            match self.save_screenshot(&client, &session, functionality) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(functionality = %functionality, "Screenshot failed: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        self.close_session(&client, &session);

        let report = result?;
        Ok(match screenshot {
            Some(path) => report.with_screenshot(path.display().to_string()),
            None => report,
        })
    }
}

/// Unwrap the `value` member of a WebDriver reply, turning errors into `Err`
fn webdriver_value(status: u16, reply: Value) -> Result<Value> {
    let value = reply.get("value").cloned().unwrap_or(Value::Null);
    if (200..300).contains(&status) {
        return Ok(value);
    }
    let error = value["error"].as_str().unwrap_or("unknown error");
    let message = value["message"].as_str().unwrap_or_default();
    anyhow::bail!("WebDriver returned {status}: {error} {message}")
}

fn screenshot_file_name(functionality: &str) -> String {
    let slug: String = functionality
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}.png", slug, Utc::now().format("%Y%m%d_%H%M%S%3f"))
}
