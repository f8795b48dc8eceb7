//! HTTP client for executor checks
//!
//! Blocking client used from executor threads. Executors build one per
//! attempt so the test case timeout applies to the whole attempt.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0}ms")]
    Timeout(u128),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// HTTP client for checks
pub struct HttpClient {
    client: Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: None,
            timeout,
        })
    }

    /// Set base URL for relative request paths
    pub fn base_url(mut self, url: Option<String>) -> Self {
        self.base_url = url;
        self
    }

    /// Build full URL
    fn build_url(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            )),
            None => Err(HttpError::InvalidUrl(path.to_string()).into()),
        }
    }

    /// Send HTTP request
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = self.build_url(&request.url)?;
        debug!("Sending {} request to {}", request.method, url);

        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .context("Invalid HTTP method")?;

        let mut req_builder = self.client.request(method, &url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        req_builder = match &request.body {
            Some(serde_json::Value::String(raw)) => req_builder.body(raw.clone()),
            Some(json) => req_builder.json(json),
            None => req_builder,
        };

        let start = Instant::now();

        let response = req_builder.send().map_err(|e| {
            if e.is_timeout() {
                anyhow::anyhow!(HttpError::Timeout(self.timeout.as_millis()))
            } else if e.is_connect() {
                anyhow::anyhow!(HttpError::ConnectionRefused(url.clone()))
            } else {
                anyhow::anyhow!(HttpError::RequestFailed(e.to_string()))
            }
        })?;

        let status = response.status();
        let mut headers = BTreeMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response.text().context("Failed to read response body")?;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers,
            body,
            duration_ms,
        })
    }

    /// Send a JSON request and parse the JSON reply
    pub fn send_json(
        &self,
        method: &str,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(u16, serde_json::Value)> {
        let request = HttpRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
            body,
        };
        let response = self.send(&request)?;
        let json = if response.body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            response.json()?
        };
        Ok((response.status_code, json))
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// HTTP request definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(alias = "path")]
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// A string is sent verbatim, anything else as JSON
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn body_contains(&self, text: &str) -> bool {
        self.body.contains(text)
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body).context("Response body is not valid JSON")
    }
}
