//! HTTP client module
//!
//! Provides the blocking HTTP plumbing shared by the API and UI executors.

mod client;

pub use client::{HttpClient, HttpError, HttpRequest, HttpResponse};
