//! Conditional HTTP client and concurrent request pool
//!
//! [`ApiClient`] wraps a shared [`reqwest::Client`] with conditional caching,
//! transient-failure retry and rate-budget telemetry. [`RequestPool`] fans
//! independent jobs out with bounded parallelism and per-job error isolation.

use bytes::Bytes;
use reqwest::Method;

use crate::config;

pub mod http;
pub mod pool;

pub use http::{ApiClient, RequestOptions};
pub use pool::RequestPool;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network-level failure after exhausting retries
    #[error("transport error: {0}")]
    Transport(String),

    /// Explicit rejection by the remote, surfaced when the caller opted in
    #[error("remote error {status} for {url}")]
    Remote {
        /// HTTP status code of the rejection
        status: u16,
        /// URL that was rejected
        url: String,
    },

    /// Response shape did not match expectations
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation was cancelled before completion
    #[error("request cancelled")]
    Cancelled,
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// A description of one HTTP call, independent of all other jobs in its batch.
#[derive(Debug, Clone)]
pub struct RequestJob {
    /// HTTP method
    pub method: Method,
    /// Fully-built URL, query string included
    pub url: String,
    /// Additional request headers
    pub headers: Vec<(String, String)>,
    /// Request body, for mutating methods
    pub body: Option<Bytes>,
}

impl RequestJob {
    /// Convenience constructor for a GET job.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// One HTTP response as seen by callers, whether it came from the network
/// or from the cache.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Response status code
    pub status: u16,
    /// URL the response answers for
    pub url: String,
    /// Response body
    pub body: Bytes,
    /// Whether the body was served from the cache
    pub from_cache: bool,
    headers: Vec<(String, String)>,
}

impl ApiResponse {
    pub(crate) fn new(
        status: u16,
        url: String,
        headers: Vec<(String, String)>,
        body: Bytes,
        from_cache: bool,
    ) -> Self {
        Self {
            status,
            url,
            body,
            from_cache,
            headers,
        }
    }

    /// Look up a response header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Total page count advertised by the remote, if present and well-formed.
    pub fn page_count(&self) -> Option<u32> {
        self.header(config::HEADER_PAGES)?.trim().parse().ok()
    }

    /// Remaining error budget advertised by the remote, if present and
    /// well-formed.
    pub fn error_limit_remain(&self) -> Option<u32> {
        self.header(config::HEADER_ERROR_LIMIT)?.trim().parse().ok()
    }

    /// Deserialize the body, failing fast on shape mismatch.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::Validation(format!("failed to deserialize {}: {e}", self.url))
        })
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
