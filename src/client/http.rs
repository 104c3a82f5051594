//! Conditional HTTP client
//!
//! Provides the unified HTTP entry point for all remote calls with:
//! - Response caching against the `expires` header
//! - Conditional revalidation via `If-None-Match` entity tags
//! - Retry logic for transient failures with increasing backoff
//! - Rate-budget telemetry from response headers

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey, HttpCache};
use crate::client::pool::RequestPool;
use crate::client::{ApiResponse, ClientError, ClientResult, RequestJob};
use crate::config::{retry_backoff, CACHE_TTL_FLOOR_SECS, MAX_ATTEMPTS};
use crate::metrics;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Fail with [`ClientError::Remote`] on a 4xx/5xx response instead of
    /// returning it for inspection.
    pub raise_on_error: bool,
    /// Opaque bearer credential attached as an `Authorization` header.
    pub bearer_token: Option<String>,
}

impl RequestOptions {
    /// Options that surface remote rejections as errors.
    pub fn strict() -> Self {
        Self {
            raise_on_error: true,
            bearer_token: None,
        }
    }

    /// Attach a bearer credential.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// HTTP client with conditional caching and retry.
///
/// Constructed once per process around a shared [`reqwest::Client`] and
/// passed by reference into every component that issues requests.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<Client>,
    cache: Arc<dyn HttpCache>,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `http` - Shared HTTP client (Arc for cheap cloning)
    /// * `cache` - Response cache backend
    pub fn new(http: Arc<Client>, cache: Arc<dyn HttpCache>) -> Self {
        Self { http, cache }
    }

    /// Execute a GET request.
    pub async fn get(&self, url: &str, opts: &RequestOptions) -> ClientResult<ApiResponse> {
        self.request(Method::GET, url, &[], None, opts).await
    }

    /// Execute a request with caching, revalidation and retry.
    ///
    /// GET responses are cached against their `expires` header; mutating
    /// methods (POST/PUT/DELETE/HEAD) are never cached. Transient failures
    /// (connection errors, timeouts, 5xx) are retried up to a fixed attempt
    /// ceiling before failing with [`ClientError::Transport`].
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<Bytes>,
        opts: &RequestOptions,
    ) -> ClientResult<ApiResponse> {
        let key = CacheKey::for_request(method.as_str(), url);
        let cacheable = method == Method::GET;

        let mut stale = None;
        if cacheable {
            if let Some(entry) = self.cache.get(&key) {
                debug!(url, "serving response from cache");
                metrics::record_cache_hit();
                return Ok(response_from_entry(&entry));
            }
            match self.cache.peek(&key) {
                Some(expired) if expired.header("etag").is_some() => stale = Some(expired),
                Some(_) => self.cache.invalidate(&key),
                None => {}
            }
        }

        let validator = stale
            .as_ref()
            .and_then(|entry| entry.header("etag"))
            .map(str::to_string);

        let response = self
            .send_with_retry(method.clone(), url, headers, validator.as_deref(), &body, opts)
            .await?;

        if let Some(warning) = response.header("warning") {
            warn!(url = %response.url, warning, "remote warning header");
        }

        if response.status == StatusCode::NOT_MODIFIED.as_u16() {
            if let Some(entry) = stale {
                // The cached body is still authoritative; only the expiry
                // moves, taken from the fresh response headers.
                let ttl = ttl_from_expires(response.header("expires"));
                self.cache.set(key, entry.clone(), ttl);
                debug!(url, ttl, "revalidated cached response");
                return Ok(response_from_entry(&entry));
            }
        }

        if cacheable && response.is_success() {
            let ttl = ttl_from_expires(response.header("expires"));
            let entry = CacheEntry {
                status: response.status,
                headers: response.headers().to_vec(),
                body: response.body.clone(),
                url: response.url.clone(),
                expires_at: Utc::now(),
            };
            self.cache.set(key, entry, ttl);
        }

        if opts.raise_on_error && response.status >= 400 {
            return Err(ClientError::Remote {
                status: response.status,
                url: response.url,
            });
        }

        Ok(response)
    }

    /// Send multiple independent jobs in parallel.
    ///
    /// Returns one `(job, result)` pair per input job, in completion order;
    /// a single job's failure never aborts its siblings.
    pub async fn multi_request(
        &self,
        jobs: Vec<RequestJob>,
        parallelism: usize,
    ) -> Vec<(RequestJob, ClientResult<ApiResponse>)> {
        let client = self.clone();
        RequestPool::new(parallelism)
            .run(jobs, move |job: RequestJob| {
                let client = client.clone();
                async move {
                    client
                        .request(
                            job.method.clone(),
                            &job.url,
                            &job.headers,
                            job.body.clone(),
                            &RequestOptions::default(),
                        )
                        .await
                }
            })
            .await
    }

    /// Retry loop for transient failures.
    ///
    /// Retries on:
    /// - Connection errors and timeouts
    /// - 5xx server errors
    ///
    /// Does not retry on:
    /// - 4xx client errors (the caller decides what they mean)
    /// - Successful and not-modified responses
    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        validator: Option<&str>,
        body: &Option<Bytes>,
        opts: &RequestOptions,
    ) -> ClientResult<ApiResponse> {
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self.http.request(method.clone(), url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(etag) = validator {
                request = request.header(reqwest::header::IF_NONE_MATCH, etag);
            }
            if let Some(token) = &opts.bearer_token {
                request = request.bearer_auth(token);
            }
            if let Some(bytes) = body {
                request = request.body(bytes.clone());
            }

            metrics::record_request();

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    warn!(url, attempt, error = %e, "connection failure");
                    last_error = Some(ClientError::Transport(e.to_string()));
                    if attempt < MAX_ATTEMPTS {
                        metrics::record_retry();
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    break;
                }
                Err(e) => return Err(ClientError::Transport(e.to_string())),
            };

            let status = response.status();
            if status.is_server_error() {
                warn!(url, attempt, status = status.as_u16(), "server error");
                last_error = Some(ClientError::Transport(format!(
                    "server error {status} for {url}"
                )));
                if attempt < MAX_ATTEMPTS {
                    metrics::record_retry();
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    continue;
                }
                break;
            }

            let status = status.as_u16();
            let final_url = response.url().to_string();
            let response_headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_ascii_lowercase(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();

            match response.bytes().await {
                Ok(bytes) => {
                    debug!(url, attempt, status, "request succeeded");
                    return Ok(ApiResponse::new(
                        status,
                        final_url,
                        response_headers,
                        bytes,
                        false,
                    ));
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "failed to read response body");
                    last_error = Some(ClientError::Transport(e.to_string()));
                    if attempt < MAX_ATTEMPTS {
                        metrics::record_retry();
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Transport("all attempts exhausted".to_string())))
    }
}

fn response_from_entry(entry: &CacheEntry) -> ApiResponse {
    ApiResponse::new(
        entry.status,
        entry.url.clone(),
        entry.headers.clone(),
        entry.body.clone(),
        true,
    )
}

/// Compute a cache lifetime in seconds from an `expires` header value.
///
/// Absent or unparseable headers fall back to the fixed floor; a header in
/// the past yields a non-positive ttl, which stores an already-expired entry.
fn ttl_from_expires(expires: Option<&str>) -> i64 {
    match expires.and_then(|value| DateTime::parse_from_rfc2822(value).ok()) {
        Some(when) => (when.with_timezone(&Utc) - Utc::now()).num_seconds(),
        None => CACHE_TTL_FLOOR_SECS,
    }
}
