//! Production observability metrics for the sync engine
//!
//! Tracks HTTP volume, retry and throttle behavior, cache effectiveness and
//! sink throughput. Recording is a no-op until [`init_metrics`] installs the
//! Prometheus exporter, so the library can be used without it.

use metrics::{counter, describe_counter, Unit};
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the metrics system with a Prometheus exporter.
///
/// Called once at application startup; idempotent thereafter.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "sync_http_requests_total",
        Unit::Count,
        "Total number of HTTP requests sent to the remote API"
    );

    describe_counter!(
        "sync_http_retries_total",
        Unit::Count,
        "Total number of retry attempts after transient failures"
    );

    describe_counter!(
        "sync_cache_hits_total",
        Unit::Count,
        "Total number of responses served from the cache"
    );

    describe_counter!(
        "sync_throttle_events_total",
        Unit::Count,
        "Total number of throttle pauses triggered by a low error budget"
    );

    describe_counter!(
        "sync_pages_failed_total",
        Unit::Count,
        "Total number of pages dropped after exhausting retries"
    );

    describe_counter!(
        "sync_documents_indexed_total",
        Unit::Count,
        "Total number of documents handed to the sink"
    );

    *initialized = true;
    Ok(())
}

/// Record one outbound HTTP request.
pub fn record_request() {
    counter!("sync_http_requests_total").increment(1);
}

/// Record one retry attempt.
pub fn record_retry() {
    counter!("sync_http_retries_total").increment(1);
}

/// Record one cache hit.
pub fn record_cache_hit() {
    counter!("sync_cache_hits_total").increment(1);
}

/// Record one throttle pause.
pub fn record_throttle() {
    counter!("sync_throttle_events_total").increment(1);
}

/// Record one dropped page.
pub fn record_failed_page() {
    counter!("sync_pages_failed_total").increment(1);
}

/// Record documents handed to the sink.
pub fn record_documents_indexed(count: u64) {
    counter!("sync_documents_indexed_total").increment(count);
}
