//! Paginated fetch orchestration
//!
//! A fetch operation learns the total page count from page 1, fans the
//! remaining pages out through the request pool, throttles when the remote's
//! error budget runs low, and collects whatever pages survive. Failed pages
//! degrade the result instead of aborting it.

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::client::pool::RequestPool;
use crate::client::{ClientError, ClientResult};
use crate::config::{clamp_parallelism, ERROR_LIMIT_THRESHOLD};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::RawOrder;

pub mod market;
pub mod rate_limit;

pub use market::{RegionOrdersSource, StructureOrdersSource};
pub use rate_limit::RateLimitState;

/// The parsed outcome of one page request.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Which page this is, 1-based
    pub page: u32,
    /// Orders carried by the page; empty when the payload was not a
    /// record sequence
    pub orders: Vec<RawOrder>,
    /// Total page count advertised by the response; 0 or a malformed
    /// header is normalized to 1 by the fetcher
    pub pages: u32,
    /// Remaining error budget advertised by the response
    pub error_limit_remain: Option<u32>,
}

/// One paginated resource, addressable page by page.
///
/// Implementations build the page URL, issue the request through the shared
/// client, and validate the payload shape.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch and parse one page.
    async fn fetch_page(&self, page: u32) -> ClientResult<PageResult>;

    /// Short human-readable identity for logging (e.g. `region 10000002`).
    fn label(&self) -> String;
}

/// The merged result of a fetch operation.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Orders from every page that succeeded, in no particular order
    pub orders: Vec<RawOrder>,
    /// Pages whose fetch failed after retries; their records are simply
    /// absent from the merge
    pub failed_pages: u32,
}

/// Drives a [`PageSource`] across all of its pages.
#[derive(Clone)]
pub struct PaginatedFetcher {
    parallelism: usize,
    shutdown: Option<SharedShutdown>,
}

impl PaginatedFetcher {
    /// Create a fetcher with the given page parallelism (clamped to 1..=100).
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: clamp_parallelism(parallelism),
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle for cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch every page of `source` and merge the results.
    ///
    /// Page 1 is fetched first to learn the page count and the initial rate
    /// budget; pages 2..=N then go through the request pool. After every
    /// response the remaining budget is checked, and when it drops under the
    /// threshold further submission pauses for a doubling backoff.
    ///
    /// Fails only when page 1 itself is unreachable; any later page's
    /// failure is logged, counted and otherwise absorbed.
    pub async fn fetch_all_pages<S>(&self, source: &S) -> ClientResult<FetchOutcome>
    where
        S: PageSource + ?Sized,
    {
        let label = source.label();
        let mut limits = RateLimitState::new(ERROR_LIMIT_THRESHOLD);

        let first = source.fetch_page(1).await?;
        let pages = first.pages.max(1);
        debug!(%label, pages, "discovered page count");

        let mut orders = first.orders;
        let mut failed_pages = 0u32;
        throttle(&label, &mut limits, first.error_limit_remain).await;

        if pages > 1 {
            let mut pool = RequestPool::new(self.parallelism);
            if let Some(shutdown) = &self.shutdown {
                pool = pool.with_shutdown(shutdown.clone());
            }

            let remaining: Vec<u32> = (2..=pages).collect();
            let results = pool.stream(remaining, |page| source.fetch_page(page));
            futures_util::pin_mut!(results);

            while let Some((page, result)) = results.next().await {
                match result {
                    Ok(mut page_result) => {
                        orders.append(&mut page_result.orders);
                        // Sleeping here also pauses submission: the pool only
                        // starts new pages while this stream is polled.
                        throttle(&label, &mut limits, page_result.error_limit_remain).await;
                    }
                    Err(ClientError::Cancelled) => {
                        debug!(%label, page, "page cancelled by shutdown");
                        failed_pages += 1;
                    }
                    Err(e) => {
                        warn!(%label, page, error = %e, "page fetch failed");
                        metrics::record_failed_page();
                        failed_pages += 1;
                    }
                }
            }
        }

        info!(
            %label,
            orders = orders.len(),
            failed_pages,
            "fetch operation complete"
        );
        Ok(FetchOutcome {
            orders,
            failed_pages,
        })
    }
}

async fn throttle(label: &str, limits: &mut RateLimitState, remaining: Option<u32>) {
    if let Some(delay) = limits.observe(remaining) {
        warn!(
            label,
            remaining = remaining.unwrap_or(0),
            delay_ms = delay.as_millis() as u64,
            "rate budget low, throttling page submission"
        );
        metrics::record_throttle();
        tokio::time::sleep(delay).await;
    }
}
