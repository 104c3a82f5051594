//! Integration tests for paginated fetching with scripted page sources

use async_trait::async_trait;
use market_sync::client::{ClientError, ClientResult};
use market_sync::fetcher::{PageResult, PageSource, PaginatedFetcher};
use market_sync::RawOrder;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub fn order_on_page(page: u32) -> RawOrder {
    RawOrder {
        order_id: i64::from(page) * 100,
        type_id: 34,
        location_id: 60003760,
        price: Decimal::from(page),
        is_buy_order: page % 2 == 0,
        issued: "2026-08-01T12:00:00Z".parse().unwrap(),
        volume_remain: 5,
        volume_total: 10,
        min_volume: 1,
        duration: 30,
        range: "region".to_string(),
        system_id: Some(30000142),
        extra: serde_json::Map::new(),
    }
}

/// A page source driven by a script instead of the network.
pub struct ScriptedSource {
    pub pages: u32,
    pub fail_pages: Vec<u32>,
    pub error_limit_remain: Option<u32>,
    pub calls: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedSource {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            fail_pages: Vec::new(),
            error_limit_remain: Some(100),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, page: u32) -> ClientResult<PageResult> {
        self.calls.lock().unwrap().push(page);
        if self.fail_pages.contains(&page) {
            return Err(ClientError::Transport(format!("page {page} timed out")));
        }
        Ok(PageResult {
            page,
            orders: vec![order_on_page(page)],
            pages: self.pages,
            error_limit_remain: self.error_limit_remain,
        })
    }

    fn label(&self) -> String {
        "scripted".to_string()
    }
}

#[tokio::test]
async fn test_all_pages_are_fetched_and_merged() {
    let source = ScriptedSource::new(5);
    let outcome = PaginatedFetcher::new(4).fetch_all_pages(&source).await.unwrap();

    assert_eq!(outcome.orders.len(), 5);
    assert_eq!(outcome.failed_pages, 0);
    assert_eq!(source.call_count(), 5);

    let mut pages_seen: Vec<u32> = outcome
        .orders
        .iter()
        .map(|o| (o.order_id / 100) as u32)
        .collect();
    pages_seen.sort_unstable();
    assert_eq!(pages_seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_single_page_resource_makes_one_call() {
    let source = ScriptedSource::new(1);
    let outcome = PaginatedFetcher::new(4).fetch_all_pages(&source).await.unwrap();

    assert_eq!(outcome.orders.len(), 1);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_zero_page_count_is_treated_as_one_page() {
    let source = ScriptedSource::new(0);
    let outcome = PaginatedFetcher::new(4).fetch_all_pages(&source).await.unwrap();

    assert_eq!(outcome.orders.len(), 1);
    assert_eq!(outcome.failed_pages, 0);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_page_one_failure_fails_the_operation() {
    let mut source = ScriptedSource::new(3);
    source.fail_pages = vec![1];

    let result = PaginatedFetcher::new(4).fetch_all_pages(&source).await;
    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_low_error_budget_throttles_fetching() {
    let mut source = ScriptedSource::new(1);
    source.error_limit_remain = Some(3);

    let started = Instant::now();
    let outcome = PaginatedFetcher::new(4).fetch_all_pages(&source).await.unwrap();

    // The base throttle backoff is one second.
    assert!(started.elapsed().as_millis() >= 900);
    assert_eq!(outcome.orders.len(), 1);
}

#[tokio::test]
async fn test_healthy_budget_does_not_throttle() {
    let source = ScriptedSource::new(2);

    let started = Instant::now();
    PaginatedFetcher::new(4).fetch_all_pages(&source).await.unwrap();

    assert!(started.elapsed().as_millis() < 500);
}
