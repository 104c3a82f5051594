//! Integration tests for partial-failure isolation

use market_sync::client::ClientError;
use market_sync::fetcher::PaginatedFetcher;
use market_sync::shutdown::ShutdownCoordinator;

use crate::integration::paginated_fetch::ScriptedSource;

#[tokio::test]
async fn test_failed_page_is_absent_and_counted() {
    // Page 1 reports three pages; page 2 fails every attempt; page 3 works.
    let mut source = ScriptedSource::new(3);
    source.fail_pages = vec![2];

    let outcome = PaginatedFetcher::new(4)
        .fetch_all_pages(&source)
        .await
        .unwrap();

    assert_eq!(outcome.failed_pages, 1);
    let mut pages_seen: Vec<u32> = outcome
        .orders
        .iter()
        .map(|o| (o.order_id / 100) as u32)
        .collect();
    pages_seen.sort_unstable();
    assert_eq!(pages_seen, vec![1, 3]);
}

#[tokio::test]
async fn test_many_failed_pages_do_not_abort_survivors() {
    let mut source = ScriptedSource::new(10);
    source.fail_pages = vec![2, 4, 6, 8, 10];

    let outcome = PaginatedFetcher::new(3)
        .fetch_all_pages(&source)
        .await
        .unwrap();

    assert_eq!(outcome.failed_pages, 5);
    assert_eq!(outcome.orders.len(), 5);
    // Every page was attempted despite the failures around it.
    assert_eq!(source.call_count(), 10);
}

#[tokio::test]
async fn test_shutdown_cancels_fanned_out_pages() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let source = ScriptedSource::new(6);
    let outcome = PaginatedFetcher::new(2)
        .with_shutdown(shutdown)
        .fetch_all_pages(&source)
        .await
        .unwrap();

    // Page 1 already completed; the fan-out was cancelled wholesale.
    assert_eq!(outcome.orders.len(), 1);
    assert_eq!(outcome.failed_pages, 5);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_error_variants_do_not_leak_between_pages() {
    let mut source = ScriptedSource::new(2);
    source.fail_pages = vec![2];

    // The operation itself still succeeds; only the page is degraded.
    let result = PaginatedFetcher::new(2).fetch_all_pages(&source).await;
    match result {
        Ok(outcome) => {
            assert_eq!(outcome.failed_pages, 1);
            assert_eq!(outcome.orders.len(), 1);
        }
        Err(ClientError::Transport(message)) => {
            panic!("page failure escaped containment: {message}")
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}
