//! Unit tests for the request pool

use market_sync::client::{ClientError, RequestPool};
use market_sync::shutdown::ShutdownCoordinator;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_parallelism_clamped_to_supported_range() {
    assert_eq!(RequestPool::new(0).parallelism(), 1);
    assert_eq!(RequestPool::new(50).parallelism(), 50);
    assert_eq!(RequestPool::new(usize::MAX).parallelism(), 100);
}

#[tokio::test]
async fn test_job_to_result_mapping_is_unambiguous() {
    let pool = RequestPool::new(8);
    let jobs: Vec<u64> = (0..100).collect();

    let results = pool
        .run(jobs, |job| async move {
            // Vary completion order so results interleave.
            tokio::time::sleep(Duration::from_micros(1000 - job * 7)).await;
            Ok(job * job)
        })
        .await;

    assert_eq!(results.len(), 100);
    let seen: HashSet<u64> = results.iter().map(|(job, _)| *job).collect();
    assert_eq!(seen.len(), 100);
    for (job, result) in results {
        assert_eq!(result.unwrap(), job * job);
    }
}

#[tokio::test]
async fn test_sibling_jobs_survive_a_failure() {
    let pool = RequestPool::new(4);
    let attempts = Arc::new(AtomicUsize::new(0));

    let results = pool
        .run((0u32..20).collect(), |job| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if job == 7 {
                    Err(ClientError::Transport("connection reset".to_string()))
                } else {
                    Ok(job)
                }
            }
        })
        .await;

    // Every job ran despite the failure.
    assert_eq!(attempts.load(Ordering::SeqCst), 20);
    assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 1);
    let (failed_job, _) = results.iter().find(|(_, r)| r.is_err()).unwrap();
    assert_eq!(*failed_job, 7);
}

#[tokio::test]
async fn test_shutdown_mid_batch_cancels_remaining_jobs() {
    let shutdown = ShutdownCoordinator::shared();
    let pool = RequestPool::new(1).with_shutdown(shutdown.clone());

    let results = pool
        .run((0u32..6).collect(), |job| {
            let shutdown = shutdown.clone();
            async move {
                if job == 2 {
                    shutdown.request_shutdown();
                }
                Ok(job)
            }
        })
        .await;

    assert_eq!(results.len(), 6);
    let cancelled = results
        .iter()
        .filter(|(_, r)| matches!(r, Err(ClientError::Cancelled)))
        .count();
    assert!(cancelled >= 3, "jobs after the trigger should cancel");
}
