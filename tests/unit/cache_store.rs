//! Unit tests for the cache store

use bytes::Bytes;
use chrono::Utc;
use market_sync::cache::{CacheEntry, CacheKey, HttpCache, MemoryCache};
use std::time::Duration;

fn entry(body: &str, headers: Vec<(String, String)>) -> CacheEntry {
    CacheEntry {
        status: 200,
        headers,
        body: Bytes::copy_from_slice(body.as_bytes()),
        url: "https://esi.evetech.net/latest/markets/10000002/orders/?page=1".to_string(),
        expires_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let cache = MemoryCache::new();
    let key = CacheKey::for_request("GET", "https://api.example/orders?page=1");

    cache.set(key.clone(), entry("orders", Vec::new()), 1);
    assert!(cache.get(&key).is_some(), "entry should be live before ttl");

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(cache.get(&key).is_none(), "entry should expire after ttl");
}

#[test]
fn test_revalidation_refresh_never_alters_body() {
    let cache = MemoryCache::new();
    let key = CacheKey::for_request("GET", "https://api.example/orders?page=1");
    let etag_headers = vec![("etag".to_string(), "\"v1\"".to_string())];

    // Entry goes stale but keeps its validator.
    cache.set(key.clone(), entry("original body", etag_headers), -1);
    assert!(cache.get(&key).is_none());

    // The client's not-modified path: peek the stale entry, store it again
    // with a refreshed expiry.
    let stale = cache.peek(&key).expect("stale entry should be peekable");
    assert_eq!(stale.header("etag"), Some("\"v1\""));
    cache.set(key.clone(), stale, 60);

    let refreshed = cache.get(&key).expect("refreshed entry should be live");
    assert_eq!(refreshed.body, Bytes::from_static(b"original body"));
    assert_eq!(refreshed.header("etag"), Some("\"v1\""));
}

#[test]
fn test_concurrent_writers_leave_one_snapshot() {
    let cache = std::sync::Arc::new(MemoryCache::new());
    let key = CacheKey::for_request("GET", "https://api.example/orders?page=1");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            let key = key.clone();
            std::thread::spawn(move || {
                cache.set(key, entry(&format!("writer {i}"), Vec::new()), 60);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 1);
    let winner = cache.get(&key).expect("one snapshot should survive");
    assert!(winner.body.starts_with(b"writer "));
}

#[test]
fn test_key_is_stable_and_method_sensitive() {
    let url = "https://api.example/orders?page=1";
    assert_eq!(
        CacheKey::for_request("GET", url),
        CacheKey::for_request("GET", url)
    );
    assert_ne!(
        CacheKey::for_request("GET", url),
        CacheKey::for_request("POST", url)
    );
}
