//! Integration tests for the conditional HTTP client against a scripted
//! local responder

use chrono::{Duration as ChronoDuration, Utc};
use market_sync::cache::MemoryCache;
use market_sync::client::{ApiClient, ClientError, RequestOptions};
use market_sync::config::MAX_ATTEMPTS;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one scripted response per connection, recording each request.
async fn serve_script(listener: TcpListener, responses: Vec<String>, log: Arc<Mutex<Vec<String>>>) {
    for response in responses {
        let (mut socket, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_) => return,
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
            }
        }
        log.lock().unwrap().push(String::from_utf8_lossy(&request).into_owned());

        socket.write_all(response.as_bytes()).await.ok();
        socket.shutdown().await.ok();
    }
}

async fn start_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/orders", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(serve_script(listener, responses, log.clone()));
    (url, log)
}

fn client() -> ApiClient {
    ApiClient::new(
        Arc::new(reqwest::Client::new()),
        Arc::new(MemoryCache::new()),
    )
}

fn response_500() -> String {
    "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
        .to_string()
}

#[tokio::test]
async fn test_retry_bound_on_persistent_server_errors() {
    let (url, log) = start_server(vec![response_500(); MAX_ATTEMPTS as usize + 2]).await;

    let result = client().get(&url, &RequestOptions::default()).await;

    assert!(matches!(result, Err(ClientError::Transport(_))));
    assert_eq!(
        log.lock().unwrap().len(),
        MAX_ATTEMPTS as usize,
        "client must stop at the attempt ceiling"
    );
}

#[tokio::test]
async fn test_not_modified_preserves_cached_body() {
    let past = (Utc::now() - ChronoDuration::seconds(60)).to_rfc2822();
    let future = (Utc::now() + ChronoDuration::seconds(120)).to_rfc2822();

    let first = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\netag: \"v1\"\r\nexpires: {past}\r\ncontent-length: 7\r\nconnection: close\r\n\r\n[1,2,3]"
    );
    let revalidated = format!(
        "HTTP/1.1 304 Not Modified\r\netag: \"v1\"\r\nexpires: {future}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
    );
    let (url, log) = start_server(vec![first, revalidated]).await;

    let client = client();

    // First fetch: the expired `expires` header stores the entry stale.
    let fresh = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert_eq!(fresh.status, 200);
    assert_eq!(&fresh.body[..], b"[1,2,3]");
    assert!(!fresh.from_cache);

    // Second fetch revalidates with the entity tag; the remote's 304 must
    // refresh the expiry without touching the body.
    let cached = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert_eq!(&cached.body[..], b"[1,2,3]");
    assert!(cached.from_cache);

    let requests = log.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(
        requests[1].to_ascii_lowercase().contains("if-none-match"),
        "revalidation must carry the validator"
    );

    // Third fetch: the refreshed expiry makes it a pure cache hit.
    drop(requests);
    let hit = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert!(hit.from_cache);
    assert_eq!(log.lock().unwrap().len(), 2, "no further network call");
}

#[tokio::test]
async fn test_fresh_response_is_cached_until_expiry() {
    let future = (Utc::now() + ChronoDuration::seconds(120)).to_rfc2822();
    let first = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\nexpires: {future}\r\ncontent-length: 2\r\nconnection: close\r\n\r\n[]"
    );
    let (url, log) = start_server(vec![first]).await;

    let client = client();
    let fresh = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert!(!fresh.from_cache);

    let hit = client.get(&url, &RequestOptions::default()).await.unwrap();
    assert!(hit.from_cache);
    assert_eq!(&hit.body[..], b"[]");
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_remote_error_surfaces_with_status_when_strict() {
    let rejection =
        "HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string();
    let (url, _log) = start_server(vec![rejection]).await;

    let result = client().get(&url, &RequestOptions::strict()).await;

    match result {
        Err(ClientError::Remote { status, .. }) => assert_eq!(status, 403),
        other => panic!("expected remote error, got {other:?}"),
    }
}
