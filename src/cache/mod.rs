//! HTTP response cache with per-entry expiry
//!
//! Responses from safe methods are stored as immutable snapshots keyed by a
//! digest of the request. Entries are replaced wholesale, never mutated, so
//! concurrent writers only race on which snapshot wins (last writer does).

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Deterministic digest identifying one cacheable request.
///
/// Stable across process restarts given identical method and URL (query
/// parameters included, since they are part of the URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a request.
    pub fn for_request(method: &str, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b" ");
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// The hex digest backing this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An immutable snapshot of one HTTP response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response status code
    pub status: u16,
    /// Lowercased response headers relevant to revalidation and telemetry
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// URL the response was fetched from
    pub url: String,
    /// Absolute expiry; the entry is absent once this passes
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the entry is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Pluggable store for cached HTTP responses.
///
/// Implementations must be safe for concurrent callers; conflicting writes
/// to the same key resolve last-writer-wins.
pub trait HttpCache: Send + Sync {
    /// Get the live entry for a key. Expired or missing entries return
    /// `None` with no side effect beyond optional lazy eviction.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Get the entry for a key even if expired, for conditional
    /// revalidation. No eviction.
    fn peek(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store an entry with the given lifetime. A `ttl_seconds <= 0` stores
    /// an already-expired entry, which makes the cache a no-op for that key.
    fn set(&self, key: CacheKey, entry: CacheEntry, ttl_seconds: i64);

    /// Drop the entry for a key, if any.
    fn invalidate(&self, key: &CacheKey);
}

/// In-memory cache backend, the default.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored, live or expired.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HttpCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key.as_str())?.value().clone();
        if entry.is_live(Utc::now()) {
            Some(entry)
        } else {
            // Expired entries stay in the map: the client still peeks them
            // for their validator, and invalidates the ones without one.
            None
        }
    }

    fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries
            .get(key.as_str())
            .map(|entry| entry.value().clone())
    }

    fn set(&self, key: CacheKey, mut entry: CacheEntry, ttl_seconds: i64) {
        entry.expires_at = Utc::now() + ChronoDuration::seconds(ttl_seconds);
        self.entries.insert(key.0, entry);
    }

    fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key.as_str());
    }
}
