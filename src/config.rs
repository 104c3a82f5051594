//! Tuning constants and backoff schedules

use std::time::Duration;

/// Maximum number of attempts per HTTP call.
/// 5 attempts with a steeply increasing backoff recovers from transient
/// network and 5xx failures while keeping the worst-case delay per call
/// under ~10 seconds.
pub const MAX_ATTEMPTS: u32 = 5;

/// Remaining error-budget threshold below which fetching throttles.
/// The remote advertises its remaining budget in a response header; once it
/// drops under this value, further page submission pauses.
pub const ERROR_LIMIT_THRESHOLD: u32 = 20;

/// Initial throttle backoff when the error budget runs low.
pub const THROTTLE_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for the doubling throttle backoff.
/// 60 seconds matches the remote's budget reset window.
pub const THROTTLE_MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Cache lifetime applied when a 2xx response carries no usable `expires`
/// header. 30 seconds is shorter than any expiry the remote actually sends,
/// so a well-behaved response is never cached longer than it asked for.
pub const CACHE_TTL_FLOOR_SECS: i64 = 30;

/// Location identifiers above this value are player structures, which the
/// public region endpoints cannot address. Such orders are skipped unless a
/// location directory supplies their metadata.
pub const NON_STATION_ID_THRESHOLD: i64 = 99_999_999;

/// Response header carrying the total page count of a paginated resource.
pub const HEADER_PAGES: &str = "x-pages";

/// Response header carrying the remaining error budget.
pub const HEADER_ERROR_LIMIT: &str = "x-esi-error-limit-remain";

/// Lower clamp for request-pool parallelism.
pub const MIN_PARALLELISM: usize = 1;

/// Upper clamp for request-pool parallelism.
/// Bounds socket and memory usage regardless of caller input.
pub const MAX_PARALLELISM: usize = 100;

/// Default number of concurrent page requests within one fetch operation.
pub const DEFAULT_PAGE_PARALLELISM: usize = 20;

/// Default number of regions synced concurrently.
pub const DEFAULT_REGION_PARALLELISM: usize = 8;

/// Default number of structures fetched concurrently.
pub const DEFAULT_STRUCTURE_PARALLELISM: usize = 10;

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout (seconds) - overall time for the entire request
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Calculate the retry backoff for a failed HTTP attempt.
///
/// The schedule is `attempt⁴ / 100` seconds (10 ms, 160 ms, 810 ms, 2.56 s,
/// 6.25 s), strictly increasing across attempts.
pub fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt.pow(4)) * 10)
}

/// Clamp a caller-supplied parallelism to the supported range.
pub fn clamp_parallelism(parallelism: usize) -> usize {
    parallelism.clamp(MIN_PARALLELISM, MAX_PARALLELISM)
}
