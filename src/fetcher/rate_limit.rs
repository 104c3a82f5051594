//! Rate-limit throttling state
//!
//! The remote advertises a remaining error budget in its response headers.
//! Each fetch operation owns one [`RateLimitState`]; it is never shared
//! across partitions, so a noisy region cannot slow its siblings down.

use std::time::Duration;

use crate::config::{THROTTLE_BASE_BACKOFF, THROTTLE_MAX_BACKOFF};

/// Per-fetch-operation throttle state with a doubling backoff.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    threshold: u32,
    backoff: Duration,
}

impl RateLimitState {
    /// Create fresh state for one fetch operation.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            backoff: THROTTLE_BASE_BACKOFF,
        }
    }

    /// The budget threshold below which throttling triggers.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record the remaining budget observed on a response.
    ///
    /// Returns the delay to apply before submitting further work when the
    /// budget is below the threshold; each trigger doubles the next delay,
    /// capped at [`THROTTLE_MAX_BACKOFF`]. An absent header is not a signal.
    pub fn observe(&mut self, remaining: Option<u32>) -> Option<Duration> {
        let remaining = remaining?;
        if remaining < self.threshold {
            let delay = self.backoff;
            self.backoff = (self.backoff * 2).min(THROTTLE_MAX_BACKOFF);
            Some(delay)
        } else {
            None
        }
    }
}
