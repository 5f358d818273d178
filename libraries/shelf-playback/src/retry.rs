//! Fragment retry policy for adaptive streams

use serde::{Deserialize, Serialize};
use std::cmp::min;
use std::time::Duration;

/// Bounded exponential backoff for failed stream fragments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries per fragment before the failure becomes fatal
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each further attempt
    pub base_delay_ms: u64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay_ms: base_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Delay before retry number `attempt` (1-based; 0 means no delay)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let exponential = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(min(exponential, self.max_delay_ms))
    }

    /// Whether another retry is allowed after `attempts` retries
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Whether a fragment failure with this HTTP status is transient
    ///
    /// `None` means the request never produced a response (network failure).
    /// 404 is transient because a live transcode publishes fragments
    /// progressively.
    pub fn is_retryable_status(status: Option<u16>) -> bool {
        match status {
            None => true,
            Some(code) => matches!(code, 404 | 408 | 429 | 500..=599),
        }
    }
}
