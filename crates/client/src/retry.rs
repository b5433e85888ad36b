//! Retry policy with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first call.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for the given attempt: `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter of up to half the backoff, so a burst of
    /// failing pipelines does not hammer a recovering dependency in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let half = backoff.as_millis() as u64 / 2;
        let jitter = rand::thread_rng().gen_range(0..=half);
        backoff + Duration::from_millis(jitter)
    }
}
