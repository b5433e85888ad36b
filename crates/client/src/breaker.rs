//! Per-target circuit breaker.

use std::time::{Duration, Instant};

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before allowing a probe.
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(60),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls fail fast until the cool-down elapses.
    Open,
    /// One probe call decides whether to close or reopen.
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks consecutive failures against one target and trips open past a
/// threshold. State is process-local and owned by the facade instance, never
/// global, so parallel adapter instances and tests stay isolated.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Returns true if a call may be issued now.
    ///
    /// An open breaker whose cool-down has elapsed moves to half-open and
    /// admits a single probe.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.cool_down)
                    .unwrap_or(true);
                if elapsed {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Resets the breaker after a successful call.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.state = BreakerState::Closed;
    }

    /// Counts a failed call; trips open at the threshold, and immediately on
    /// a failed half-open probe.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.state == BreakerState::HalfOpen
            || self.consecutive_failures >= self.config.failure_threshold
        {
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cool_down_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cool_down: Duration::from_millis(cool_down_ms),
        })
    }

    #[test]
    fn stays_closed_below_threshold() {
        let mut b = breaker(3, 1000);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.can_execute());
    }

    #[test]
    fn opens_at_threshold_and_fails_fast() {
        let mut b = breaker(3, 1000);
        for _ in 0..3 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.can_execute());
    }

    #[test]
    fn success_resets_failure_count() {
        let mut b = breaker(3, 1000);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_after_cool_down() {
        let mut b = breaker(1, 10);
        b.record_failure();
        assert!(!b.can_execute());

        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_execute());
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn probe_success_closes() {
        let mut b = breaker(1, 10);
        b.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_execute());

        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn probe_failure_reopens_immediately() {
        let mut b = breaker(5, 10);
        for _ in 0..5 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.can_execute());

        // a single failed probe trips it again, threshold notwithstanding
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.can_execute());
    }
}
