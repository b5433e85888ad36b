//! Retry + circuit-breaker wrapper around raw client calls.

use std::future::Future;
use std::sync::Mutex;

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::error::{ClientError, Target};
use crate::retry::RetryPolicy;

/// Drives every outbound call: breaker check, the call itself, then either
/// backoff-and-retry on transient failure or immediate propagation.
///
/// One breaker per target; both are owned by this instance, not shared
/// globally, so tests and parallel adapter instances stay isolated.
pub struct Resilience {
    policy: RetryPolicy,
    erp_breaker: Mutex<CircuitBreaker>,
    context_breaker: Mutex<CircuitBreaker>,
}

impl Resilience {
    pub fn new(policy: RetryPolicy, breaker_config: BreakerConfig) -> Self {
        Self {
            policy,
            erp_breaker: Mutex::new(CircuitBreaker::new(breaker_config.clone())),
            context_breaker: Mutex::new(CircuitBreaker::new(breaker_config)),
        }
    }

    fn breaker(&self, target: Target) -> &Mutex<CircuitBreaker> {
        match target {
            Target::Erp => &self.erp_breaker,
            Target::ContextStore => &self.context_breaker,
        }
    }

    /// Current breaker state for one target, for health reporting and tests.
    pub fn breaker_state(&self, target: Target) -> BreakerState {
        self.breaker(target).lock().unwrap().state()
    }

    /// Executes `op` against `target` under the retry and breaker policies.
    ///
    /// `op` is invoked once per attempt; it must be an idempotent operation.
    /// Transient failures are retried with exponential backoff and jitter up
    /// to the policy's budget; the final transient error is returned once the
    /// budget is exhausted. Permanent failures propagate immediately. An open
    /// breaker rejects the call before `op` runs.
    pub async fn call<T, F, Fut>(&self, target: Target, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if !self.breaker(target).lock().unwrap().can_execute() {
                metrics::counter!("client_circuit_rejections_total").increment(1);
                return Err(ClientError::CircuitOpen { target });
            }

            match op().await {
                Ok(value) => {
                    self.breaker(target).lock().unwrap().record_success();
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    self.breaker(target).lock().unwrap().record_failure();
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    metrics::counter!("client_retries_total").increment(1);
                    tracing::warn!(
                        dependency = %target,
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if !err.is_circuit_open() {
                        self.breaker(target).lock().unwrap().record_failure();
                    }
                    metrics::counter!("client_call_failures_total").increment(1);
                    return Err(err);
                }
            }
        }
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), BreakerConfig::default())
    }
}
