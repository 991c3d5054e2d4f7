//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke an operation up to `max_attempts` times in total
//! - Bound every attempt by the per-call timeout
//! - Stop at the first error that is not worth retrying
//!
//! # Design Decisions
//! - Only `CallError::Transient` is retried; a timed-out attempt becomes one
//! - Validation and terminal errors fail on the attempt that produced them
//! - Backoff sleeps happen between attempts, never after the last one

use std::future::Future;
use std::time::Duration;

use crate::config::PolicyConfig;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::error::{CallError, CallResult};

/// Bounded re-invocation for one policy.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    name: String,
    max_attempts: u32,
    backoff: Backoff,
    call_timeout: Duration,
}

impl RetryExecutor {
    pub fn new(name: impl Into<String>, max_attempts: u32, backoff: Backoff, call_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            max_attempts: max_attempts.max(1),
            backoff,
            call_timeout,
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.retry_max_attempts,
            Backoff::from_config(config),
            config.call_timeout(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails definitively, or attempts run out.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let err = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => CallError::Transient(format!(
                    "attempt timed out after {:?}",
                    self.call_timeout
                )),
            };

            if !err.is_retryable() {
                tracing::debug!(policy = %self.name, attempt, error = %err, "Not retrying");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                tracing::warn!(policy = %self.name, attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let delay = self.backoff.delay(attempt);
            tracing::info!(policy = %self.name, attempt, delay = ?delay, error = %err, "Retrying call");
            metrics::record_retry(&self.name);
            tokio::time::sleep(delay).await;
        }
    }
}
