//! Composed resilient call pipeline.
//!
//! # Data Flow
//! ```text
//! call(policy, options, op)
//!     → bulkhead.acquire        (BulkheadFull)
//!     → rate_limiter.acquire    (RateLimited)
//!     → circuit_breaker permit  (CircuitOpen)
//!     → retry.execute(op)       (per-attempt timeout)
//!     → success: refresh fallback[key], outcome recorded on breaker
//!     → failure: fallback[key] if allowed, else the typed error
//! ```
//!
//! The optional deadline in `CallOptions` bounds admission and the retried
//! operation separately. An overrun during the operation is recorded on the
//! breaker as a failure. Admission failures never invoke `op`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::error::{CallError, CallResult};
use crate::resilience::fallback::FallbackCache;
use crate::resilience::registry::{Policy, PolicyRegistry};
use crate::resilience::timeouts::with_deadline;

/// A successful call result, tagged by where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// Fresh response from the dependency.
    Live(T),
    /// Served from the fallback cache after a failure.
    Degraded(T),
}

impl<T> CallOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, CallOutcome::Degraded(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            CallOutcome::Live(v) | CallOutcome::Degraded(v) => v,
        }
    }

    pub fn as_ref(&self) -> &T {
        match self {
            CallOutcome::Live(v) | CallOutcome::Degraded(v) => v,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Fallback cache key (e.g. `getBooking:<id>`).
    pub fallback_key: Option<String>,
    /// Weight of the cached response; defaults to 1.
    pub fallback_weight: Option<u64>,
    /// TTL override for the cached response.
    pub fallback_ttl: Option<Duration>,
    /// Absolute deadline for the whole call.
    pub deadline: Option<Instant>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = Some(key.into());
        self
    }

    pub fn with_fallback_weight(mut self, weight: u64) -> Self {
        self.fallback_weight = Some(weight);
        self
    }

    pub fn with_fallback_ttl(mut self, ttl: Duration) -> Self {
        self.fallback_ttl = Some(ttl);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }
}

/// Executes operations under named resilience policies.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    registry: Arc<PolicyRegistry>,
    fallback: Arc<FallbackCache>,
}

impl ResilientCaller {
    pub fn new(registry: Arc<PolicyRegistry>, fallback: Arc<FallbackCache>) -> Self {
        Self { registry, fallback }
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    pub fn fallback_cache(&self) -> &Arc<FallbackCache> {
        &self.fallback
    }

    /// Call `op` under `policy` with default options.
    pub async fn call<T, F, Fut>(&self, policy: &str, op: F) -> CallResult<CallOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        self.call_with(policy, CallOptions::default(), op).await
    }

    /// Call `op` under `policy`.
    pub async fn call_with<T, F, Fut>(
        &self,
        policy: &str,
        options: CallOptions,
        op: F,
    ) -> CallResult<CallOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let start = Instant::now();
        // Misconfiguration is surfaced as-is: no fallback masks it.
        let handle = self.registry.get(policy)?;

        let result = Self::run(&handle, options.deadline, op).await;

        match result {
            Ok(value) => {
                if let Some(key) = &options.fallback_key {
                    self.refresh_fallback(key, &value, &options);
                }
                metrics::record_call(policy, "live", start);
                Ok(CallOutcome::Live(value))
            }
            Err(err) => {
                if err.allows_fallback() {
                    if let Some(key) = &options.fallback_key {
                        if let Some(value) = self.fallback.get_as::<T>(key) {
                            tracing::warn!(
                                policy = %policy,
                                key = %key,
                                error = %err,
                                "Serving degraded response from fallback cache"
                            );
                            metrics::record_call(policy, "degraded", start);
                            return Ok(CallOutcome::Degraded(value));
                        }
                    }
                }
                tracing::debug!(policy = %policy, error = %err, "Resilient call failed");
                metrics::record_call(policy, err.kind(), start);
                Err(err)
            }
        }
    }

    /// Admission in fixed order, then the retried operation.
    async fn run<T, F, Fut>(policy: &Policy, deadline: Option<Instant>, op: F) -> CallResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallResult<T>>,
    {
        let name = policy.name();
        let (_permit, breaker) = with_deadline(deadline, name, async {
            // 1. Bulkhead (held until the call finishes, however it finishes)
            let permit = policy.bulkhead.acquire().await?;

            // 2. Rate limiter
            policy.rate_limiter.acquire().await?;

            // 3. Circuit breaker
            let breaker = policy.circuit_breaker.try_acquire()?;
            Ok((permit, breaker))
        })
        .await?;

        // 4. Operation with retries
        let result = with_deadline(deadline, name, policy.retry.execute(op)).await;

        match &result {
            Err(e) if e.counts_as_failure() => breaker.record_failure(),
            // Success and definitive negatives both prove the dependency answers.
            _ => breaker.record_success(),
        }
        result
    }

    fn refresh_fallback<T: Serialize>(&self, key: &str, value: &T, options: &CallOptions) {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.fallback.put(
                    key,
                    json,
                    options.fallback_ttl,
                    options.fallback_weight.unwrap_or(1),
                );
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Response not cacheable");
            }
        }
    }
}
