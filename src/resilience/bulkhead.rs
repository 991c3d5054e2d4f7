//! Bulkhead: bounded concurrency per policy.
//!
//! # Responsibilities
//! - Cap in-flight calls to a dependency
//! - Let callers queue for a bounded time when the cap is reached
//! - Hand out RAII permits so capacity is returned on every exit path
//!
//! # Design Decisions
//! - Built on `tokio::sync::Semaphore`; a dropped future releases its place in line
//! - Permits are owned, so they can move into spawned tasks

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::observability::metrics;
use crate::resilience::error::CallError;

/// Concurrency limiter for a single policy.
#[derive(Debug)]
pub struct Bulkhead {
    name: Arc<str>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    max_wait: Duration,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrent: usize, max_wait: Duration) -> Self {
        Self {
            name: Arc::from(name.into()),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            max_wait,
        }
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Acquire a permit, waiting up to the configured maximum.
    pub async fn acquire(&self) -> Result<BulkheadPermit, CallError> {
        let permit = if self.max_wait.is_zero() {
            match self.semaphore.clone().try_acquire_owned() {
                Ok(p) => Some(p),
                Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
            }
        } else {
            match tokio::time::timeout(self.max_wait, self.semaphore.clone().acquire_owned()).await {
                Ok(Ok(p)) => Some(p),
                // Semaphore is never closed; treat it like a full bulkhead.
                Ok(Err(_)) | Err(_) => None,
            }
        };

        match permit {
            Some(permit) => {
                metrics::record_bulkhead_in_flight(&self.name, self.in_flight());
                Ok(BulkheadPermit {
                    _permit: permit,
                    name: self.name.clone(),
                    semaphore: self.semaphore.clone(),
                    max_concurrent: self.max_concurrent,
                })
            }
            None => {
                tracing::warn!(
                    policy = %self.name,
                    max_concurrent = self.max_concurrent,
                    "Bulkhead full"
                );
                metrics::record_rejection(&self.name, "bulkhead_full");
                Err(CallError::BulkheadFull {
                    policy: self.name.to_string(),
                })
            }
        }
    }
}

/// A RAII guard holding one bulkhead slot.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    name: Arc<str>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        // `_permit` is released after this body runs, hence the `- 1`.
        let in_flight = self.max_concurrent - self.semaphore.available_permits();
        metrics::record_bulkhead_in_flight(&self.name, in_flight.saturating_sub(1));
    }
}
