//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound admission and the retried operation by a caller-supplied deadline
//! - Drop the in-flight work when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timer; dropping the future runs every guard's `Drop`
//! - Deadline errors are distinct from per-attempt timeouts

use std::future::Future;
use tokio::time::Instant;

use crate::resilience::error::{CallError, CallResult};

/// Run `fut` to completion or until `deadline`, whichever comes first.
pub async fn with_deadline<T, Fut>(deadline: Option<Instant>, policy: &str, fut: Fut) -> CallResult<T>
where
    Fut: Future<Output = CallResult<T>>,
{
    match deadline {
        None => fut.await,
        Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(policy = %policy, "Call abandoned at deadline");
                Err(CallError::DeadlineExceeded {
                    policy: policy.to_string(),
                })
            }
        },
    }
}
