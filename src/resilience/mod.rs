//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call under policy "paymentService":
//!     → registry.rs (look up the named policy, fail if unregistered)
//!     → bulkhead.rs (bounded concurrency)
//!     → rate_limiter.rs (fixed-period token bucket)
//!     → circuit_breaker.rs (fail fast while open)
//!     → retries.rs (bounded attempts, per-attempt timeout, backoff.rs)
//!     → fallback.rs (degraded answer after a terminal failure)
//! caller.rs composes the above; timeouts.rs bounds the whole call.
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Admission order is fixed and rejections never reach the dependency
//! - Circuit breaker prevents cascading failures
//! - Fallback data is only read after a failure, never to skip a healthy call

pub mod backoff;
pub mod bulkhead;
pub mod caller;
pub mod circuit_breaker;
pub mod error;
pub mod fallback;
pub mod rate_limiter;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use caller::{CallOptions, CallOutcome, ResilientCaller};
pub use circuit_breaker::CircuitState;
pub use error::{CallError, CallResult};
pub use fallback::{CacheStats, EvictionCause, FallbackCache};
pub use registry::{PolicyRegistry, PolicySnapshot, ReloadSummary};
