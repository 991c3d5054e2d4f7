//! Resilience and consistency core for a hotel booking platform.

pub mod booking;
pub mod config;
pub mod http;
pub mod observability;
pub mod payments;
pub mod resilience;
pub mod storage;

pub use config::schema::CoreConfig;
pub use resilience::{CallError, CallOptions, CallOutcome, FallbackCache, PolicyRegistry, ResilientCaller};
