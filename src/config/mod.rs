//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CoreConfig (validated, immutable)
//!     → policies registered into PolicyRegistry at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → PolicyRegistry::reload (unchanged policies keep their state)
//! ```
//!
//! # Design Decisions
//! - A policy is immutable once registered; changes replace it wholesale
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackoffKind, CoreConfig, FallbackCacheConfig, LogFormat, ObservabilityConfig, PolicyConfig,
    ServiceEndpoint,
};
