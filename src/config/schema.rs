//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the booking core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// One resilience policy per downstream dependency.
    pub policies: Vec<PolicyConfig>,

    /// Degraded-mode cache settings.
    pub fallback_cache: FallbackCacheConfig,

    /// Base URLs of the services reached through the HTTP client.
    pub services: Vec<ServiceEndpoint>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl CoreConfig {
    /// Look up a policy by name.
    pub fn policy(&self, name: &str) -> Option<&PolicyConfig> {
        self.policies.iter().find(|p| p.name == name)
    }

    /// Look up a service base URL by name.
    pub fn service_url(&self, name: &str) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.base_url.as_str())
    }
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Wait `retry_wait_base_ms` between every attempt.
    #[default]
    Fixed,
    /// Double the wait each attempt, capped at `retry_wait_max_ms`, with jitter.
    Exponential,
}

/// Resilience policy for a single named dependency.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy name (e.g. "bookingService").
    pub name: String,

    /// Failure rate in percent (0-100) at which the breaker opens.
    pub failure_rate_threshold: f32,

    /// Number of call outcomes kept in the breaker window.
    pub sliding_window_size: usize,

    /// Samples required before the failure rate is evaluated.
    pub minimum_calls: usize,

    /// Time the breaker stays open before probing.
    pub wait_duration_open_ms: u64,

    /// Trial calls admitted while half-open.
    pub permitted_calls_half_open: usize,

    /// Permits granted per rate-limit period.
    pub rate_limit_per_period: u32,

    /// Length of a rate-limit period.
    pub rate_limit_period_ms: u64,

    /// How long a caller may wait for the next period.
    pub rate_limit_timeout_ms: u64,

    /// Maximum concurrent calls.
    pub bulkhead_max_concurrent: usize,

    /// How long a caller may wait for a bulkhead permit.
    pub bulkhead_max_wait_ms: u64,

    /// Total tries, including the first.
    pub retry_max_attempts: u32,

    /// Delay between attempts.
    pub retry_wait_base_ms: u64,

    /// Upper bound for exponential backoff.
    pub retry_wait_max_ms: u64,

    /// Backoff strategy.
    pub retry_backoff: BackoffKind,

    /// Per-attempt timeout.
    pub call_timeout_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            failure_rate_threshold: 50.0,
            sliding_window_size: 10,
            minimum_calls: 10,
            wait_duration_open_ms: 10_000,
            permitted_calls_half_open: 3,
            rate_limit_per_period: 100,
            rate_limit_period_ms: 1_000,
            rate_limit_timeout_ms: 0,
            bulkhead_max_concurrent: 25,
            bulkhead_max_wait_ms: 0,
            retry_max_attempts: 3,
            retry_wait_base_ms: 500,
            retry_wait_max_ms: 5_000,
            retry_backoff: BackoffKind::Fixed,
            call_timeout_ms: 2_000,
        }
    }
}

impl PolicyConfig {
    /// Create a policy with default values under the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn wait_duration_open(&self) -> Duration {
        Duration::from_millis(self.wait_duration_open_ms)
    }

    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_millis(self.rate_limit_period_ms)
    }

    pub fn rate_limit_timeout(&self) -> Duration {
        Duration::from_millis(self.rate_limit_timeout_ms)
    }

    pub fn bulkhead_max_wait(&self) -> Duration {
        Duration::from_millis(self.bulkhead_max_wait_ms)
    }

    pub fn retry_wait_base(&self) -> Duration {
        Duration::from_millis(self.retry_wait_base_ms)
    }

    pub fn retry_wait_max(&self) -> Duration {
        Duration::from_millis(self.retry_wait_max_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Fallback cache bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackCacheConfig {
    /// Entries expire this long after they were written.
    pub expire_after_write_ms: u64,

    /// Entries expire this long after they were last read (0 disables).
    pub expire_after_access_ms: u64,

    /// Maximum summed weight of all entries.
    pub max_weight: u64,
}

impl Default for FallbackCacheConfig {
    fn default() -> Self {
        Self {
            expire_after_write_ms: 10 * 60 * 1000,
            expire_after_access_ms: 5 * 60 * 1000,
            max_weight: 10_000,
        }
    }
}

impl FallbackCacheConfig {
    pub fn expire_after_write(&self) -> Duration {
        Duration::from_millis(self.expire_after_write_ms)
    }

    pub fn expire_after_access(&self) -> Option<Duration> {
        (self.expire_after_access_ms > 0).then(|| Duration::from_millis(self.expire_after_access_ms))
    }
}

/// A downstream service reachable over HTTP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEndpoint {
    /// Service name; also the resilience policy applied to its calls.
    pub name: String,

    /// Base URL (e.g., "http://inventory:8080").
    pub base_url: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
