//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds within 0-100, windows and permits > 0)
//! - Detect duplicate policy and service names
//! - Check service URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{CoreConfig, PolicyConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `policies[userService].minimum_calls`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a full configuration, collecting every error.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for policy in &config.policies {
        if !seen.insert(policy.name.as_str()) {
            errors.push(ValidationError::new(
                format!("policies[{}]", policy.name),
                "duplicate policy name",
            ));
        }
        errors.extend(validate_policy(policy));
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                format!("services[{}]", service.name),
                "duplicate service name",
            ));
        }
        if let Err(e) = url::Url::parse(&service.base_url) {
            errors.push(ValidationError::new(
                format!("services[{}].base_url", service.name),
                format!("invalid URL: {}", e),
            ));
        }
        if config.policy(&service.name).is_none() {
            tracing::warn!(service = %service.name, "Service has no resilience policy; calls will fail until one is registered");
        }
    }

    if config.fallback_cache.max_weight == 0 {
        errors.push(ValidationError::new("fallback_cache.max_weight", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a single policy in isolation.
pub fn validate_policy(policy: &PolicyConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let field = |name: &str| format!("policies[{}].{}", policy.name, name);

    if policy.name.trim().is_empty() {
        errors.push(ValidationError::new("policies[].name", "must not be empty"));
    }
    if !(0.0..=100.0).contains(&policy.failure_rate_threshold) {
        errors.push(ValidationError::new(
            field("failure_rate_threshold"),
            "must be within 0-100",
        ));
    }
    if policy.sliding_window_size == 0 {
        errors.push(ValidationError::new(field("sliding_window_size"), "must be > 0"));
    }
    if policy.minimum_calls == 0 {
        errors.push(ValidationError::new(field("minimum_calls"), "must be > 0"));
    }
    if policy.minimum_calls > policy.sliding_window_size {
        // The window can never hold that many samples, so the breaker would never open.
        errors.push(ValidationError::new(
            field("minimum_calls"),
            "must not exceed sliding_window_size",
        ));
    }
    if policy.permitted_calls_half_open == 0 {
        errors.push(ValidationError::new(field("permitted_calls_half_open"), "must be > 0"));
    }
    if policy.rate_limit_per_period == 0 {
        errors.push(ValidationError::new(field("rate_limit_per_period"), "must be > 0"));
    }
    if policy.rate_limit_period_ms == 0 {
        errors.push(ValidationError::new(field("rate_limit_period_ms"), "must be > 0"));
    }
    if policy.bulkhead_max_concurrent == 0 {
        errors.push(ValidationError::new(field("bulkhead_max_concurrent"), "must be > 0"));
    }
    if policy.retry_max_attempts == 0 {
        errors.push(ValidationError::new(field("retry_max_attempts"), "must be >= 1"));
    }
    if policy.call_timeout_ms == 0 {
        errors.push(ValidationError::new(field("call_timeout_ms"), "must be > 0"));
    }

    errors
}
