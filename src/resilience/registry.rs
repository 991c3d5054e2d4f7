//! Process-wide store of named resilience policies.
//!
//! # Responsibilities
//! - Build the live state (breaker, bucket, bulkhead, retry) for each policy
//! - Serve lock-free lookups by name
//! - Fail loudly on an unregistered name
//!
//! # Design Decisions
//! - Copy-on-write table behind `ArcSwap`: lookups never block registration
//! - Registering an existing name replaces it wholesale (fresh state)
//! - A reload keeps the live state of every policy whose config is unchanged

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::resilience::bulkhead::Bulkhead;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::error::CallError;
use crate::resilience::rate_limiter::RateLimiter;
use crate::resilience::retries::RetryExecutor;

/// Live state handles for one named policy.
#[derive(Debug)]
pub struct Policy {
    pub config: PolicyConfig,
    pub circuit_breaker: Arc<CircuitBreaker>,
    pub rate_limiter: RateLimiter,
    pub bulkhead: Bulkhead,
    pub retry: RetryExecutor,
}

impl Policy {
    pub fn new(config: PolicyConfig) -> Self {
        let name = config.name.clone();
        Self {
            circuit_breaker: Arc::new(CircuitBreaker::new(&config)),
            rate_limiter: RateLimiter::new(
                name.clone(),
                config.rate_limit_per_period,
                config.rate_limit_period(),
                config.rate_limit_timeout(),
            ),
            bulkhead: Bulkhead::new(name, config.bulkhead_max_concurrent, config.bulkhead_max_wait()),
            retry: RetryExecutor::from_config(&config),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

/// Point-in-time view of a policy, for status reporting.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub name: String,
    pub circuit_state: CircuitState,
    pub failure_rate: f32,
    pub tokens_remaining: u32,
    pub in_flight: usize,
    pub max_concurrent: usize,
}

/// What a reload changed, by policy name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }
}

/// Named policy table.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: ArcSwap<HashMap<String, Arc<Policy>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of policy configs.
    pub fn from_configs(configs: &[PolicyConfig]) -> Self {
        let registry = Self::new();
        registry.register_all(configs);
        registry
    }

    /// Register a policy, replacing any existing one with the same name.
    pub fn register(&self, config: PolicyConfig) {
        let name = config.name.clone();
        let policy = Arc::new(Policy::new(config));
        let previous = self.policies.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), policy.clone());
            next
        });
        if previous.contains_key(&name) {
            tracing::info!(policy = %name, "Resilience policy replaced");
        } else {
            tracing::info!(policy = %name, "Resilience policy registered");
        }
    }

    pub fn register_all(&self, configs: &[PolicyConfig]) {
        for config in configs {
            self.register(config.clone());
        }
    }

    /// Swap in a full policy set.
    ///
    /// Policies whose config is identical keep their breaker, bucket and
    /// bulkhead. Changed ones start fresh, and names missing from `configs`
    /// are dropped.
    pub fn reload(&self, configs: &[PolicyConfig]) -> ReloadSummary {
        let current = self.policies.load_full();
        let mut next = HashMap::with_capacity(configs.len());
        let mut summary = ReloadSummary::default();

        for config in configs {
            match current.get(&config.name) {
                Some(existing) if existing.config == *config => {
                    next.insert(config.name.clone(), existing.clone());
                    summary.unchanged += 1;
                }
                Some(_) => {
                    next.insert(config.name.clone(), Arc::new(Policy::new(config.clone())));
                    summary.replaced.push(config.name.clone());
                }
                None => {
                    next.insert(config.name.clone(), Arc::new(Policy::new(config.clone())));
                    summary.added.push(config.name.clone());
                }
            }
        }
        summary.removed = current
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        summary.added.sort();
        summary.replaced.sort();
        summary.removed.sort();

        self.policies.store(Arc::new(next));
        if summary.is_noop() {
            tracing::debug!(unchanged = summary.unchanged, "Resilience policies unchanged");
        } else {
            tracing::info!(
                added = ?summary.added,
                replaced = ?summary.replaced,
                removed = ?summary.removed,
                unchanged = summary.unchanged,
                "Resilience policies reloaded"
            );
        }
        summary
    }

    /// Look up a policy; unregistered names are an error, never a default.
    pub fn get(&self, name: &str) -> Result<Arc<Policy>, CallError> {
        self.policies.load().get(name).cloned().ok_or_else(|| {
            tracing::error!(policy = %name, "Resilience policy not configured");
            CallError::NotConfigured(name.to_string())
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.load().contains_key(name)
    }

    /// Registered policy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Result<PolicySnapshot, CallError> {
        let policy = self.get(name)?;
        let breaker = policy.circuit_breaker.snapshot();
        Ok(PolicySnapshot {
            name: policy.name().to_string(),
            circuit_state: breaker.state,
            failure_rate: breaker.failure_rate,
            tokens_remaining: policy.rate_limiter.snapshot().tokens,
            in_flight: policy.bulkhead.in_flight(),
            max_concurrent: policy.bulkhead.max_concurrent(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_name_fails() {
        let registry = PolicyRegistry::new();
        assert_eq!(
            registry.get("userService").unwrap_err(),
            CallError::NotConfigured("userService".into())
        );
    }

    #[test]
    fn test_last_write_wins() {
        let registry = PolicyRegistry::new();
        let mut config = PolicyConfig::named("paymentService");
        config.bulkhead_max_concurrent = 5;
        registry.register(config.clone());

        config.bulkhead_max_concurrent = 8;
        registry.register(config);

        let policy = registry.get("paymentService").unwrap();
        assert_eq!(policy.config.bulkhead_max_concurrent, 8);
        assert_eq!(registry.names(), vec!["paymentService".to_string()]);
    }

    #[test]
    fn test_reload_keeps_unchanged_state() {
        let mut flaky = PolicyConfig::named("roomService");
        flaky.sliding_window_size = 2;
        flaky.minimum_calls = 2;
        let registry = PolicyRegistry::from_configs(&[
            flaky.clone(),
            PolicyConfig::named("userService"),
            PolicyConfig::named("legacyService"),
        ]);

        let breaker = registry.get("roomService").unwrap().circuit_breaker.clone();
        for _ in 0..2 {
            breaker.try_acquire().unwrap().record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let mut user = PolicyConfig::named("userService");
        user.bulkhead_max_concurrent = 3;
        let summary = registry.reload(&[flaky, user, PolicyConfig::named("hotelService")]);

        assert_eq!(summary.added, vec!["hotelService".to_string()]);
        assert_eq!(summary.replaced, vec!["userService".to_string()]);
        assert_eq!(summary.removed, vec!["legacyService".to_string()]);
        assert_eq!(summary.unchanged, 1);

        assert!(Arc::ptr_eq(&registry.get("roomService").unwrap().circuit_breaker, &breaker));
        assert_eq!(registry.snapshot("roomService").unwrap().circuit_state, CircuitState::Open);
        assert_eq!(registry.get("userService").unwrap().config.bulkhead_max_concurrent, 3);
        assert!(!registry.contains("legacyService"));
    }

    #[test]
    fn test_identical_reload_is_noop() {
        let configs = [PolicyConfig::named("bookingService")];
        let registry = PolicyRegistry::from_configs(&configs);
        let summary = registry.reload(&configs);
        assert!(summary.is_noop());
        assert_eq!(summary.unchanged, 1);
    }

    #[test]
    fn test_snapshot() {
        let registry = PolicyRegistry::from_configs(&[
            PolicyConfig::named("bookingService"),
            PolicyConfig::named("userService"),
        ]);
        let snap = registry.snapshot("userService").unwrap();
        assert_eq!(snap.circuit_state, CircuitState::Closed);
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.tokens_remaining, 100);
        assert_eq!(registry.names().len(), 2);
    }
}
