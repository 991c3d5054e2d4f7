//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define resilience, cache and domain metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `resilience_calls_total` (counter): calls by policy, outcome (live, degraded, error)
//! - `resilience_call_duration_seconds` (histogram): end-to-end call latency
//! - `resilience_rejections_total` (counter): admission rejections by policy, reason
//! - `resilience_retries_total` (counter): re-attempts by policy
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `bulkhead_in_flight` (gauge): permits held per policy
//! - `fallback_cache_*` (counters): hits, misses, evictions by cause
//! - `payments_deduplicated_total`, `booking_transitions_total`
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Without an installed recorder every call is a no-op

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::time::Instant;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(
    addr: SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_call(policy: &str, outcome: &'static str, start: Instant) {
    counter!("resilience_calls_total", "policy" => policy.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("resilience_call_duration_seconds", "policy" => policy.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(policy: &str, reason: &'static str) {
    counter!("resilience_rejections_total", "policy" => policy.to_string(), "reason" => reason)
        .increment(1);
}

pub fn record_retry(policy: &str) {
    counter!("resilience_retries_total", "policy" => policy.to_string()).increment(1);
}

pub fn record_breaker_state(policy: &str, state: u8) {
    gauge!("circuit_breaker_state", "policy" => policy.to_string()).set(state as f64);
}

pub fn record_bulkhead_in_flight(policy: &str, in_flight: usize) {
    gauge!("bulkhead_in_flight", "policy" => policy.to_string()).set(in_flight as f64);
}

pub fn record_cache_hit() {
    counter!("fallback_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("fallback_cache_misses_total").increment(1);
}

pub fn record_cache_eviction(cause: &'static str) {
    counter!("fallback_cache_evictions_total", "cause" => cause).increment(1);
}

pub fn record_payment_deduplicated() {
    counter!("payments_deduplicated_total").increment(1);
}

pub fn record_booking_transition(transition: &'static str) {
    counter!("booking_transitions_total", "transition" => transition).increment(1);
}
