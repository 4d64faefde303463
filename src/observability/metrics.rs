//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define cache, breaker and health metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `cache_operations_total` (counter): cache client calls by op, outcome
//! - `http_cache_total` (counter): response cache outcomes (hit, miss, store, skip)
//! - `cache_invalidations_total` (counter): pattern clears by pattern
//! - `circuit_breaker_transitions_total` (counter): state changes by breaker, target state
//! - `circuit_breaker_rejections_total` (counter): fail-fast rejections by breaker
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `health_check_duration_seconds` (histogram): probe latency by check
//! - `health_check_status` (gauge): 0=healthy, 1=degraded, 2=unhealthy, 3=critical
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and tests pay nothing
//! - Labels are low-cardinality (no keys, no ids)

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_op(op: &'static str, outcome: &'static str) {
    counter!("cache_operations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_http_cache(outcome: &'static str) {
    counter!("http_cache_total", "outcome" => outcome).increment(1);
}

pub fn record_invalidation(pattern: &str, cleared: u64) {
    counter!("cache_invalidations_total", "pattern" => pattern.to_string()).increment(1);
    counter!("cache_invalidated_keys_total").increment(cleared);
}

pub fn record_circuit_state(name: &str, value: f64) {
    gauge!("circuit_breaker_state", "name" => name.to_string()).set(value);
}

pub fn record_circuit_transition(name: &str, to: &'static str, value: f64) {
    counter!("circuit_breaker_transitions_total", "name" => name.to_string(), "to" => to)
        .increment(1);
    record_circuit_state(name, value);
}

pub fn record_circuit_rejection(name: &str) {
    counter!("circuit_breaker_rejections_total", "name" => name.to_string()).increment(1);
}

pub fn record_health_check(check: &str, status_value: f64, duration: Duration) {
    histogram!("health_check_duration_seconds", "check" => check.to_string())
        .record(duration.as_secs_f64());
    gauge!("health_check_status", "check" => check.to_string()).set(status_value);
}
