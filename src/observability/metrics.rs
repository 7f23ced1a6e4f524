//! Metrics collection and exposition.
//!
//! # Metrics
//! - `carelink_requests_total` (counter): governed calls by endpoint, method, outcome
//! - `carelink_request_duration_seconds` (histogram): end-to-end latency incl. retries
//! - `carelink_cache_hits_total` (counter): GETs served from cache
//! - `carelink_dedup_joins_total` (counter): GETs that joined an in-flight call
//! - `carelink_rate_limited_total` (counter): calls rejected by the window
//! - `carelink_circuit_transitions_total` (counter): breaker state changes
//! - `carelink_retries_total` (counter): retries after network failures
//! - `carelink_analytics_events_total` (counter): analytics events by result

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::CircuitState;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, method: &str, outcome: &'static str, started: Instant) {
    counter!(
        "carelink_requests_total",
        "endpoint" => endpoint.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("carelink_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_cache_hit(endpoint: &str) {
    counter!("carelink_cache_hits_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_dedup_join(endpoint: &str) {
    counter!("carelink_dedup_joins_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_rate_limited(endpoint: &str) {
    counter!("carelink_rate_limited_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_circuit_transition(endpoint: &str, state: CircuitState) {
    counter!(
        "carelink_circuit_transitions_total",
        "endpoint" => endpoint.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

pub fn record_retry(endpoint: &str) {
    counter!("carelink_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_analytics(result: &'static str, count: usize) {
    counter!("carelink_analytics_events_total", "result" => result).increment(count as u64);
}
