//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, rule
//! - `gateway_request_duration_seconds` (histogram): time to terminal state, by rule
//! - `gateway_upstream_errors_total` (counter): upstream failures by kind
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Without an installed recorder every call is a no-op
//! - The rule label is the configured rule text, so cardinality is bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, rule: &str, started: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "rule" => rule.to_string()
    )
    .increment(1);

    metrics::histogram!("gateway_request_duration_seconds", "rule" => rule.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// Record an upstream failure (`connect`, `send`, `stream`, `aborted`).
pub fn record_upstream_error(kind: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}
