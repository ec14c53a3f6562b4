//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pipeline_runs_total` (counter): terminal outcomes by operation, outcome
//! - `pipeline_attempts_total` (counter): external calls by operation
//! - `pipeline_audit_failures_total` (counter): ledger writes that failed, by category
//! - `pipeline_release_failures_total` (counter): resource releases that failed
//!
//! Without an installed recorder every call is a no-op.

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_run(operation: &str, outcome: &str) {
    counter!(
        "pipeline_runs_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_attempt(operation: &str) {
    counter!("pipeline_attempts_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_audit_failure(category: &str) {
    counter!("pipeline_audit_failures_total", "category" => category.to_string()).increment(1);
}

pub fn record_release_failure() {
    counter!("pipeline_release_failures_total").increment(1);
}
