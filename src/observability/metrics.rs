//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_guard_requests_total` (counter): requests by method, status
//! - `edge_guard_csrf_rejections_total` (counter): 403s by internal reason
//! - `edge_guard_csrf_rotations_total` (counter): secret rotations by cause
//! - `edge_guard_rate_limited_total` (counter): 429s by scope
//! - `edge_guard_rate_limit_store_errors_total` (counter): soft-failed checks
//!
//! # Design Decisions
//! - Rejection reasons are labels here and in logs only, never in responses
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "edge_guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_csrf_rejected(reason: &'static str) {
    counter!("edge_guard_csrf_rejections_total", "reason" => reason).increment(1);
}

pub fn record_csrf_rotation(cause: &'static str) {
    counter!("edge_guard_csrf_rotations_total", "cause" => cause).increment(1);
}

pub fn record_rate_limited(scope: &str) {
    counter!("edge_guard_rate_limited_total", "scope" => scope.to_string()).increment(1);
}

pub fn record_rate_limit_store_error() {
    counter!("edge_guard_rate_limit_store_errors_total").increment(1);
}
