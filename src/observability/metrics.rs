//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fanout_requests_total` (counter): proxied requests by api, method, status
//! - `fanout_request_duration_seconds` (histogram): full fanout latency by api
//! - `fanout_upstream_requests_total` (counter): upstream calls by api, host, outcome
//! - `fanout_upstream_duration_seconds` (histogram): upstream latency by api, host
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Ignored hosts are counted with outcome `ignored` and no latency sample

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::fanout::HostReport;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One proxied request, after the master response was chosen.
pub fn record_request(api: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "fanout_requests_total",
        "api" => api.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("fanout_request_duration_seconds", "api" => api.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// One host of a fanout.
pub fn record_upstream(api: &str, report: &HostReport) {
    counter!(
        "fanout_upstream_requests_total",
        "api" => api.to_string(),
        "host" => report.name.clone(),
        "outcome" => report.outcome()
    )
    .increment(1);
    if let Some(elapsed) = report.elapsed {
        histogram!(
            "fanout_upstream_duration_seconds",
            "api" => api.to_string(),
            "host" => report.name.clone()
        )
        .record(elapsed.as_secs_f64());
    }
}
