//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_proxy_requests_total` (counter): proxied requests by method, status, rule
//! - `dev_proxy_request_duration_seconds` (histogram): latency by rule
//! - `dev_proxy_upstream_errors_total` (counter): failures by rule and kind
//! - `dev_proxy_ws_tunnels` (gauge): open upgrade tunnels
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, rule: &str, start: Instant) {
    metrics::counter!(
        "dev_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "rule" => rule.to_string()
    )
    .increment(1);
    metrics::histogram!("dev_proxy_request_duration_seconds", "rule" => rule.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(rule: &str, kind: &'static str) {
    metrics::counter!(
        "dev_proxy_upstream_errors_total",
        "rule" => rule.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn tunnel_opened() {
    metrics::gauge!("dev_proxy_ws_tunnels").increment(1.0);
}

pub fn tunnel_closed() {
    metrics::gauge!("dev_proxy_ws_tunnels").decrement(1.0);
}
