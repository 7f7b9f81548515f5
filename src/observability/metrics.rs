//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (request counts, latency, upstream health)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, route
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_upstream_healthy` (gauge): 1=healthy, 0=unhealthy per server
//! - `proxy_rate_limited_total` (counter): requests rejected by rate limiting

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and HTTP exposition endpoint.
///
/// Must be called from within the Tokio runtime; the exporter spawns its
/// own serving task.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics endpoint started");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

/// Record a completed (or failed) proxied request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string(),
    )
    .increment(1);

    histogram!(
        "proxy_request_duration_seconds",
        "route" => route.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the health state of an upstream server.
pub fn record_upstream_health(address: &str, healthy: bool) {
    gauge!(
        "proxy_upstream_healthy",
        "server" => address.to_string(),
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited(reason: &'static str) {
    counter!("proxy_rate_limited_total", "reason" => reason).increment(1);
}
