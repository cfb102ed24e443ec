//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define portal metrics (proxied requests, streamed lines, shell sessions)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `portal_proxy_requests_total` (counter): proxied requests by method, status, mode
//! - `portal_proxy_request_duration_seconds` (histogram): time to response headers
//! - `portal_proxy_stream_lines_total` (counter): lines relayed in streaming mode
//! - `portal_terminal_sessions_active` (gauge): open terminal sessions
//!
//! # Design Decisions
//! - Facade macros are no-ops until a recorder is installed
//! - Exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one proxied exchange.
pub fn record_request(method: &str, status: u16, mode: &'static str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    ::metrics::counter!(
        "portal_proxy_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "mode" => mode
    )
    .increment(1);
    ::metrics::histogram!(
        "portal_proxy_request_duration_seconds",
        "method" => method,
        "status" => status,
        "mode" => mode
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one line relayed to a streaming client.
pub fn record_stream_line() {
    ::metrics::counter!("portal_proxy_stream_lines_total").increment(1);
}

/// Keeps `portal_terminal_sessions_active` in step with live sessions.
pub struct TerminalSessionGuard(());

impl TerminalSessionGuard {
    pub fn new() -> Self {
        ::metrics::gauge!("portal_terminal_sessions_active").increment(1.0);
        Self(())
    }
}

impl Default for TerminalSessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalSessionGuard {
    fn drop(&mut self) {
        ::metrics::gauge!("portal_terminal_sessions_active").decrement(1.0);
    }
}
