//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_calls_total` (counter): calls by method, mode, status code
//! - `bridge_call_duration_seconds` (histogram): call latency by method, mode
//! - `bridge_call_failures_total` (counter): calls ended by the bridge, by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Labels for method, encoding mode, status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::web::{CallOutcome, EncodingMode};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished call.
pub fn record_call(method: &str, mode: EncodingMode, outcome: &CallOutcome, start: Instant) {
    let code = outcome.status.code().as_i32().to_string();
    counter!(
        "bridge_calls_total",
        "method" => method.to_string(),
        "mode" => mode.as_str(),
        "code" => code
    )
    .increment(1);

    histogram!(
        "bridge_call_duration_seconds",
        "method" => method.to_string(),
        "mode" => mode.as_str()
    )
    .record(start.elapsed().as_secs_f64());

    if let Some(reason) = outcome.failure {
        counter!("bridge_call_failures_total", "reason" => reason).increment(1);
    }
}
