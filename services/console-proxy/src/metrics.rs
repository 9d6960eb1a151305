//! Prometheus metrics exposition
//!
//! - `console_proxy_requests_total` (counter): labels `status`, `method`
//! - `console_proxy_request_duration_seconds` (histogram): label `status`
//! - `console_proxy_upstream_errors_total` (counter): label `error_type`
//!
//! The gateway's renewal counters land in the same recorder.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "console_proxy_request_duration_seconds";

/// Bucket boundaries from 5ms to 60s. Requests parked behind a renewal
/// cycle land in the upper buckets.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed proxied request.
pub fn record_request(status: u16, method: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("console_proxy_requests_total", "status" => status_str.clone(), "method" => method.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "status" => status_str).record(duration_secs);
}

/// Record a request that never got an upstream response.
pub fn record_upstream_error(error_type: &'static str) {
    metrics::counter!("console_proxy_upstream_errors_total", "error_type" => error_type)
        .increment(1);
}
