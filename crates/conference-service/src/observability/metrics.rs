//! Metrics definitions for the conference service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `cs_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code: `kind` (message, voice), `operation` (the seven
//! gateway operations), `status` (success, error), `outcome`, `stage`.
//! Phone numbers and ids are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Provider calls are remote HTTPS round trips; bucket up to the request timeout
        .set_buckets_for_metric(
            Matcher::Prefix("cs_gateway_request".to_string()),
            &[
                0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set gateway request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record an inbound webhook delivery.
///
/// Metric: `cs_webhook_events_total`
/// Labels: `kind` (message, voice), `parsed` (true, false)
pub fn record_webhook_event(kind: &'static str, parsed: bool) {
    counter!(
        "cs_webhook_events_total",
        "kind" => kind,
        "parsed" => if parsed { "true" } else { "false" }
    )
    .increment(1);
}

/// Record a conference lifecycle outcome.
///
/// Metric: `cs_conferences_total`
/// Labels: `outcome` (started, rejected, start_failed, ended)
pub fn record_conference(outcome: &'static str) {
    counter!("cs_conferences_total", "outcome" => outcome).increment(1);
}

/// Record one HTTP attempt against the provider.
///
/// Metric: `cs_gateway_requests_total`, `cs_gateway_request_duration_seconds`
/// Labels: `operation`, `status` (success, error)
pub fn record_gateway_request(operation: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    counter!(
        "cs_gateway_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);

    histogram!(
        "cs_gateway_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a failed item inside a fan-out batch.
///
/// Metric: `cs_fanout_failures_total`
/// Labels: `stage` (invite, resolve, closing, dial)
pub fn record_fanout_failure(stage: &'static str) {
    counter!("cs_fanout_failures_total", "stage" => stage).increment(1);
}
