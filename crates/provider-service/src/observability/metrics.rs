//! Metrics definitions for the provider service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `provider_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `operation`: register, remove
//! - `status`: HTTP status code, or a fixed outcome word
//! - `failure`: bounded by `TokenVerificationError::kind`
//! - `kind`: plain, secure
//! - `endpoint`: normalized to `/health`, `/metrics` or `/resource`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g. already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("provider_http_request".to_string()),
            &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `provider_http_requests_total`, `provider_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);

    histogram!("provider_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint
    )
    .record(duration.as_secs_f64());

    counter!("provider_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Resource paths are consumer supplied, so all of them share one label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/resource",
    }
}

// ============================================================================
// Registration Metrics
// ============================================================================

/// Record the outcome of a full registration exchange.
///
/// Metric: `provider_registrations_total`
/// Labels: `outcome` (created, replaced_stale, failed)
pub fn record_registration(outcome: &str) {
    counter!("provider_registrations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a single call to the service registry.
///
/// Metric: `provider_registry_calls_total`
/// Labels: `operation`, `status`
pub fn record_registry_call(operation: &str, status: &str) {
    counter!("provider_registry_calls_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Access Metrics
// ============================================================================

/// Record a token verification.
///
/// Metric: `provider_token_verifications_total`
/// Labels: `status` (success, error), `failure` (error kind or `none`)
pub fn record_token_verification(failure: Option<&'static str>) {
    let (status, failure) = match failure {
        Some(kind) => ("error", kind),
        None => ("success", "none"),
    };
    counter!("provider_token_verifications_total",
        "status" => status,
        "failure" => failure
    )
    .increment(1);
}

/// Record a resource read.
///
/// Metric: `provider_reads_total`
/// Labels: `kind` (plain, secure), `status` (HTTP status code)
pub fn record_read(kind: &'static str, status_code: u16) {
    counter!("provider_reads_total",
        "kind" => kind,
        "status" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Ingestion Metrics
// ============================================================================

/// Record one ingested sensor record.
///
/// Metric: `provider_ingestions_total`
/// Labels: `status` (updated, registered, forwarded, dropped, rejected, failed)
pub fn record_ingestion(status: &'static str) {
    counter!("provider_ingestions_total", "status" => status).increment(1);
}
