//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated and served on the plain listener only.
//! Labels carry no resource paths, tokens or client identities.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE provider_reads_total counter
/// provider_reads_total{kind="secure",status="401"} 3
/// ```
#[tracing::instrument(skip_all, name = "provider.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
