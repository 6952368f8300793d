//! HTTP routes for the provider listeners.
//!
//! The plain listener serves unauthenticated reads plus operational
//! endpoints. The secure listener, one port above, serves token-gated reads
//! only.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::transport::ResourceCallbacks;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout for both listeners.
const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resource read callbacks.
    pub callbacks: Arc<dyn ResourceCallbacks>,
}

/// Build the plain listener routes.
///
/// - `/health` - Liveness probe
/// - `/metrics` - Prometheus metrics, when a recorder is installed
/// - `/{moteID}/{sensorID}/{interface}` - Plain resource read
pub fn build_plain_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/*resource", get(handlers::read_resource))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(handle);
        routes = routes.merge(metrics_routes);
    }

    with_layers(routes)
}

/// Build the secure listener routes.
///
/// - `/{moteID}/{sensorID}/{interface}?token=..&signature=..` - Secure read
pub fn build_secure_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/*resource", get(handlers::read_secure_resource))
        .with_state(state);

    with_layers(routes)
}

// Layer order (bottom-to-top execution):
// 1. TimeoutLayer (innermost)
// 2. TraceLayer
// 3. http_metrics_middleware (outermost)
fn with_layers(routes: Router) -> Router {
    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
