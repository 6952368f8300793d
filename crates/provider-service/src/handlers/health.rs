//! Liveness endpoint.

/// Handler for GET /health
///
/// Returns "OK" while the process is serving. Does not check the registry.
pub async fn health_check() -> &'static str {
    "OK"
}
