//! Resource read handlers.
//!
//! - `GET /{moteID}/{sensorID}/{interface}` on the plain listener
//! - `GET /{moteID}/{sensorID}/{interface}?token=..&signature=..` on the
//!   secure listener
//!
//! # Security
//!
//! - The client DN is taken from the header set by the TLS terminator in
//!   front of the secure listener. The header is trusted as is, so the secure
//!   listener must only be reachable through that terminator (it binds to
//!   loopback unless `PROVIDER_SECURE_BIND_HOST` says otherwise)
//! - Every token failure answers the same 401 body
//! - Query strings are never logged

use crate::errors::{ProviderError, TokenVerificationError};
use crate::routes::AppState;
use crate::services::token_verifier::SecureReadRequest;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Header carrying the verified client certificate subject DN.
pub const CLIENT_DN_HEADER: &str = "x-ssl-client-s-dn";

/// Query parameters of a secure read.
#[derive(Deserialize)]
pub struct SecureReadParams {
    token: Option<String>,
    signature: Option<String>,
}

fn value_response(value: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], value)
}

/// Handler for GET /{resource} on the plain listener.
#[instrument(skip_all, name = "provider.http.read", fields(resource = %resource))]
pub async fn read_resource(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
) -> Result<impl IntoResponse, ProviderError> {
    let value = state.callbacks.serve_get(&resource).await?;
    Ok(value_response(value))
}

/// Handler for GET /{resource} on the secure listener.
///
/// # Response
///
/// - 200 OK: last value of the provider
/// - 400 Bad Request: resource is not `moteID/sensorID/interface`
/// - 401 Unauthorized: token missing or rejected
/// - 404 Not Found: no secure provider for the resource
#[instrument(skip_all, name = "provider.http.read_secure", fields(resource = %resource))]
pub async fn read_secure_resource(
    State(state): State<Arc<AppState>>,
    Path(resource): Path<String>,
    Query(params): Query<SecureReadParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ProviderError> {
    let token = params.token.ok_or_else(|| {
        ProviderError::Unauthorized(TokenVerificationError::MalformedToken(
            "missing token parameter".to_string(),
        ))
    })?;
    let signature = params
        .signature
        .ok_or(ProviderError::Unauthorized(TokenVerificationError::BadSignature))?;

    let client_dn = headers
        .get(CLIENT_DN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let request = SecureReadRequest {
        token: SecretString::from(token),
        signature,
        client_dn,
    };

    let value = state
        .callbacks
        .serve_secure_get(&resource, request)
        .await?;
    Ok(value_response(value))
}
