//! Provider service error types.
//!
//! `ProviderError` maps to HTTP status codes via the `IntoResponse` impl.
//! Messages returned to consumers are generic; the detailed reason (in
//! particular which token check failed) is only logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::models::KeyError;
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing error type for resource reads.
///
/// Maps to:
/// - BadRequest: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - NotFound: 404 Not Found
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] TokenVerificationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl ProviderError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::BadRequest(_) => 400,
            ProviderError::Unauthorized(_) => 401,
            ProviderError::NotFound(_) => 404,
            ProviderError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ProviderError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ProviderError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            ProviderError::Unauthorized(reason) => {
                // Specific check stays server-side
                tracing::warn!(target: "provider.access", failure = reason.kind(), "Access denied");
                (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Access token validation failed".to_string(),
                )
            }
            ProviderError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            ProviderError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Reason an access token was rejected.
///
/// Checks run in a fixed order and the first failure wins, so each variant
/// also tells how far verification got.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenVerificationError {
    #[error("no private key on record for the resource")]
    NoKeyMaterial,

    #[error("token signature verification failed")]
    BadSignature,

    #[error("token could not be decrypted or decoded: {0}")]
    MalformedToken(String),

    #[error("token claim '{0}' is missing")]
    MissingClaim(&'static str),

    #[error("token service '{actual}' does not match '{expected}'")]
    ServiceMismatch { expected: String, actual: String },

    #[error("client certificate does not match the token consumer")]
    IdentityMismatch,

    #[error("token expired at {expiry} (now {now})")]
    TokenExpired { expiry: u64, now: u64 },
}

impl TokenVerificationError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenVerificationError::NoKeyMaterial => "no_key_material",
            TokenVerificationError::BadSignature => "bad_signature",
            TokenVerificationError::MalformedToken(_) => "malformed_token",
            TokenVerificationError::MissingClaim(_) => "missing_claim",
            TokenVerificationError::ServiceMismatch { .. } => "service_mismatch",
            TokenVerificationError::IdentityMismatch => "identity_mismatch",
            TokenVerificationError::TokenExpired { .. } => "token_expired",
        }
    }
}

/// Failure to reach the registry at all (no HTTP status was received).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("registry client could not be built: {0}")]
    Build(String),

    #[error("registry request failed: {0}")]
    Request(String),
}

/// Registration protocol failures.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A lookup collaborator could not resolve provider metadata.
    #[error("provider metadata lookup failed: {0}")]
    ConfigLookup(String),

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("unregistration failed: {0}")]
    UnregistrationFailed(String),
}

/// Sensor data ingestion failures. None of them mutate provider state.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed sensor record: {0}")]
    Malformed(String),

    #[error("unknown provider flags: {0}")]
    UnknownFlags(String),

    #[error("MQTT publish failed: {0}")]
    Publish(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl From<KeyError> for IngestError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::Malformed(bn) => IngestError::Malformed(format!("bad base name '{}'", bn)),
            KeyError::UnknownFlags(flags) => IngestError::UnknownFlags(flags),
        }
    }
}
