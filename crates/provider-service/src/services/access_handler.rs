//! Resource reads for consumers.
//!
//! A resource is addressed as `moteID/sensorID/interface`. Plain reads only
//! need the provider to exist with that interface. Secure reads must also
//! present an access token the [`TokenVerifier`] accepts. Every verification
//! failure produces the same denial; the specific check is only logged.

use crate::errors::{ProviderError, TokenVerificationError};
use crate::models::{ProviderFlags, ProviderKey};
use crate::observability::metrics::{record_read, record_token_verification};
use crate::services::provider_registry::ProviderRegistry;
use crate::services::token_verifier::{SecureReadRequest, TokenVerifier, VerificationTarget};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath<'a> {
    pub mote_id: &'a str,
    pub sensor_id: &'a str,
    pub interface: &'a str,
}

impl<'a> ResourcePath<'a> {
    /// Parse `moteID/sensorID/interface`, with or without a leading `/`.
    pub fn parse(resource: &'a str) -> Result<Self, ProviderError> {
        let trimmed = resource.strip_prefix('/').unwrap_or(resource);
        let mut parts = trimmed.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(mote_id), Some(sensor_id), Some(interface), None)
                if !mote_id.is_empty() && !sensor_id.is_empty() && !interface.is_empty() =>
            {
                Ok(Self {
                    mote_id,
                    sensor_id,
                    interface,
                })
            }
            _ => Err(ProviderError::BadRequest(
                "resource must be moteID/sensorID/interface".to_string(),
            )),
        }
    }

    fn key(&self, flags: ProviderFlags) -> ProviderKey {
        ProviderKey::new(self.mote_id, self.sensor_id, flags)
    }
}

#[derive(Clone)]
pub struct AccessHandler {
    registry: Arc<ProviderRegistry>,
    verifier: TokenVerifier,
}

impl AccessHandler {
    pub fn new(registry: Arc<ProviderRegistry>, verifier: TokenVerifier) -> Self {
        Self { registry, verifier }
    }

    /// Last value of a plain provider.
    #[instrument(skip_all, name = "provider.read.plain", fields(resource = %resource))]
    pub async fn read_plain(&self, resource: &str) -> Result<String, ProviderError> {
        let result = self.plain(resource).await;
        record_read("plain", status_of(&result));
        result
    }

    async fn plain(&self, resource: &str) -> Result<String, ProviderError> {
        let path = ResourcePath::parse(resource)?;
        let key = path.key(ProviderFlags::PLAIN);

        let record = self
            .registry
            .snapshot(&key)
            .await
            .ok_or_else(|| ProviderError::NotFound(resource.to_string()))?;

        if record.descriptor.service_interface != path.interface {
            debug!(
                target: "provider.services.access_handler",
                requested = path.interface,
                "Interface does not match the registered one"
            );
            return Err(ProviderError::NotFound(resource.to_string()));
        }

        Ok(record.last_value)
    }

    /// Last value of a secure provider, gated by the access token in `request`.
    ///
    /// `now` is the current unix time in seconds.
    #[instrument(skip_all, name = "provider.read.secure", fields(resource = %resource))]
    pub async fn read_secure(
        &self,
        resource: &str,
        request: &SecureReadRequest,
        now: u64,
    ) -> Result<String, ProviderError> {
        let result = self.secure(resource, request, now).await;
        record_read("secure", status_of(&result));
        result
    }

    async fn secure(
        &self,
        resource: &str,
        request: &SecureReadRequest,
        now: u64,
    ) -> Result<String, ProviderError> {
        let path = ResourcePath::parse(resource)?;
        let key = path.key(ProviderFlags::SECURE);

        let record = self
            .registry
            .snapshot(&key)
            .await
            .ok_or_else(|| ProviderError::NotFound(resource.to_string()))?;

        // Tokens are checked against the registered interface, never the
        // one named in the request
        let target = VerificationTarget {
            service_interface: &record.descriptor.service_interface,
            service_definition: &record.descriptor.service_definition,
            private_key_path: record.private_key_path.as_deref(),
        };

        let verified = if path.interface == record.descriptor.service_interface {
            self.verifier.verify(request, &target, now)
        } else {
            Err(TokenVerificationError::ServiceMismatch {
                expected: target.expected_service(),
                actual: format!("{}.{}", path.interface, record.descriptor.service_definition),
            })
        };

        match verified {
            Ok(_) => {
                record_token_verification(None);
                Ok(record.last_value)
            }
            Err(e) => {
                record_token_verification(Some(e.kind()));
                Err(ProviderError::Unauthorized(e))
            }
        }
    }
}

fn status_of(result: &Result<String, ProviderError>) -> u16 {
    match result {
        Ok(_) => 200,
        Err(e) => e.status_code(),
    }
}

/// Current unix time in seconds, clamped at zero.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}
