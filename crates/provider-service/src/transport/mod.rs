//! Resource callback seam between the HTTP layer and the provider core.
//!
//! The HTTP handlers only know [`ResourceCallbacks`]; [`ProviderEndpoint`]
//! implements it on top of [`AccessHandler`].

use crate::errors::ProviderError;
use crate::services::access_handler::{unix_now, AccessHandler};
use crate::services::token_verifier::SecureReadRequest;

/// Callbacks invoked for inbound resource reads.
#[async_trait::async_trait]
pub trait ResourceCallbacks: Send + Sync {
    /// Plain read of `moteID/sensorID/interface`.
    async fn serve_get(&self, resource: &str) -> Result<String, ProviderError>;

    /// Token-gated read of `moteID/sensorID/interface`.
    async fn serve_secure_get(
        &self,
        resource: &str,
        request: SecureReadRequest,
    ) -> Result<String, ProviderError>;
}

/// [`ResourceCallbacks`] backed by the provider's [`AccessHandler`].
#[derive(Clone)]
pub struct ProviderEndpoint {
    access: AccessHandler,
}

impl ProviderEndpoint {
    pub fn new(access: AccessHandler) -> Self {
        Self { access }
    }
}

#[async_trait::async_trait]
impl ResourceCallbacks for ProviderEndpoint {
    async fn serve_get(&self, resource: &str) -> Result<String, ProviderError> {
        self.access.read_plain(resource).await
    }

    async fn serve_secure_get(
        &self,
        resource: &str,
        request: SecureReadRequest,
    ) -> Result<String, ProviderError> {
        self.access
            .read_secure(resource, &request, unix_now())
            .await
    }
}
