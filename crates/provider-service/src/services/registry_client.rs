//! Service registry client.
//!
//! Registers and unregisters providers with the remote service registry.
//! The registry has no upsert: a provider it already knows is rejected, so
//! any non-`201` answer to a registration is treated as a stale entry. The
//! client then removes the entry and registers once more. There is exactly
//! one retry and no backoff.
//!
//! # Security
//!
//! - The secure base URI is reached with an optional client identity and
//!   trust root
//! - Timeouts prevent hanging connections
//! - Registry responses are never echoed to consumers

use crate::config::Config;
use crate::errors::{RegistrationError, TransportError};
use crate::models::{ProviderDescriptor, ServiceRegistryEntry};
use crate::observability::metrics::{record_registration, record_registry_call};
use reqwest::{Certificate, Client, Identity};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Connect timeout for registry calls in seconds.
const REGISTRY_CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP status the registry answers a successful registration with.
pub const STATUS_CREATED: u16 = 201;

/// HTTP statuses accepted for a successful removal.
pub const REMOVAL_SUCCESS: [u16; 2] = [200, 204];

/// Registry endpoint being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryOperation {
    /// `POST <base>/register`
    Register,
    /// `PUT <base>/remove`
    Remove,
}

impl RegistryOperation {
    pub fn path(&self) -> &'static str {
        match self {
            RegistryOperation::Register => "register",
            RegistryOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Delivers one payload to the registry and reports the HTTP status.
#[async_trait::async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Send `entry` to the `operation` endpoint of the plain (`secure == false`)
    /// or secure registry base URI.
    async fn send(
        &self,
        operation: RegistryOperation,
        entry: &ServiceRegistryEntry,
        secure: bool,
    ) -> Result<u16, TransportError>;
}

/// TLS material for the secure registry base URI (PEM encoded).
#[derive(Default)]
pub struct RegistryTls {
    /// Client certificate chain followed by its private key.
    pub identity_pem: Option<Vec<u8>>,
    /// Additional trust root.
    pub ca_cert_pem: Option<Vec<u8>>,
}

/// [`RegistryTransport`] over HTTP(S) with reqwest.
pub struct HttpRegistryTransport {
    plain: Client,
    secure: Client,
    base_uri: String,
    base_uri_https: String,
}

impl HttpRegistryTransport {
    /// Create a new transport.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Build` if the TLS material is invalid or an
    /// HTTP client cannot be built.
    pub fn new(
        base_uri: String,
        base_uri_https: String,
        timeout: Duration,
        tls: RegistryTls,
    ) -> Result<Self, TransportError> {
        let plain = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(REGISTRY_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "provider.services.registry_client", error = %e, "Failed to build HTTP client");
                TransportError::Build(e.to_string())
            })?;

        let mut secure_builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(REGISTRY_CONNECT_TIMEOUT_SECS));
        if let Some(pem) = tls.identity_pem {
            let identity = Identity::from_pem(&pem)
                .map_err(|e| TransportError::Build(format!("client identity: {}", e)))?;
            secure_builder = secure_builder.identity(identity);
        }
        if let Some(pem) = tls.ca_cert_pem {
            let certificate = Certificate::from_pem(&pem)
                .map_err(|e| TransportError::Build(format!("CA certificate: {}", e)))?;
            secure_builder = secure_builder.add_root_certificate(certificate);
        }
        let secure = secure_builder.build().map_err(|e| {
            error!(target: "provider.services.registry_client", error = %e, "Failed to build HTTPS client");
            TransportError::Build(e.to_string())
        })?;

        Ok(Self {
            plain,
            secure,
            base_uri,
            base_uri_https,
        })
    }

    /// Build from configuration, reading the TLS files it names.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let read = |path: &std::path::Path| {
            std::fs::read(path)
                .map_err(|e| TransportError::Build(format!("{}: {}", path.display(), e)))
        };

        let tls = RegistryTls {
            identity_pem: config
                .registry_client_identity_path
                .as_deref()
                .map(read)
                .transpose()?,
            ca_cert_pem: config
                .registry_ca_cert_path
                .as_deref()
                .map(read)
                .transpose()?,
        };

        Self::new(
            config.registry_base_uri.clone(),
            config.registry_base_uri_https.clone(),
            Duration::from_secs(config.registry_timeout_seconds),
            tls,
        )
    }
}

/// Join a base URI and an endpoint name with exactly one `/`.
pub fn endpoint_url(base: &str, operation: RegistryOperation) -> String {
    format!("{}/{}", base.trim_end_matches('/'), operation.path())
}

#[async_trait::async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn send(
        &self,
        operation: RegistryOperation,
        entry: &ServiceRegistryEntry,
        secure: bool,
    ) -> Result<u16, TransportError> {
        let (client, base) = if secure {
            (&self.secure, self.base_uri_https.as_str())
        } else {
            (&self.plain, self.base_uri.as_str())
        };
        let url = endpoint_url(base, operation);

        let request = match operation {
            RegistryOperation::Register => client.post(&url),
            RegistryOperation::Remove => client.put(&url),
        };

        let response = request.json(entry).send().await.map_err(|e| {
            warn!(target: "provider.services.registry_client", error = %e, url = %url, "Registry request failed");
            TransportError::Request(e.to_string())
        })?;

        Ok(response.status().as_u16())
    }
}

/// How a successful registration came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Accepted on the first attempt.
    Created,
    /// Accepted after removing the entry the registry already held.
    ReplacedStale,
}

impl RegistrationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationOutcome::Created => "created",
            RegistrationOutcome::ReplacedStale => "replaced_stale",
        }
    }
}

/// Runs the register / unregister exchange against a [`RegistryTransport`].
///
/// Holds no provider state.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
}

impl RegistryClient {
    pub fn new(transport: Arc<dyn RegistryTransport>) -> Self {
        Self { transport }
    }

    /// Register `descriptor`, replacing a stale registry entry if needed.
    ///
    /// # Errors
    ///
    /// `RegistrationError::RegistrationFailed` when the stale entry could not
    /// be removed (no second registration is attempted), or when the retry
    /// was rejected or the registry was unreachable.
    #[instrument(skip_all, name = "provider.registry.register", fields(service_uri = %descriptor.service_uri, secure_registry = secure))]
    pub async fn register(
        &self,
        descriptor: &ProviderDescriptor,
        secure: bool,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let entry = descriptor.registration_entry();

        match self.call(RegistryOperation::Register, &entry, secure).await {
            Ok(STATUS_CREATED) => {
                info!(
                    target: "provider.services.registry_client",
                    system_name = %descriptor.system_name,
                    port = descriptor.port,
                    "Provider registered"
                );
                record_registration(RegistrationOutcome::Created.as_str());
                return Ok(RegistrationOutcome::Created);
            }
            Ok(status) => {
                warn!(
                    target: "provider.services.registry_client",
                    status,
                    "Registration rejected, removing stale entry and retrying once"
                );
            }
            Err(e) => {
                warn!(
                    target: "provider.services.registry_client",
                    error = %e,
                    "Registration attempt failed, removing stale entry and retrying once"
                );
            }
        }

        if let Err(e) = self.unregister(descriptor, secure).await {
            record_registration("failed");
            return Err(RegistrationError::RegistrationFailed(format!(
                "stale entry could not be removed: {}",
                e
            )));
        }

        match self.call(RegistryOperation::Register, &entry, secure).await {
            Ok(STATUS_CREATED) => {
                info!(
                    target: "provider.services.registry_client",
                    system_name = %descriptor.system_name,
                    port = descriptor.port,
                    "Provider registered after replacing stale entry"
                );
                record_registration(RegistrationOutcome::ReplacedStale.as_str());
                Ok(RegistrationOutcome::ReplacedStale)
            }
            Ok(status) => {
                record_registration("failed");
                Err(RegistrationError::RegistrationFailed(format!(
                    "registry returned {} on retry",
                    status
                )))
            }
            Err(e) => {
                record_registration("failed");
                Err(RegistrationError::RegistrationFailed(e.to_string()))
            }
        }
    }

    /// Remove the registry entry of `descriptor`.
    ///
    /// # Errors
    ///
    /// `RegistrationError::UnregistrationFailed` unless the registry answers
    /// `200` or `204`.
    #[instrument(skip_all, name = "provider.registry.unregister", fields(service_uri = %descriptor.service_uri, secure_registry = secure))]
    pub async fn unregister(
        &self,
        descriptor: &ProviderDescriptor,
        secure: bool,
    ) -> Result<(), RegistrationError> {
        let entry = descriptor.removal_entry();

        match self.call(RegistryOperation::Remove, &entry, secure).await {
            Ok(status) if REMOVAL_SUCCESS.contains(&status) => {
                info!(
                    target: "provider.services.registry_client",
                    system_name = %descriptor.system_name,
                    status,
                    "Provider unregistered"
                );
                Ok(())
            }
            Ok(status) => {
                warn!(target: "provider.services.registry_client", status, "Unregistration rejected");
                Err(RegistrationError::UnregistrationFailed(format!(
                    "registry returned {}",
                    status
                )))
            }
            Err(e) => Err(RegistrationError::UnregistrationFailed(e.to_string())),
        }
    }

    async fn call(
        &self,
        operation: RegistryOperation,
        entry: &ServiceRegistryEntry,
        secure: bool,
    ) -> Result<u16, TransportError> {
        let result = self.transport.send(operation, entry, secure).await;
        match &result {
            Ok(status) => record_registry_call(operation.path(), &status.to_string()),
            Err(_) => record_registry_call(operation.path(), "transport_error"),
        }
        result
    }
}

/// Mock registry transport module for testing.
///
/// Scripted per-endpoint statuses plus a call log with timestamps, used to
/// observe retry ordering and per-key serialization.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// One scripted answer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockResponse {
        Status(u16),
        TransportFailure,
    }

    /// A call the mock received.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub operation: RegistryOperation,
        pub entry: ServiceRegistryEntry,
        pub secure: bool,
        pub started_at: Instant,
        pub finished_at: Instant,
    }

    /// Mock registry transport.
    ///
    /// Each endpoint answers from its script in order and falls back to its
    /// default (`201` for register, `200` for remove) once the script is empty.
    pub struct MockRegistryTransport {
        register_script: Mutex<VecDeque<MockResponse>>,
        remove_script: Mutex<VecDeque<MockResponse>>,
        delay: Duration,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl Default for MockRegistryTransport {
        fn default() -> Self {
            Self::accepting()
        }
    }

    impl MockRegistryTransport {
        /// Create a mock that accepts every call.
        pub fn accepting() -> Self {
            Self {
                register_script: Mutex::new(VecDeque::new()),
                remove_script: Mutex::new(VecDeque::new()),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Script the register endpoint.
        pub fn with_register_responses(self, responses: Vec<MockResponse>) -> Self {
            *lock(&self.register_script) = responses.into();
            self
        }

        /// Script the remove endpoint.
        pub fn with_remove_responses(self, responses: Vec<MockResponse>) -> Self {
            *lock(&self.remove_script) = responses.into();
            self
        }

        /// Make every call take `delay`.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Calls received so far, in completion order.
        pub fn calls(&self) -> Vec<RecordedCall> {
            lock(&self.calls).clone()
        }

        /// Operations received so far, in completion order.
        pub fn operations(&self) -> Vec<RegistryOperation> {
            lock(&self.calls).iter().map(|c| c.operation).collect()
        }

        /// Number of calls made to `operation`.
        pub fn call_count(&self, operation: RegistryOperation) -> usize {
            lock(&self.calls)
                .iter()
                .filter(|c| c.operation == operation)
                .count()
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[async_trait::async_trait]
    impl RegistryTransport for MockRegistryTransport {
        async fn send(
            &self,
            operation: RegistryOperation,
            entry: &ServiceRegistryEntry,
            secure: bool,
        ) -> Result<u16, TransportError> {
            let started_at = Instant::now();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let scripted = match operation {
                RegistryOperation::Register => lock(&self.register_script).pop_front(),
                RegistryOperation::Remove => lock(&self.remove_script).pop_front(),
            };
            let response = scripted.unwrap_or(match operation {
                RegistryOperation::Register => MockResponse::Status(STATUS_CREATED),
                RegistryOperation::Remove => MockResponse::Status(200),
            });

            lock(&self.calls).push(RecordedCall {
                operation,
                entry: entry.clone(),
                secure,
                started_at,
                finished_at: Instant::now(),
            });

            match response {
                MockResponse::Status(status) => Ok(status),
                MockResponse::TransportFailure => Err(TransportError::Request(
                    "mock transport failure".to_string(),
                )),
            }
        }
    }
}
