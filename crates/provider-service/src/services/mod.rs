//! Provider core services.
//!
//! - `claims` - compact access token claim set
//! - `token_verifier` - access token verification
//! - `registry_client` - register / unregister against the service registry
//! - `provider_registry` - per-key locked provider state
//! - `descriptor` - registration descriptors from lookup tables
//! - `ingestion` - SenML ingestion and shutdown deregistration
//! - `mqtt` - MQTT translation of `M` records
//! - `access_handler` - plain and secure resource reads

pub mod access_handler;
pub mod claims;
pub mod descriptor;
pub mod ingestion;
pub mod mqtt;
pub mod provider_registry;
pub mod registry_client;
pub mod token_verifier;

pub use access_handler::{unix_now, AccessHandler, ResourcePath};
pub use claims::{ClaimsError, TokenClaims};
pub use descriptor::{DescriptorFactory, ResolvedProvider};
pub use ingestion::{DeregistrationSummary, IngestOutcome, IngestionService};
pub use mqtt::MqttForwarder;
pub use provider_registry::{ProviderGuard, ProviderRegistry, UpdateOutcome};
pub use registry_client::{
    HttpRegistryTransport, RegistrationOutcome, RegistryClient, RegistryOperation,
    RegistryTransport,
};
pub use token_verifier::{SecureReadRequest, TokenVerifier, VerificationTarget};
