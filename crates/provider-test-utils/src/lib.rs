//! # Provider Test Utilities
//!
//! Shared test utilities for the IoT provider service.
//!
//! This crate provides:
//! - Deterministic RSA fixtures written to temporary key directories
//! - Access token builder (`TestTokenBuilder`)
//! - Lookup tables and SenML records matching the fixtures
//! - Server test harness (`TestProviderServer`) with a mock registry
//! - Fixed test ids and client DNs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provider_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestProviderServer::spawn(MockRegistryTransport::accepting()).await?;
//!     server.ingestion().ingest(&senml_record(SECURE_TEMPERATURE_BN, "21.5")).await?;
//!
//!     let token = TestTokenBuilder::new().build();
//!     let response = server.secure_get("1/1/json", &token, CONSUMER_DN).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod lookup_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use lookup_fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;

pub use provider_service::services::registry_client::mock::{MockRegistryTransport, MockResponse};
