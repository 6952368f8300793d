//! IoT Provider Service Library
//!
//! An IoT provider registers the services of its sensors with a central
//! service registry and serves their last measured value to consumers.
//! Secure providers gate each read with an RSA-encrypted, RSA-signed
//! access token.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> transport -> services/access_handler.rs
//!                                                 -> services/token_verifier.rs
//!                                                 -> services/provider_registry.rs
//! stdin (SenML) -> services/ingestion.rs -> services/registry_client.rs
//!                                        -> services/provider_registry.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `crypto` - RSA token decryption and signature verification
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `lookup` - Static provider lookup tables
//! - `middleware` - HTTP metrics middleware
//! - `models` - Provider keys, descriptors, registry payloads, SenML
//! - `observability` - Prometheus metrics
//! - `routes` - Axum routers for the plain and secure listeners
//! - `services` - Registration protocol, token verification, state store
//! - `transport` - Resource callback seam between HTTP and the core

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod lookup;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod transport;
