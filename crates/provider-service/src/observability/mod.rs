//! Observability for the provider service.
//!
//! Provides metrics definitions and the recorder setup.

pub mod metrics;
