//! HTTP request handlers for the provider service.

pub mod health;
pub mod metrics;
pub mod resources;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use resources::{read_resource, read_secure_resource, CLIENT_DN_HEADER};
