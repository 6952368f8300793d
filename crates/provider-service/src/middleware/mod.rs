//! HTTP middleware for the provider listeners.

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
