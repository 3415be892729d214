//! Middleware for the room service.

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
