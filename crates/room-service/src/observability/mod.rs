//! Observability module for the room service.
//!
//! Provides metrics definitions and the recorder setup.

pub mod metrics;
