//! Common types shared across Room Relay components.

#![warn(clippy::pedantic)]

/// Module for the closed store error taxonomy
pub mod error;

/// Module for session codes, records and the store response envelope
pub mod types;

/// Module for session code generation
pub mod code;

/// Module for secret types that prevent accidental logging
pub mod secret;
