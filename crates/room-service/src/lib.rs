//! Room Service Library
//!
//! This library provides the Session Code Store and the HTTP endpoints
//! around it:
//!
//! - Session Code Store actor behind `/room/:key`
//! - Store Client for talking to a remote instance
//! - Verified session code issuance (`/api/session`)
//! - Media relay publish authorization (`/api/mediamtx/auth`)
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> actors/*.rs
//! ```
//!
//! # Modules
//!
//! - `actors` - Room actor, its storage seam and the room directory
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Request and response bodies
//! - `observability` - Metrics definitions
//! - `routes` - Axum router setup
//! - `services` - Store contract, Store Client and verification client

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
