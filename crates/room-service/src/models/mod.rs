//! Room service models.
//!
//! Request and response bodies of the HTTP surface. The store envelope
//! itself (`RoomResponse`) lives in `common::types`.

use common::types::SessionCode;
use serde::{Deserialize, Serialize};

/// Maximum accepted length of a verification token, in characters.
pub const MAX_TOKEN_LENGTH: usize = 2048;

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Name of the room this instance serves.
    pub room: String,

    /// Number of records currently held by the room actor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
}

// ============================================================================
// Session API Models
// ============================================================================

/// Request body for `POST /api/session`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    /// Verification token produced by the browser widget.
    pub token: String,
}

/// Response body for a successful `POST /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Always `true`.
    pub ok: bool,

    /// Newly issued session code.
    pub code: SessionCode,
}

// ============================================================================
// Relay Auth Models
// ============================================================================

/// Authorization request sent by the media relay.
///
/// Only the fields this service acts on are modelled; the relay sends more
/// (user, password, ip, protocol, query) and they are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayAuthRequest {
    /// Requested action ("publish", "read", ...).
    pub action: String,

    /// Stream path the action targets.
    #[serde(default)]
    pub path: Option<String>,
}

/// Bare `{ok: true}` acknowledgement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    /// The success acknowledgement.
    pub const OK: OkResponse = OkResponse { ok: true };
}
