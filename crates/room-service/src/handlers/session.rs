//! Session issuance handler.
//!
//! `POST /api/session` runs the verification gate, generates a session code
//! and records it in the store. A failed verification consumes nothing: no
//! code is generated and the store is never touched, so the caller can get
//! a fresh token and retry.

use crate::errors::ApiError;
use crate::models::{SessionRequest, SessionResponse, MAX_TOKEN_LENGTH};
use crate::observability::metrics::record_session_issued;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use common::code::generate_session_code;
use common::error::StoreError;
use common::types::SessionRecord;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Header set by Cloudflare with the original client address.
const CF_CONNECTING_IP: &str = "cf-connecting-ip";

/// Standard proxy header, used when the Cloudflare header is absent.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Handler for POST /api/session
///
/// Body: `{"token": "<verification token>"}` (at most 2048 characters).
///
/// ## Responses
///
/// - `200 {"ok": true, "code": "Ab12"}`
/// - `400 {"ok": false, "error": "bad-request"}` for a malformed body
/// - `403 {"ok": false, "error": "<verification code>"}`
/// - store errors with their own status
#[instrument(skip_all, name = "room.session.start")]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionResponse>, ApiError> {
    let request = parse_request(&body).inspect_err(|_| record_session_issued("bad-request"))?;
    let remote_ip = client_ip(&headers);

    if let Err(e) = state
        .verifier
        .verify(&request.token, remote_ip.as_deref())
        .await
    {
        info!(target: "room.handlers.session", error = %e, "Verification rejected session request");
        record_session_issued(e.as_str());
        return Err(ApiError::Verification(e));
    }

    let code = generate_session_code(state.code_source.as_ref()).map_err(|e| {
        record_session_issued("internal-server-error");
        ApiError::Internal(format!("session code generation failed: {e}"))
    })?;

    state
        .store
        .create(code.as_str(), &SessionRecord::now())
        .await
        .inspect_err(|e| {
            warn!(target: "room.handlers.session", error = %e, "Failed to store session code");
            record_session_issued(e.as_str());
        })?;

    info!(target: "room.handlers.session", "Session code issued");
    record_session_issued("success");

    Ok(Json(SessionResponse { ok: true, code }))
}

fn parse_request(body: &[u8]) -> Result<SessionRequest, StoreError> {
    let request: SessionRequest = serde_json::from_slice(body).map_err(|e| {
        debug!(target: "room.handlers.session", error = %e, "Rejected malformed session body");
        StoreError::BadRequest
    })?;

    if request.token.chars().count() > MAX_TOKEN_LENGTH {
        debug!(target: "room.handlers.session", "Rejected oversized verification token");
        return Err(StoreError::BadRequest);
    }

    Ok(request)
}

/// Client IP from `CF-Connecting-IP`, falling back to `X-Forwarded-For`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    [CF_CONNECTING_IP, X_FORWARDED_FOR]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
