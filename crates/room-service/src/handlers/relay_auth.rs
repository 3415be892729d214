//! Media relay authorization hook.
//!
//! The relay calls `POST /api/mediamtx/auth` before accepting a client.
//! Reads are always allowed. A publish is allowed only for a path that is a
//! live session code, and the code is consumed on success so it cannot be
//! used to publish twice.

use crate::errors::ApiError;
use crate::models::{OkResponse, RelayAuthRequest};
use crate::observability::metrics::record_relay_auth;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use common::error::StoreError;
use common::types::SessionCode;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Handler for POST /api/mediamtx/auth
///
/// ## Responses
///
/// - `200 {"ok": true}` - allowed
/// - `400 {"ok": false}` - body is not a valid auth request
/// - `401 {"ok": false}` - denied
/// - `500 {"ok": false}` - the store failed while checking or consuming the code
#[instrument(skip_all, name = "room.relay.auth")]
pub async fn relay_auth(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<OkResponse>, ApiError> {
    let request: RelayAuthRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(target: "room.handlers.relay_auth", error = %e, "Rejected malformed auth request");
        ApiError::InvalidBody
    })?;

    match request.action.as_str() {
        "read" => {
            record_relay_auth("read", "allow");
            Ok(Json(OkResponse::OK))
        }
        "publish" => authorize_publish(&state, request.path.as_deref().unwrap_or_default())
            .await
            .inspect(|_| record_relay_auth("publish", "allow"))
            .inspect_err(|e| {
                let decision = if e.status_code() >= 500 { "error" } else { "deny" };
                record_relay_auth("publish", decision);
            }),
        other => {
            debug!(target: "room.handlers.relay_auth", action = %other, "Denied unsupported action");
            record_relay_auth("other", "deny");
            Err(ApiError::Unauthorized)
        }
    }
}

async fn authorize_publish(state: &AppState, path: &str) -> Result<Json<OkResponse>, ApiError> {
    let code = SessionCode::parse(path).map_err(|_| {
        debug!(target: "room.handlers.relay_auth", "Denied publish to a path that is not a session code");
        ApiError::Unauthorized
    })?;

    match state.store.get(code.as_str()).await {
        Ok(_) => {}
        Err(StoreError::Unavailable | StoreError::BadRequest) => {
            info!(target: "room.handlers.relay_auth", "Denied publish for unknown session code");
            return Err(ApiError::Unauthorized);
        }
        Err(StoreError::InternalServerError) => {
            return Err(ApiError::Internal(
                "store lookup failed during publish authorization".to_string(),
            ));
        }
    }

    state.store.remove(code.as_str()).await.map_err(|e| {
        warn!(target: "room.handlers.relay_auth", error = %e, "Failed to consume session code");
        ApiError::Internal(format!("store remove failed during publish authorization: {e}"))
    })?;

    info!(target: "room.handlers.relay_auth", "Publish authorized, session code consumed");
    Ok(Json(OkResponse::OK))
}
