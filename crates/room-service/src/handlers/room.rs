//! Session Code Store HTTP surface.
//!
//! - `GET /room/:key` - read a record
//! - `PUT /room/:key` - create or replace a record
//! - `DELETE /room/:key` - remove a record (404 when absent)
//!
//! Every response is a `RoomResponse` envelope. Request bodies are parsed by
//! hand so malformed JSON maps to `bad-request` instead of axum's 422.

use crate::actors::RemoveOutcome;
use crate::errors::ApiError;
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use bytes::Bytes;
use common::error::StoreError;
use common::types::{RoomResponse, SessionRecord};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Handler for GET /room/:key
#[instrument(skip_all, name = "room.store.get")]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<RoomResponse<SessionRecord>>, ApiError> {
    let record = state.room().await.get(&key).await?;
    Ok(Json(RoomResponse::value(record)))
}

/// Handler for PUT /room/:key
///
/// Body: `{"createdAt": "<ISO-8601 UTC>"}`. Unknown fields are dropped.
#[instrument(skip_all, name = "room.store.put")]
pub async fn put_room(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<RoomResponse<()>>, ApiError> {
    let record: SessionRecord = serde_json::from_slice(&body).map_err(|e| {
        debug!(target: "room.handlers.room", error = %e, "Rejected malformed record body");
        StoreError::BadRequest
    })?;

    state.room().await.create(&key, record).await?;
    Ok(Json(RoomResponse::success()))
}

/// Handler for DELETE /room/:key
#[instrument(skip_all, name = "room.store.delete")]
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<RoomResponse<()>>, ApiError> {
    match state.room().await.remove(&key).await? {
        RemoveOutcome::Removed => Ok(Json(RoomResponse::success())),
        RemoveOutcome::Absent => Err(ApiError::Store(StoreError::Unavailable)),
    }
}
