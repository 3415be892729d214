//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Liveness handler.
///
/// Asks the well-known room actor for its status. An actor that does not
/// answer is reported as "unhealthy" with a 200 so probes can read the body.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "room": "room",
///   "records": 1
/// }
/// ```
#[instrument(skip_all, name = "room.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let room = state.room().await;

    let response = match room.get_status().await {
        Ok(status) => HealthResponse {
            status: "healthy".to_string(),
            room: status.name,
            records: Some(status.records),
        },
        Err(_) => HealthResponse {
            status: "unhealthy".to_string(),
            room: state.config.room_name.clone(),
            records: None,
        },
    };

    Json(response)
}
