//! HTTP routes for the room service.
//!
//! Defines the Axum router and application state.

use crate::actors::{RoomActorHandle, RoomDirectory};
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::{RoomStore, Verifier};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::code::RandomSource;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Registry of room actors backing `/room/:key`.
    pub directory: RoomDirectory,

    /// Store used by session issuance and relay auth.
    ///
    /// Either the local room actor or a `RoomStoreClient`.
    pub store: Arc<dyn RoomStore>,

    /// Verification gate for session issuance.
    pub verifier: Arc<dyn Verifier>,

    /// Randomness for session code generation.
    pub code_source: Arc<dyn RandomSource>,
}

impl AppState {
    /// Handle to the well-known room named in configuration.
    pub async fn room(&self) -> RoomActorHandle {
        self.directory.room(&self.config.room_name).await
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe
/// - `/metrics` - Prometheus metrics endpoint
/// - `/room/:key` - Session Code Store (GET, PUT, DELETE)
/// - `/api/session` - Verified session code issuance
/// - `/api/mediamtx/auth` - Relay publish authorization hook
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/room/:key",
            get(handlers::get_room)
                .put(handlers::put_room)
                .delete(handlers::delete_room),
        )
        .route("/api/session", post(handlers::start_session))
        .route("/api/mediamtx/auth", post(handlers::relay_auth))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
