//! Room Service
//!
//! Entry point for the session code service: stores session codes, issues
//! them behind bot verification and authorizes relay publishes.

use common::code::SystemRandomSource;
use room_service::actors::RoomDirectory;
use room_service::config::Config;
use room_service::observability::metrics::init_metrics_recorder;
use room_service::routes::{self, AppState};
use room_service::services::{DirectoryRoomStore, RoomStore, RoomStoreClient, TurnstileVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        room = %config.room_name,
        remote_store = config.room_store_url.is_some(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let upstream_timeout = Duration::from_secs(config.upstream_timeout_seconds);

    // Root token for every room actor
    let cancel_token = CancellationToken::new();
    let directory = RoomDirectory::new(cancel_token.clone());

    let store: Arc<dyn RoomStore> = match &config.room_store_url {
        Some(url) => {
            info!(url = %url, "Using remote room service");
            Arc::new(RoomStoreClient::new(url, upstream_timeout).map_err(|e| {
                error!("Failed to build Store Client: {}", e);
                e
            })?)
        }
        None => Arc::new(DirectoryRoomStore::new(
            directory.clone(),
            &config.room_name,
        )),
    };

    let verifier = TurnstileVerifier::new(
        config.turnstile_verify_url.clone(),
        config.turnstile_secret_key.clone(),
        upstream_timeout,
    )
    .map_err(|e| {
        error!("Failed to build verifier: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        directory: directory.clone(),
        store,
        verifier: Arc::new(verifier),
        code_source: Arc::new(SystemRandomSource::new()),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    directory.shutdown();
    info!("Room Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("ROOM_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (ROOM_DRAIN_SECONDS=0)");
    }
}
