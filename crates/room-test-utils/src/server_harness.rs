//! Test server harness for E2E testing
//!
//! Provides `TestRoomServer` for spawning real room service instances in tests.

use common::code::{RandomSource, SystemRandomSource};
use metrics_exporter_prometheus::PrometheusHandle;
use room_service::actors::{RoomActorHandle, RoomDirectory};
use room_service::config::Config;
use room_service::observability::metrics::init_metrics_recorder;
use room_service::routes::{self, AppState};
use room_service::services::{DirectoryRoomStore, MockVerifier, RoomStore, Verifier};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Global metrics handle shared by every test server in the process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Builder for `TestRoomServer`.
///
/// Defaults: a verifier that accepts every token, the in-process room actor
/// as the store, and the system CSPRNG for codes.
#[derive(Default)]
pub struct TestRoomServerBuilder {
    verifier: Option<Arc<dyn Verifier>>,
    store: Option<Arc<dyn RoomStore>>,
    code_source: Option<Arc<dyn RandomSource>>,
    vars: HashMap<String, String>,
}

impl TestRoomServerBuilder {
    /// Use `verifier` as the verification gate.
    pub fn verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Use `store` for session issuance and relay auth instead of the local room.
    pub fn store(mut self, store: Arc<dyn RoomStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `source` for session code generation.
    pub fn code_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.code_source = Some(source);
        self
    }

    /// Override an environment variable fed to `Config::from_vars`.
    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    /// Spawn the server.
    ///
    /// # Returns
    /// * `Ok(TestRoomServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If server spawn fails
    pub async fn spawn(self) -> Result<TestRoomServer, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("ROOM_NAME".to_string(), "test-room".to_string()),
            (
                "TURNSTILE_SECRET_KEY".to_string(),
                "test-turnstile-secret".to_string(),
            ),
        ]);
        vars.extend(self.vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let directory = RoomDirectory::new(CancellationToken::new());
        let room = directory.room(&config.room_name).await;

        let store = self.store.unwrap_or_else(|| {
            Arc::new(DirectoryRoomStore::new(directory.clone(), &config.room_name))
                as Arc<dyn RoomStore>
        });
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(MockVerifier::passing()) as Arc<dyn Verifier>);
        let code_source = self
            .code_source
            .unwrap_or_else(|| Arc::new(SystemRandomSource::new()) as Arc<dyn RandomSource>);

        let state = Arc::new(AppState {
            config: config.clone(),
            directory: directory.clone(),
            store,
            verifier,
            code_source,
        });

        // Build routes using room-service's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestRoomServer {
            addr,
            config,
            directory,
            room,
            _handle: handle,
        })
    }
}

/// Test harness for spawning the room service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestRoomServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRoomServer {
    addr: SocketAddr,
    config: Config,
    directory: RoomDirectory,
    room: RoomActorHandle,
    _handle: JoinHandle<()>,
}

impl TestRoomServer {
    /// Spawn a server with default collaborators.
    ///
    /// The server binds to a random available port (127.0.0.1:0) and runs in
    /// the background until dropped.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::builder().spawn().await
    }

    /// Start building a server with custom collaborators.
    pub fn builder() -> TestRoomServerBuilder {
        TestRoomServerBuilder::default()
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the room actor served at `/room/:key`.
    ///
    /// Lets tests seed or inspect records without going through HTTP.
    pub fn room(&self) -> &RoomActorHandle {
        &self.room
    }
}

impl Drop for TestRoomServer {
    fn drop(&mut self) {
        // Stop the HTTP server and every room actor when the test completes.
        self._handle.abort();
        self.directory.shutdown();
    }
}
