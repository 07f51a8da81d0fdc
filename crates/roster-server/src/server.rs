use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use roster_core::DirectoryEvent;
use roster_store::Database;
use tokio::sync::{broadcast, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::client::{self, ClientRegistry};
use crate::event_bridge;
use crate::handlers;
use crate::presence::{PresenceBroadcaster, SessionLifecycle};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub cleanup_interval: Duration,
    /// Directory of static client files served for unmatched paths.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            cleanup_interval: Duration::from_secs(60),
            static_dir: None,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub directory_tx: broadcast::Sender<DirectoryEvent>,
    pub clients: Arc<ClientRegistry>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub heartbeat_interval: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/", get(handlers::list_users))
        .route("/users", get(handlers::list_users).post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    db: Database,
    directory_tx: broadcast::Sender<DirectoryEvent>,
) -> Result<ServerHandle, std::io::Error> {
    let clients = Arc::new(ClientRegistry::new(config.max_send_queue, config.client_timeout));
    let lifecycle = Arc::new(SessionLifecycle::new(PresenceBroadcaster::new(Arc::clone(&clients))));

    let bridge_handle = event_bridge::create_bridge(Arc::clone(&lifecycle), directory_tx.subscribe());
    let cleanup_handle = client::start_cleanup_task(Arc::clone(&clients), config.cleanup_interval);

    let app_state = AppState {
        db,
        directory_tx,
        clients,
        lifecycle: Arc::clone(&lifecycle),
        heartbeat_interval: config.heartbeat_interval,
    };

    let router = build_router(app_state, config.static_dir.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Roster server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        lifecycle,
        shutdown_tx: Some(shutdown_tx),
        server: server_handle,
        bridge: bridge_handle,
        cleanup: cleanup_handle,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    lifecycle: Arc<SessionLifecycle>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
    bridge: tokio::task::JoinHandle<()>,
    cleanup: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
        &self.lifecycle
    }

    /// Stop accepting connections and wait briefly for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.bridge.abort();
        self.cleanup.abort();
        if tokio::time::timeout(Duration::from_secs(5), &mut self.server).await.is_err() {
            tracing::warn!("Server did not stop in time, aborting");
            self.server.abort();
        }
        tracing::info!("Roster server stopped");
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, rx) = state.clients.register();
    state.lifecycle.open(&connection_id);
    tracing::info!(connection_id = %connection_id, "WebSocket client connected");

    client::handle_ws_connection(
        socket,
        connection_id,
        rx,
        state.clients,
        state.lifecycle,
        state.heartbeat_interval,
    )
    .await;
}
