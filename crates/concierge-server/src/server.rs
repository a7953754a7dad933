use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use concierge_engine::{SessionServices, SessionStore};

use crate::client::ClientRegistry;
use crate::gateway;
use crate::http;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval: Duration,
    pub inbox_capacity: usize,
    pub reap_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_send_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            inbox_capacity: 32,
            reap_interval: Duration::from_secs(60),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: SessionServices,
    pub sessions: Arc<SessionStore>,
    pub clients: Arc<ClientRegistry>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, services: SessionServices, sessions: Arc<SessionStore>) -> Self {
        Self {
            services,
            sessions,
            clients: Arc::new(ClientRegistry::new(config.max_send_queue)),
            config: Arc::new(config),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(http::health))
        .route("/room-types", get(http::room_types))
        .route("/habitaciones", get(http::room_types))
        .route("/reservations", get(http::reservations))
        .route("/reservas", get(http::reservations))
        .route("/reservations/{id}/cancel", post(http::cancel_reservation))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving. Returns a handle that keeps the
/// background tasks alive.
pub async fn start(
    config: ServerConfig,
    services: SessionServices,
    sessions: Arc<SessionStore>,
) -> Result<ServerHandle, std::io::Error> {
    let addr = format!("{}:{}", config.host, config.port);
    let reap_interval = config.reap_interval;
    let state = AppState::new(config, services, sessions);

    let reaper = gateway::start_reaper(state.clone(), reap_interval);

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "Concierge server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Server stopped with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        server,
        reaper,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    server: tokio::task::JoinHandle<()>,
    reaper: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and stop the reaper.
    pub fn shutdown(self) {
        self.server.abort();
        self.reaper.abort();
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway::handle_ws_connection(socket, state))
}
