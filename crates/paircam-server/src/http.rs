//! HTTP surface — session mint, session status, health, metrics, and the
//! WebSocket upgrade.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusHandle;
use paircam_core::{ConnectionId, Session, SessionToken};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_CREATED_TOTAL};
use crate::net;
use crate::pairing::PairingRegistry;
use crate::relay::Relay;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{ConnectionTable, session::run_relay_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session and binding registry.
    pub registry: Arc<PairingRegistry>,
    /// Live WebSocket connections.
    pub table: Arc<ConnectionTable>,
    /// Event relay.
    pub relay: Arc<Relay>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// Host advertised in pairing URLs.
    pub advertise_host: String,
    /// Port advertised in pairing URLs.
    pub advertise_port: u16,
    /// When the server started.
    pub start_time: Instant,
}

/// Build the full router over shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-session", post(generate_session))
        .route("/api/session/{token}/status", get(session_status))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct GenerateSessionResponse {
    token: SessionToken,
    pairing_url: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SessionStatusResponse {
    session: Session,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// POST /api/generate-session
async fn generate_session(State(state): State<AppState>) -> Json<GenerateSessionResponse> {
    let session = state.registry.create_session();
    let pairing_url = net::pairing_url(&state.advertise_host, state.advertise_port, &session.token);
    info!(token = %session.token, "session minted");
    counter!(SESSIONS_CREATED_TOTAL).increment(1);
    gauge!(SESSIONS_ACTIVE).increment(1.0);

    Json(GenerateSessionResponse {
        token: session.token,
        pairing_url,
        status: "success",
    })
}

/// GET /api/session/{token}/status
async fn session_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Response {
    match state.registry.get(&SessionToken::from(token)) {
        Some(session) => Json(SessionStatusResponse {
            session,
            status: "success",
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Session not found",
            }),
        )
            .into_response(),
    }
}

/// GET /ws — WebSocket upgrade.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.table.len() >= state.config.max_connections {
        warn!(
            max = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: "too many connections",
            }),
        )
            .into_response();
    }

    let conn_id = ConnectionId::new();
    let heartbeat_interval = state.config.heartbeat_interval();
    let heartbeat_timeout = state.config.heartbeat_timeout();
    let shutdown = state.shutdown.token();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_relay_session(
                socket,
                conn_id,
                state.relay,
                state.table,
                heartbeat_interval,
                heartbeat_timeout,
                shutdown,
            )
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<health::HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.table.len(),
        state.registry.session_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
