//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::connection::ConnectionState;
use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Exporter version.
    pub version: String,
    /// Per-connection state.
    pub connections: Vec<ConnectionHealth>,
}

/// State of one configured connection.
#[derive(Debug, Serialize)]
pub struct ConnectionHealth {
    pub name: String,
    pub target: String,
    pub state: ConnectionState,
}

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections: Vec<ConnectionHealth> = state
        .connections
        .iter()
        .map(|conn| ConnectionHealth {
            name: conn.name().to_string(),
            target: conn.target().to_string(),
            state: conn.state(),
        })
        .collect();

    // Query tasks close their session between cycles; only a failed connect
    // counts against health.
    let degraded = connections
        .iter()
        .any(|c| c.state == ConnectionState::Disconnected);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections,
    })
}
