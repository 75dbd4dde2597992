//! Liveness endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub client_backend: String,
    pub relay_backend: String,
    /// Exact audio payload size accepted by uploads
    pub required_length: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "ingest-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        client_backend: state.clients.backend().to_string(),
        relay_backend: state.audio.relay_backend().to_string(),
        required_length: state.audio.required_length(),
    })
}

/// GET /ping
pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Routes that need no request identifier
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ping", get(ping))
}
