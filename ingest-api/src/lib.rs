//! ingest-api library - client registration and audio ingestion service
//!
//! Clients register a profile, then stream fixed-size audio samples that are
//! relayed to a partitioned queue. Client mutations are idempotent per
//! `X-REQUEST-ID` for a configurable TTL.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

pub mod api;
pub mod app;
pub mod context;
pub mod db;
pub mod error;
pub mod relay;
pub mod service;
pub mod store;

pub use context::RequestContext;
pub use error::{Error, ErrorKind, Result};

use service::{AudioService, ClientService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<ClientService>,
    pub audio: Arc<AudioService>,
    /// Deadline applied to each `/api` request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(clients: ClientService, audio: AudioService, request_timeout: Duration) -> Self {
        Self {
            clients: Arc::new(clients),
            audio: Arc::new(audio),
            request_timeout,
        }
    }
}

/// Build application router
///
/// Every `/api` route sits behind the `X-REQUEST-ID` check; health routes do not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    let v1 = Router::new()
        .route("/api/v1/register", post(api::register_client))
        .route(
            "/api/v1/client/:id",
            get(api::get_client)
                .put(api::update_client)
                .delete(api::delete_client),
        )
        .route("/api/v1/client/:id/upload/:ts", post(api::upload_audio))
        .layer(middleware::from_fn(api::require_request_id));

    Router::new()
        .merge(v1)
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
