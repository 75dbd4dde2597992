//! HTTP API handlers for ingest-api

pub mod audio;
pub mod clients;
pub mod health;
pub mod request_id;

pub use audio::upload_audio;
pub use clients::{delete_client, get_client, register_client, update_client};
pub use health::health_routes;
pub use request_id::{require_request_id, RequestId, REQUEST_ID_HEADER};
