//! `X-REQUEST-ID` handling
//!
//! The header doubles as the idempotency key, so every `/api` request must
//! carry one, and it must be a UUID.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use ingest_common::uuid_utils;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::Error;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Validated request identifier, stored in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

/// Reject requests without a well-formed `X-REQUEST-ID` before any handler runs
pub async fn require_request_id(mut request: Request, next: Next) -> Response {
    let parsed = match request.headers().get(REQUEST_ID_HEADER) {
        None => Err(Error::BadRequest("missing X-REQUEST-ID header".to_string())),
        Some(value) => value
            .to_str()
            .map_err(|_| Error::BadRequest("X-REQUEST-ID is not valid text".to_string()))
            .and_then(|raw| {
                uuid_utils::parse(raw).map_err(|e| {
                    Error::BadRequest(format!("X-REQUEST-ID is not a UUID: {}", e))
                })
            }),
    };

    match parsed {
        Ok(id) => {
            request.extensions_mut().insert(RequestId(id));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequestId(id) = parts
            .extensions
            .get::<RequestId>()
            .copied()
            .ok_or_else(|| Error::Internal("request id middleware not installed".to_string()))?;

        Ok(RequestContext::new(id.to_string(), state.request_timeout))
    }
}
