//! Error types for ingest-api
//!
//! Every error belongs to one [`ErrorKind`]; the HTTP layer maps the kind to a
//! status code. Infrastructure errors carry the name of the operation that
//! produced them so the causal chain survives up to the boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::relay::RelayError;
use crate::store::StoreError;

/// Coarse classification used for status mapping and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyProcessed,
    Validation,
    Infrastructure,
}

/// Main error type for ingest-api
#[derive(Debug, Error)]
pub enum Error {
    /// No client with this identifier
    #[error("the client not found: {0}")]
    ClientNotFound(String),

    /// The idempotency key for this request is already committed
    #[error("request already processed: {0}")]
    RequestAlreadyProcessed(String),

    /// Uploaded audio does not have the configured length
    #[error("the audio not equal to the required length: expected {expected} (bytes), got {actual} (bytes)")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Identifier could not be resolved into its native form
    #[error("invalid identifier {raw:?}: {reason}")]
    InvalidIdentifier { raw: String, reason: String },

    /// Malformed request input
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The request deadline expired while `operation` was in flight
    #[error("{operation}: deadline exceeded")]
    Timeout { operation: &'static str },

    #[error("{operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation}: {source}")]
    Relay {
        operation: &'static str,
        #[source]
        source: RelayError,
    },

    /// Internal fault without a more specific home
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using ingest-api Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn store(operation: &'static str, source: StoreError) -> Self {
        Error::Store { operation, source }
    }

    pub fn relay(operation: &'static str, source: RelayError) -> Self {
        Error::Relay { operation, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ClientNotFound(_) => ErrorKind::NotFound,
            Error::RequestAlreadyProcessed(_) => ErrorKind::AlreadyProcessed,
            Error::PayloadLengthMismatch { .. }
            | Error::InvalidIdentifier { .. }
            | Error::BadRequest(_) => ErrorKind::Validation,
            Error::Timeout { .. }
            | Error::Store { .. }
            | Error::Relay { .. }
            | Error::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Operation name for infrastructure errors
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Error::Timeout { operation }
            | Error::Store { operation, .. }
            | Error::Relay { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

impl From<ingest_common::Error> for Error {
    fn from(err: ingest_common::Error) -> Self {
        match err {
            ingest_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code) = match (&self, self.kind()) {
            (Error::Timeout { .. }, _) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            (_, ErrorKind::NotFound) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            (_, ErrorKind::AlreadyProcessed) => (StatusCode::CONFLICT, "ALREADY_PROCESSED"),
            (_, ErrorKind::Validation) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (_, ErrorKind::Infrastructure) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
