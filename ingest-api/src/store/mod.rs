//! Storage collaborators
//!
//! Two contracts with interchangeable backends:
//! - [`ClientStore`]: document backend (SQLite rows) or key-value backend
//!   (Redis JSON blobs). Their schemas are deliberately not unified.
//! - [`IdempotencyStore`]: processed-request markers with a TTL, in SQLite or
//!   Redis.

use async_trait::async_trait;
use ingest_common::{Client, ClientInfo};
use std::time::Duration;
use thiserror::Error;

mod redis_kv;
mod sqlite;

pub use redis_kv::{connect as connect_redis, RedisClientStore, RedisIdempotencyStore};
pub use sqlite::{SqliteClientStore, SqliteIdempotencyStore};

/// Failures reported by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record under the requested identifier
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored record could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence of client records
///
/// Identifiers are allocated by the store and are opaque to callers. An
/// identifier the store never issued behaves exactly like a deleted one.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Whether individual fields can be replaced in place
    fn supports_structured_update(&self) -> bool;

    async fn create(&self, info: &ClientInfo) -> StoreResult<String>;

    async fn get(&self, id: &str) -> StoreResult<Client>;

    /// Replace all mutable fields; `NotFound` when no record matched
    async fn update(&self, id: &str, info: &ClientInfo) -> StoreResult<()>;

    /// Remove the record; `NotFound` when zero records were affected
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Markers for requests that completed successfully
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// True while an unexpired marker exists for `key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Write a marker that expires after `ttl`
    async fn set(&self, key: &str, value: bool, ttl: Duration) -> StoreResult<()>;

    /// Physically remove expired markers, returning how many were removed
    ///
    /// Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> StoreResult<u64> {
        Ok(0)
    }
}
