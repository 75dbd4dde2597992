//! Audio relay: the message-queue producer feeding the processing pipeline
//!
//! Messages are keyed by request id and routed to a partition derived from
//! that key. Each successful send reports where the message landed.

use async_trait::async_trait;
use ingest_common::RelayEnvelope;
use serde::Serialize;
use thiserror::Error;

mod outbox;
mod redis_stream;

pub use outbox::{OutboxMessage, OutboxRelay};
pub use redis_stream::RedisStreamRelay;

/// Position of a relayed message in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayReceipt {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("can't write message into outbox: {0}")]
    Database(#[from] sqlx::Error),

    #[error("can't send message into redis stream: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("can't marshal msg: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait AudioRelay: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Hand one message to the queue. No retries happen here.
    async fn send(&self, envelope: &RelayEnvelope) -> Result<RelayReceipt, RelayError>;
}
