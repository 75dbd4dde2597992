//! Redis store backends
//!
//! Both stores share a multiplexed [`ConnectionManager`], which reconnects on
//! its own and is cheap to clone per command.

use async_trait::async_trait;
use ingest_common::{uuid_utils, Client, ClientInfo};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use super::{ClientStore, IdempotencyStore, StoreError, StoreResult};

/// Namespace for idempotency markers, kept apart from client blobs
const REQUEST_KEY_PREFIX: &str = "request:";

pub async fn connect(url: &str) -> StoreResult<ConnectionManager> {
    let client = redis::Client::open(url)?;
    Ok(ConnectionManager::new(client).await?)
}

/// Key-value backend: one opaque JSON blob per client
#[derive(Clone)]
pub struct RedisClientStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisClientStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> StoreResult<Self> {
        Ok(Self::new(connect(url).await?, prefix))
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

#[async_trait]
impl ClientStore for RedisClientStore {
    fn backend(&self) -> &'static str {
        "key-value"
    }

    fn supports_structured_update(&self) -> bool {
        false
    }

    async fn create(&self, info: &ClientInfo) -> StoreResult<String> {
        let id = uuid_utils::generate().to_string();
        let blob = serde_json::to_string(info)?;
        let mut conn = self.conn.clone();

        // NX: never overwrite an existing client
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(&id))
            .arg(blob)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        if reply.is_none() {
            return Err(StoreError::Redis(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "client identifier collision",
            ))));
        }
        Ok(id)
    }

    async fn get(&self, id: &str) -> StoreResult<Client> {
        let mut conn = self.conn.clone();
        let blob: Option<String> = conn.get(self.key(id)).await?;
        let blob = blob.ok_or(StoreError::NotFound)?;

        let info: ClientInfo = serde_json::from_str(&blob)?;
        Ok(info.into_client(id))
    }

    async fn update(&self, id: &str, info: &ClientInfo) -> StoreResult<()> {
        let blob = serde_json::to_string(info)?;
        let mut conn = self.conn.clone();

        // XX: only replace a blob that is already there
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(id))
            .arg(blob)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        reply.map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.key(id)).await?;

        if removed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Idempotency markers using native Redis expiry
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: ConnectionManager,
}

impl RedisIdempotencyStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(key: &str) -> String {
        format!("{}{}", REQUEST_KEY_PREFIX, key)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let found: i64 = conn.exists(Self::key(key)).await?;
        Ok(found == 1)
    }

    async fn set(&self, key: &str, value: bool, ttl: Duration) -> StoreResult<()> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.conn.clone();

        let _: () = redis::cmd("SET")
            .arg(Self::key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
