//! SQLite store backends

use async_trait::async_trait;
use ingest_common::{time, uuid_utils, Client, ClientInfo};
use sqlx::SqlitePool;
use std::time::Duration;

use super::{ClientStore, IdempotencyStore, StoreError, StoreResult};

/// Document backend: one structured row per client
#[derive(Clone)]
pub struct SqliteClientStore {
    db: SqlitePool,
}

impl SqliteClientStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

type ClientRow = (String, String, String, f64, f64, String);

#[async_trait]
impl ClientStore for SqliteClientStore {
    fn backend(&self) -> &'static str {
        "document"
    }

    fn supports_structured_update(&self) -> bool {
        true
    }

    async fn create(&self, info: &ClientInfo) -> StoreResult<String> {
        let id = uuid_utils::generate().to_string();
        let methods = serde_json::to_string(&info.notification_methods)?;
        let now = time::now_millis();

        sqlx::query(
            r#"
            INSERT INTO clients
                (id, full_name, location_name, latitude, longitude,
                 notification_methods, created_at_ms, updated_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&info.full_name)
        .bind(&info.location_name)
        .bind(info.latitude)
        .bind(info.longitude)
        .bind(&methods)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    async fn get(&self, id: &str) -> StoreResult<Client> {
        let row: Option<ClientRow> = sqlx::query_as(
            r#"
            SELECT id, full_name, location_name, latitude, longitude, notification_methods
            FROM clients
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let (id, full_name, location_name, latitude, longitude, methods) =
            row.ok_or(StoreError::NotFound)?;

        Ok(Client {
            id,
            full_name,
            location_name,
            latitude,
            longitude,
            notification_methods: serde_json::from_str(&methods)?,
        })
    }

    async fn update(&self, id: &str, info: &ClientInfo) -> StoreResult<()> {
        let methods = serde_json::to_string(&info.notification_methods)?;

        let result = sqlx::query(
            r#"
            UPDATE clients
            SET full_name = ?, location_name = ?, latitude = ?, longitude = ?,
                notification_methods = ?, updated_at_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(&info.full_name)
        .bind(&info.location_name)
        .bind(info.latitude)
        .bind(info.longitude)
        .bind(&methods)
        .bind(time::now_millis())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Idempotency markers with an explicit expiry column
///
/// Expired rows are invisible to [`IdempotencyStore::exists`] and are
/// physically removed by [`IdempotencyStore::purge_expired`].
#[derive(Clone)]
pub struct SqliteIdempotencyStore {
    db: SqlitePool,
}

impl SqliteIdempotencyStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdempotencyStore for SqliteIdempotencyStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM idempotency_keys WHERE key = ? AND expires_at_ms > ?)",
        )
        .bind(key)
        .bind(time::now_millis())
        .fetch_one(&self.db)
        .await?;

        Ok(found != 0)
    }

    async fn set(&self, key: &str, value: bool, ttl: Duration) -> StoreResult<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = time::now_millis().saturating_add(ttl_ms);

        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, value, expires_at_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at_ms = excluded.expires_at_ms
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at_ms)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at_ms <= ?")
            .bind(time::now_millis())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn jane() -> ClientInfo {
        ClientInfo {
            full_name: "Jane Doe".to_string(),
            location_name: "Park".to_string(),
            latitude: 52.1,
            longitude: 12.2,
            notification_methods: vec!["sms".to_string()],
        }
    }

    async fn client_store() -> SqliteClientStore {
        SqliteClientStore::new(db::connect_in_memory().await.unwrap())
    }

    async fn key_store() -> SqliteIdempotencyStore {
        SqliteIdempotencyStore::new(db::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = client_store().await;

        let id = store.create(&jane()).await.unwrap();
        assert!(!id.is_empty());

        let client = store.get(&id).await.unwrap();
        assert_eq!(client, jane().into_client(id));
    }

    #[tokio::test]
    async fn test_update_replaces_all_mutable_fields() {
        let store = client_store().await;
        let id = store.create(&jane()).await.unwrap();

        let replacement = ClientInfo {
            full_name: "John Roe".to_string(),
            location_name: "Harbour".to_string(),
            latitude: -33.9,
            longitude: 151.2,
            notification_methods: vec![],
        };
        store.update(&id, &replacement).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), replacement.into_client(id));
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let store = client_store().await;

        assert!(matches!(store.get("nonexistent-id").await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.update("nonexistent-id", &jane()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(store.delete("nonexistent-id").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = client_store().await;
        let id = store.create(&jane()).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound)));
        assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_marker_lifecycle() {
        let store = key_store().await;

        assert!(!store.exists("req-1").await.unwrap());
        store.set("req-1", true, Duration::from_secs(20)).await.unwrap();
        assert!(store.exists("req-1").await.unwrap());
        assert!(!store.exists("req-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_marker_expires() {
        let store = key_store().await;

        store.set("req-ttl", true, Duration::from_millis(30)).await.unwrap();
        assert!(store.exists("req-ttl").await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!store.exists("req-ttl").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired() {
        let store = key_store().await;

        store.set("short", true, Duration::from_millis(10)).await.unwrap();
        store.set("long", true, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.exists("long").await.unwrap());
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
