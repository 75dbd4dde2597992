//! SQLite database setup
//!
//! One database file backs the document client store, the SQLite
//! idempotency store and the outbox relay. Table creation is idempotent, so
//! every startup runs it.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open (creating if missing) the database and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    // Applied to every pooled connection: writers queue on the lock instead of
    // failing immediately
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection: every SQLite connection to `:memory:`
/// opens its own private database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    create_schema(&pool).await?;
    Ok(pool)
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_clients_table(pool).await?;
    create_idempotency_keys_table(pool).await?;
    create_audio_outbox_table(pool).await?;
    Ok(())
}

async fn create_clients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            location_name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            notification_methods TEXT NOT NULL DEFAULT '[]',
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create clients table")?;
    Ok(())
}

async fn create_idempotency_keys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS idempotency_keys (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create idempotency_keys table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_idempotency_keys_expires ON idempotency_keys(expires_at_ms)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_audio_outbox_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audio_outbox (
            topic TEXT NOT NULL,
            partition_id INTEGER NOT NULL,
            message_offset INTEGER NOT NULL,
            message_key TEXT NOT NULL,
            body TEXT NOT NULL,
            enqueued_at_ms INTEGER NOT NULL,
            PRIMARY KEY (topic, partition_id, message_offset)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create audio_outbox table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        create_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(tables, vec!["audio_outbox", "clients", "idempotency_keys"]);
    }

    #[tokio::test]
    async fn test_init_database_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("ingest.db");

        let pool = init_database(&db_path).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;

        // Reopening an existing database keeps working
        let pool = init_database(&db_path).await.unwrap();
        pool.close().await;
    }
}
