//! Partitioned outbox table in SQLite
//!
//! Each (topic, partition) pair is an append-only log. Offsets are allocated
//! by the inserting statement itself, so they are dense and strictly
//! increasing per partition even with concurrent writers. Downstream
//! consumers poll with [`OutboxRelay::fetch`].

use async_trait::async_trait;
use ingest_common::{time, uuid_utils, RelayEnvelope};
use sqlx::SqlitePool;

use super::{AudioRelay, RelayError, RelayReceipt};

#[derive(Clone)]
pub struct OutboxRelay {
    db: SqlitePool,
    topic: String,
    partitions: u32,
}

/// One stored message as a consumer sees it
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub envelope: RelayEnvelope,
}

impl OutboxRelay {
    pub fn new(db: SqlitePool, topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            db,
            topic: topic.into(),
            partitions: partitions.max(1),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Read up to `limit` messages of one partition starting at `from_offset`
    pub async fn fetch(
        &self,
        partition: i32,
        from_offset: i64,
        limit: i64,
    ) -> Result<Vec<OutboxMessage>, RelayError> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT message_offset, message_key, body
            FROM audio_outbox
            WHERE topic = ? AND partition_id = ? AND message_offset >= ?
            ORDER BY message_offset
            LIMIT ?
            "#,
        )
        .bind(&self.topic)
        .bind(partition)
        .bind(from_offset)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(offset, key, body)| {
                Ok(OutboxMessage {
                    partition,
                    offset,
                    key,
                    envelope: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AudioRelay for OutboxRelay {
    fn backend(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, envelope: &RelayEnvelope) -> Result<RelayReceipt, RelayError> {
        let body = envelope.to_json()?;
        let partition = uuid_utils::partition_for(&envelope.request_id, self.partitions);

        // Allocation and insert share one statement, so the write lock is taken
        // before the current maximum is read
        let offset: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audio_outbox
                (topic, partition_id, message_offset, message_key, body, enqueued_at_ms)
            SELECT ?, ?, COALESCE(MAX(message_offset) + 1, 0), ?, ?, ?
            FROM audio_outbox
            WHERE topic = ? AND partition_id = ?
            RETURNING message_offset
            "#,
        )
        .bind(&self.topic)
        .bind(partition)
        .bind(envelope.request_id.to_string())
        .bind(&body)
        .bind(time::now_millis())
        .bind(&self.topic)
        .bind(partition)
        .fetch_one(&self.db)
        .await?;

        Ok(RelayReceipt { partition, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use uuid::Uuid;

    fn envelope(request_id: Uuid) -> RelayEnvelope {
        RelayEnvelope {
            request_id,
            client_id: Uuid::new_v4(),
            timestamp: 1_700_000_000_000_000_000,
            payload: vec![7; 16],
        }
    }

    #[tokio::test]
    async fn test_offsets_are_dense_per_partition() {
        let relay = OutboxRelay::new(db::connect_in_memory().await.unwrap(), "audio", 4);
        let request_id = Uuid::from_u128(6); // partition 2 of 4

        let first = relay.send(&envelope(request_id)).await.unwrap();
        let second = relay.send(&envelope(request_id)).await.unwrap();

        assert_eq!(first, RelayReceipt { partition: 2, offset: 0 });
        assert_eq!(second, RelayReceipt { partition: 2, offset: 1 });

        let other = relay.send(&envelope(Uuid::from_u128(1))).await.unwrap();
        assert_eq!(other, RelayReceipt { partition: 1, offset: 0 });
    }

    #[tokio::test]
    async fn test_fetch_returns_stored_envelopes() {
        let relay = OutboxRelay::new(db::connect_in_memory().await.unwrap(), "audio", 1);
        let sent = envelope(Uuid::new_v4());
        relay.send(&sent).await.unwrap();

        let messages = relay.fetch(0, 0, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].key, sent.request_id.to_string());
        assert_eq!(messages[0].envelope, sent);

        assert!(relay.fetch(0, 1, 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_get_dense_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::init_database(&dir.path().join("outbox.db")).await.unwrap();
        let relay = OutboxRelay::new(pool, "audio", 1);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let relay = relay.clone();
                tokio::spawn(async move { relay.send(&envelope(Uuid::new_v4())).await })
            })
            .collect();

        let mut offsets = Vec::new();
        for handle in handles {
            let receipt = handle.await.unwrap().expect("concurrent send should succeed");
            assert_eq!(receipt.partition, 0);
            offsets.push(receipt.offset);
        }
        offsets.sort_unstable();

        assert_eq!(offsets, (0..64).collect::<Vec<i64>>());
        assert_eq!(relay.fetch(0, 0, 100).await.unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let pool = db::connect_in_memory().await.unwrap();
        let audio = OutboxRelay::new(pool.clone(), "audio", 1);
        let other = OutboxRelay::new(pool, "other", 1);

        audio.send(&envelope(Uuid::new_v4())).await.unwrap();
        let receipt = other.send(&envelope(Uuid::new_v4())).await.unwrap();

        assert_eq!(receipt.offset, 0);
        assert_eq!(other.topic(), "other");
    }
}
