//! Redis Streams relay
//!
//! Partition `p` of topic `t` is the stream `t.p`. The message is appended
//! with XADD and the stream length read back in the same MULTI block, so the
//! reported offset is the entry's zero-based position in its stream.

use async_trait::async_trait;
use ingest_common::{uuid_utils, RelayEnvelope};
use redis::aio::ConnectionManager;

use super::{AudioRelay, RelayError, RelayReceipt};

#[derive(Clone)]
pub struct RedisStreamRelay {
    conn: ConnectionManager,
    topic: String,
    partitions: u32,
}

impl RedisStreamRelay {
    pub fn new(conn: ConnectionManager, topic: impl Into<String>, partitions: u32) -> Self {
        Self {
            conn,
            topic: topic.into(),
            partitions: partitions.max(1),
        }
    }

    fn stream_name(&self, partition: i32) -> String {
        format!("{}.{}", self.topic, partition)
    }
}

#[async_trait]
impl AudioRelay for RedisStreamRelay {
    fn backend(&self) -> &'static str {
        "redis-stream"
    }

    async fn send(&self, envelope: &RelayEnvelope) -> Result<RelayReceipt, RelayError> {
        let body = envelope.to_json()?;
        let partition = uuid_utils::partition_for(&envelope.request_id, self.partitions);
        let stream = self.stream_name(partition);
        let mut conn = self.conn.clone();

        let (_entry_id, length): (String, i64) = redis::pipe()
            .atomic()
            .cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("key")
            .arg(envelope.request_id.to_string())
            .arg("value")
            .arg(body)
            .cmd("XLEN")
            .arg(&stream)
            .query_async(&mut conn)
            .await?;

        Ok(RelayReceipt {
            partition,
            offset: length - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_offsets_follow_stream_length() {
        let Ok(url) = std::env::var("INGEST_TEST_REDIS_URL") else {
            eprintln!("Skipping test: INGEST_TEST_REDIS_URL not set");
            return;
        };
        let conn = crate::store::connect_redis(&url).await.unwrap();
        let topic = format!("test-audio-{}", Uuid::new_v4());
        let relay = RedisStreamRelay::new(conn, topic.clone(), 1);

        let envelope = RelayEnvelope {
            request_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            timestamp: 42,
            payload: vec![1, 2, 3],
        };

        let first = relay.send(&envelope).await.unwrap();
        let second = relay.send(&envelope).await.unwrap();
        assert_eq!(first, RelayReceipt { partition: 0, offset: 0 });
        assert_eq!(second, RelayReceipt { partition: 0, offset: 1 });
        assert_eq!(relay.stream_name(0), format!("{}.0", topic));
    }
}
