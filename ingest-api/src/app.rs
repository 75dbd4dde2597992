//! Service assembly: backends chosen by configuration, wired into [`AppState`]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ingest_common::config::{ClientBackend, IdempotencyBackend, RelayBackend};
use ingest_common::ServiceConfig;
use redis::aio::ConnectionManager;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::db;
use crate::relay::{AudioRelay, OutboxRelay, RedisStreamRelay};
use crate::service::{AudioService, ClientService, IdempotencyGuard};
use crate::store::{
    self, ClientStore, IdempotencyStore, RedisClientStore, RedisIdempotencyStore,
    SqliteClientStore, SqliteIdempotencyStore,
};
use crate::AppState;

/// Everything the binary needs to serve and later shut down
pub struct Assembled {
    pub state: AppState,
    /// Present when any component is backed by SQLite
    pub pool: Option<SqlitePool>,
    /// Present when idempotency is enabled
    pub idempotency: Option<Arc<dyn IdempotencyStore>>,
}

fn needs_sqlite(config: &ServiceConfig) -> bool {
    config.store.client_backend == ClientBackend::Document
        || (config.idempotency.enabled && config.idempotency.backend == IdempotencyBackend::Sqlite)
        || config.relay.backend == RelayBackend::Outbox
}

fn needs_redis(config: &ServiceConfig) -> bool {
    config.store.client_backend == ClientBackend::KeyValue
        || (config.idempotency.enabled && config.idempotency.backend == IdempotencyBackend::Redis)
        || config.relay.backend == RelayBackend::RedisStream
}

/// Open backing connections and build the services described by `config`
pub async fn assemble(config: &ServiceConfig, root: &Span) -> Result<Assembled> {
    let pool = if needs_sqlite(config) {
        Some(db::init_database(&config.store.database_path).await?)
    } else {
        None
    };

    let redis = if needs_redis(config) {
        let conn = store::connect_redis(&config.store.redis_url)
            .await
            .with_context(|| format!("Failed to connect to redis at {}", config.store.redis_url))?;
        info!("Connected to redis at {}", config.store.redis_url);
        Some(conn)
    } else {
        None
    };

    let backends = Backends {
        pool: pool.clone(),
        redis,
    };

    let client_store = backends.client_store(config)?;
    let idempotency = if config.idempotency.enabled {
        Some(backends.idempotency_store(config)?)
    } else {
        warn!("Idempotency guard disabled");
        None
    };
    let relay = backends.relay(config)?;

    info!(
        client_backend = client_store.backend(),
        idempotency_backend = idempotency.as_ref().map(|s| s.backend()).unwrap_or("none"),
        relay_backend = relay.backend(),
        "Backends ready"
    );

    let state = build_state(config, client_store, idempotency.clone(), relay, root);
    Ok(Assembled {
        state,
        pool,
        idempotency,
    })
}

/// Wire services over already-constructed collaborators
pub fn build_state(
    config: &ServiceConfig,
    client_store: Arc<dyn ClientStore>,
    idempotency: Option<Arc<dyn IdempotencyStore>>,
    relay: Arc<dyn AudioRelay>,
    root: &Span,
) -> AppState {
    let guard = idempotency.map(|store| {
        IdempotencyGuard::new(
            store,
            config.idempotency.ttl(),
            info_span!(parent: root, "idempotency"),
        )
    });

    let clients = ClientService::new(client_store, guard, info_span!(parent: root, "clients"));
    let audio = AudioService::new(
        relay,
        config.audio.required_length,
        info_span!(parent: root, "audio"),
    );

    AppState::new(clients, audio, config.http.request_timeout())
}

struct Backends {
    pool: Option<SqlitePool>,
    redis: Option<ConnectionManager>,
}

impl Backends {
    fn sqlite(&self) -> Result<SqlitePool> {
        self.pool.clone().context("SQLite pool not opened")
    }

    fn redis(&self) -> Result<ConnectionManager> {
        self.redis.clone().context("Redis connection not opened")
    }

    fn client_store(&self, config: &ServiceConfig) -> Result<Arc<dyn ClientStore>> {
        let store: Arc<dyn ClientStore> = match config.store.client_backend {
            ClientBackend::Document => Arc::new(SqliteClientStore::new(self.sqlite()?)),
            ClientBackend::KeyValue => Arc::new(RedisClientStore::new(
                self.redis()?,
                config.store.client_key_prefix.clone(),
            )),
        };
        Ok(store)
    }

    fn idempotency_store(&self, config: &ServiceConfig) -> Result<Arc<dyn IdempotencyStore>> {
        let store: Arc<dyn IdempotencyStore> = match config.idempotency.backend {
            IdempotencyBackend::Sqlite => Arc::new(SqliteIdempotencyStore::new(self.sqlite()?)),
            IdempotencyBackend::Redis => Arc::new(RedisIdempotencyStore::new(self.redis()?)),
        };
        Ok(store)
    }

    fn relay(&self, config: &ServiceConfig) -> Result<Arc<dyn AudioRelay>> {
        let topic = config.relay.topic.clone();
        let partitions = config.relay.partitions;

        let relay: Arc<dyn AudioRelay> = match config.relay.backend {
            RelayBackend::Outbox => Arc::new(OutboxRelay::new(self.sqlite()?, topic, partitions)),
            RelayBackend::RedisStream => {
                Arc::new(RedisStreamRelay::new(self.redis()?, topic, partitions))
            }
        };
        Ok(relay)
    }
}

/// Periodically remove expired idempotency markers until `cancel` fires
pub fn spawn_idempotency_sweeper(
    store: Arc<dyn IdempotencyStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let span = info_span!("idempotency_sweeper", backend = store.backend());

    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "Purged expired idempotency keys"),
                        Err(e) => warn!("Failed to purge idempotency keys: {}", e),
                    },
                }
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_assembles_on_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.store.database_path = dir.path().join("ingest.db");

        let assembled = assemble(&config, &Span::none()).await.unwrap();

        assert!(assembled.pool.is_some());
        assert!(assembled.idempotency.is_some());
        assert_eq!(assembled.state.clients.backend(), "document");
        assert_eq!(assembled.state.audio.relay_backend(), "outbox");
        assert_eq!(assembled.state.request_timeout, Duration::from_secs(5));
        assert!(config.store.database_path.exists());
    }

    #[tokio::test]
    async fn test_disabled_idempotency_has_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.store.database_path = dir.path().join("ingest.db");
        config.idempotency.enabled = false;

        let assembled = assemble(&config, &Span::none()).await.unwrap();
        assert!(assembled.idempotency.is_none());
    }

    #[test]
    fn test_redis_only_config_needs_no_sqlite() {
        let mut config = ServiceConfig::default();
        config.store.client_backend = ClientBackend::KeyValue;
        config.idempotency.backend = IdempotencyBackend::Redis;
        config.relay.backend = RelayBackend::RedisStream;

        assert!(!needs_sqlite(&config));
        assert!(needs_redis(&config));
        assert!(!needs_redis(&ServiceConfig::default()));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let pool = db::connect_in_memory().await.unwrap();
        let store: Arc<dyn IdempotencyStore> = Arc::new(SqliteIdempotencyStore::new(pool));
        store.set("old", true, Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let cancel = CancellationToken::new();
        let handle =
            spawn_idempotency_sweeper(store.clone(), Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
