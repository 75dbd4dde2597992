//! Configuration loading and config file resolution
//!
//! Bootstrap settings come from a TOML file. Resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file in the platform config directory
//! 4. Compiled defaults (fallback)
//!
//! Command-line and environment overrides for individual fields are applied
//! by the binary after [`ServiceConfig::load`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "INGEST_CONFIG";

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub idempotency: IdempotencyConfig,
    pub audio: AudioConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address
    pub bind: String,
    /// Deadline applied to every store and relay call of one request
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Which backend holds client records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientBackend {
    /// Structured rows in SQLite
    Document,
    /// Opaque JSON blobs in Redis
    KeyValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub client_backend: ClientBackend,
    pub database_path: PathBuf,
    pub redis_url: String,
    pub client_key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            client_backend: ClientBackend::Document,
            database_path: PathBuf::from("ingest.db"),
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            client_key_prefix: "client:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdempotencyBackend {
    Sqlite,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    pub enabled: bool,
    pub backend: IdempotencyBackend,
    pub ttl_secs: u64,
    pub purge_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: IdempotencyBackend::Sqlite,
            ttl_secs: 20,
            purge_interval_secs: 60,
        }
    }
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Exact byte length every uploaded sample must have
    pub required_length: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            required_length: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelayBackend {
    /// Partitioned outbox table in SQLite
    Outbox,
    /// One Redis stream per partition
    RedisStream,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub backend: RelayBackend,
    pub topic: String,
    pub partitions: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            backend: RelayBackend::Outbox,
            topic: "audio".to_string(),
            partitions: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Origin of a loaded [`ServiceConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No config file was found; compiled defaults are in effect
    Defaults,
}

impl ConfigSource {
    /// Emit the startup line describing this source
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

impl ServiceConfig {
    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration and report where it came from
    ///
    /// A file requested by argument or environment must exist. Otherwise the
    /// platform locations are tried, and a missing file falls back to defaults.
    /// Nothing is logged here; callers log the returned [`ConfigSource`] once
    /// their subscriber is installed.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match resolve_config_path(explicit, CONFIG_ENV_VAR) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                let config = Self::from_toml_str(&content)?;
                Ok((config, ConfigSource::File(path)))
            }
            // Platform locations only resolve when the file exists, so a missing
            // path here was requested explicitly
            Some(path) => Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok((config, ConfigSource::Defaults))
            }
        }
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.audio.required_length == 0 {
            return Err(Error::Config(
                "audio.required_length must be greater than 0".to_string(),
            ));
        }
        if self.relay.partitions == 0 || self.relay.partitions > i32::MAX as u32 {
            return Err(Error::Config(format!(
                "relay.partitions must be between 1 and {}",
                i32::MAX
            )));
        }
        if self.relay.topic.trim().is_empty() {
            return Err(Error::Config("relay.topic must not be empty".to_string()));
        }
        if self.idempotency.ttl_secs == 0 {
            return Err(Error::Config(
                "idempotency.ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.http.request_timeout_ms == 0 {
            return Err(Error::Config(
                "http.request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file resolution following the priority order in the module docs
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config locations
    default_config_file()
}

/// First existing config file among the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ingest").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/ingest/config.toml");
    if cfg!(unix) && system_config.exists() {
        return Some(system_config);
    }

    None
}
