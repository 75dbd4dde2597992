//! # Ingest Common Library
//!
//! Shared code for the client-registration and audio-ingestion services:
//! - Configuration loading (TOML bootstrap with env/CLI overrides)
//! - Client and audio models, including the relay envelope wire format
//! - Error types
//! - Timestamp and UUID helpers

pub mod config;
pub mod error;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use config::{ConfigSource, ServiceConfig};
pub use error::{Error, Result};
pub use models::{AudioMessage, Client, ClientInfo, RelayEnvelope};
