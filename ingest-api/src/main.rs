//! ingest-api - client registration and audio ingestion service
//!
//! Startup order: configuration, logging, backends, idempotency sweeper,
//! HTTP server. Shutdown reverses it after the server drains.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ingest_common::ServiceConfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ingest_api::{app, build_router};

/// Command-line arguments for ingest-api
#[derive(Parser, Debug)]
#[command(name = "ingest-api")]
#[command(about = "Client registration and audio ingestion API")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "INGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides http.bind
    #[arg(short, long, env = "INGEST_BIND")]
    bind: Option<String>,

    /// Log filter, overrides logging.level
    #[arg(long, env = "INGEST_LOG")]
    log_level: Option<String>,

    /// SQLite database file, overrides store.database_path
    #[arg(long, env = "INGEST_DATABASE")]
    database: Option<PathBuf>,

    /// Redis URL, overrides store.redis_url
    #[arg(long, env = "INGEST_REDIS_URL")]
    redis_url: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(bind) = &self.bind {
            config.http.bind = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(database) = &self.database {
            config.store.database_path = database.clone();
        }
        if let Some(url) = &self.redis_url {
            config.store.redis_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = ServiceConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    source.log();

    info!(
        "Starting ingest-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root = info_span!("ingest");
    let assembled = match app::assemble(&config, &root).await {
        Ok(assembled) => assembled,
        Err(e) => {
            error!("Failed to initialize backends: {:#}", e);
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    let sweeper = assembled.idempotency.clone().map(|store| {
        app::spawn_idempotency_sweeper(
            store,
            config.idempotency.purge_interval(),
            cancel.clone(),
        )
    });

    let app = build_router(assembled.state);

    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.http.bind))?;
    info!("ingest-api listening on http://{}", config.http.bind);
    info!("Health check: http://{}/health", config.http.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            error!("Idempotency sweeper panicked: {}", e);
        }
    }
    if let Some(pool) = assembled.pool {
        pool.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
