//! # InvenStore Server
//!
//! Binary entry point: configuration, database, cache, then serve.
//!
//! ```text
//! ServerConfig::load ──► Database::new (migrations) ──► Cache ──► axum::serve
//!                                                       │
//!                                  REDIS_URL set? ──────┴── Redis, else memory
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use invenstore_db::{Database, DbConfig};
use invenstore_server::cache::{Cache, MemoryCache, RedisCache};
use invenstore_server::{build_app, AppState, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "invenstore_server=info,invenstore_db=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(true)
        .init();

    info!("Starting InvenStore server...");
    info!(
        port = config.port,
        database = %config.database_path,
        production = config.is_production(),
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(&config.database_path).max_connections(config.db_max_connections))
        .await
        .context("Failed to open database")?;
    info!("Database ready, migrations applied");

    let cache: Arc<dyn Cache> = match config.redis_url.as_deref() {
        Some(url) => match RedisCache::connect(url).await {
            Ok(redis) => {
                info!("Connected to Redis");
                Arc::new(redis)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, using in-memory cache");
                Arc::new(MemoryCache::new())
            }
        },
        None => Arc::new(MemoryCache::new()),
    };

    let addr = config.bind_address();
    let state = AppState::new(db.clone(), cache, config);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
