//! assetlog server — application entry point.

use std::sync::Arc;

use anyhow::Context;
use assetlog_db::{DbManager, SurrealStore};
use assetlog_engine::AuditService;
use assetlog_server::{ServerConfig, build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("assetlog=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting assetlog server...");

    let config = ServerConfig::from_env().context("invalid configuration")?;
    let db = DbManager::connect(&config.db)
        .await
        .context("failed to connect to SurrealDB")?;
    let store = SurrealStore::new(db.client().clone());
    let audit = Arc::new(AuditService::new(store, config.engine.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, build_router(audit))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("assetlog server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
