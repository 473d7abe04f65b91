use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use taxwise_api::config::{AppConfig, StorageBackend};
use taxwise_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use taxwise_api::gateway::HttpGateway;
use taxwise_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting TaxWise API in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let (store, manager): (Arc<dyn Store>, Option<DatabaseManager>) = match config.database.backend {
        StorageBackend::Postgres => {
            let manager = DatabaseManager::connect(&config.database)
                .await
                .context("connecting to Postgres")?;
            if config.database.run_migrations {
                manager.run_migrations().await.context("running migrations")?;
            }
            (Arc::new(PgStore::new(manager.pool().clone())), Some(manager))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let gateway = HttpGateway::from_config(&config.gateway).context("invalid AI_BACKEND_URL")?;
    tracing::info!(gateway = %gateway.base_url(), "Analysis backend configured");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, store, Arc::new(gateway));
    let app = taxwise_api::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("TaxWise API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(manager) = manager {
        manager.close().await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
