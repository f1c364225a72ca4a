use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use ashiato::config::{Cli, Config};
use ashiato::db;
use ashiato::routes;
use ashiato::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path(), config.database.pool_size)?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());

    if config.cache.load_on_start {
        let loaded = state.warm_or_empty().await;
        tracing::info!("Identity cache loaded with {} users", loaded);
    }
    let sweeper = state
        .identities
        .spawn_sweeper(config.cache.sweep_interval());

    let app = routes::app(state.clone());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    if config.cache.save_on_shutdown {
        match state.snapshots.save(&config.snapshot_path()).await {
            Ok(saved) => tracing::info!("Saved {} cached users", saved),
            Err(e) => tracing::warn!("Could not save identity cache: {}", e),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
