// crates/server/src/main.rs
//! Railvision server binary.

use anyhow::{Context, Result};
use clap::Parser;
use railvision_server::{
    create_app, init_metrics, logging, spawn_retention_sweeper, AppState, Config,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    let _log_guard = logging::init_tracing(&config.log_level, config.log_file.as_deref())?;

    init_metrics();

    let state = AppState::from_config(&config)
        .await
        .with_context(|| format!("opening upload directory {}", config.upload_dir.display()))?;

    if let Some(max_age) = config.retention() {
        info!(retention_secs = max_age.as_secs(), "Job retention enabled");
        spawn_retention_sweeper(state.orchestrator.clone(), max_age);
    }

    info!(
        backends = ?state.orchestrator.list_backend_names(),
        default_backend = %state.default_backend,
        max_workers = config.max_workers,
        max_file_size = config.max_file_size,
        "Analysis backends ready"
    );

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    info!("Video analysis service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
