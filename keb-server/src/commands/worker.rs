use anyhow::{Context, Result};
use keb_models::{OperationState, OperationType};
use keb_orchestrations::orchestrations::Queue;

use crate::app::App;
use crate::config::Config;

pub async fn run(config: Config, db_in_memory: bool, workers: Option<usize>) -> Result<()> {
    let workers = workers.unwrap_or(config.workers).max(1);
    tracing::info!("Starting KEB dispatch workers");
    tracing::info!("Workers: {}", workers);

    let app = App::build(&config, db_in_memory, workers).await?;

    // Operations accepted before a restart are still pending
    let pending = app
        .storage
        .operations()
        .get_operations_in_state(OperationType::Provision, OperationState::Pending)
        .await
        .context("Failed to load pending provisioning operations")?;
    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "Resuming pending provisioning operations");
    }
    for operation in &pending {
        app.queue.add(&operation.id);
    }

    tracing::info!("✓ KEB workers ready");
    tracing::info!("  Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down, draining queued operations");
    app.queue.shutdown().await;
    tracing::info!("✓ Shutdown complete");

    Ok(())
}
