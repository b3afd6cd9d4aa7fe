use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;
mod commands;
mod config;
mod db;

use cli::{Args, Mode};

/// Initialize tracing with dual output:
/// 1. Console output (stdout)
/// 2. File output (~/.keb/server.log)
fn initialize_tracing() -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,\
         keb_server=debug,\
         keb_orchestrations=debug,\
         sqlx::query=warn"
            .into()
    });

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let keb_dir = PathBuf::from(home).join(".keb");
    std::fs::create_dir_all(&keb_dir).ok();

    let file_appender = tracing_appender::rolling::never(&keb_dir, "server.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops file logging
    std::mem::forget(guard);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let stdout_layer = fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    initialize_tracing()?;

    let config = config::Config::load()?;
    let db_in_memory = args.db_in_memory;

    match args.mode {
        Mode::Worker { workers } => {
            commands::worker::run(config, db_in_memory, workers).await
        }
        Mode::Provision(request) => {
            commands::broker::run_provision(config, db_in_memory, request).await
        }
        Mode::Deprovision { instance_id, wait } => {
            commands::broker::run_deprovision(config, db_in_memory, instance_id, wait).await
        }
        Mode::LastOperation { instance_id, operation } => {
            commands::broker::run_last_operation(config, db_in_memory, instance_id, operation).await
        }
        Mode::Get { instance_id, output } => {
            commands::broker::run_get(config, db_in_memory, instance_id, output).await
        }
    }
}
