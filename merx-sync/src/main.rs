//! merx-sync - Catalog Sync Service
//!
//! Reconciles the QPI validation extract, the marketplace status
//! snapshot, and the PIM extract into the shared item catalog. Runs on a
//! daily schedule with an HTTP trigger surface, or once from the command
//! line with `--once`.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use merx_sync::config::SyncConfig;
use merx_sync::orchestrator::SyncEngine;
use merx_sync::scheduler::{SyncScheduler, SyncService};
use merx_sync::AppState;

#[derive(Debug, Parser)]
#[command(name = "merx-sync", version, about = "merx catalog sync service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Data folder holding merx.db (overrides MERX_DATA_DIR and config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Run one sync, print the composite report as JSON, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = merx_common::config::load_toml_config(cli.config.as_deref())?;

    // RUST_LOG wins; the config file supplies the default filter
    let default_filter = toml_config.logging.level.clone().unwrap_or_else(|| "info".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting merx-sync (Catalog Sync)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let data_dir = merx_common::config::resolve_data_dir(cli.data_dir.as_deref(), &toml_config);
    let db_path = merx_common::config::ensure_data_dir(&data_dir)?;
    info!("Database: {}", db_path.display());

    let config = SyncConfig::resolve(&toml_config, &data_dir, db_path)?;

    let db_pool = merx_common::db::init_database(&config.database_path).await?;
    info!("Database connection established");

    let engine = SyncEngine::new(db_pool.clone(), config.feeds.clone());
    let service = SyncService::new(engine);

    if cli.once {
        // try_run cannot be busy here: this process owns the only guard
        let report = service
            .try_run()
            .await
            .map_err(|e| anyhow::anyhow!("sync did not run: {e}"))?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.all_succeeded() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let scheduler = SyncScheduler::new(service.clone(), config.daily_at);
    let _scheduler_task = scheduler.start();
    info!("Daily sync scheduled at {} UTC", config.daily_at.format("%H:%M"));

    let state = AppState::new(db_pool, service);
    let app = merx_sync::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
