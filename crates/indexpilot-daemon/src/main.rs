use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "indexpilot-daemon")]
#[command(version)]
#[command(about = "Drives recurring and one-shot indexing schedules")]
struct Cli {
    /// Configuration file path (defaults to ~/.indexpilot/indexpilot.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single tick, print the report as JSON on stdout, and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "indexpilot_daemon=info,indexpilot_scheduler=info,indexpilot_store=info".into()
            }),
        )
        .init();

    // load config: --config > INDEXPILOT_CONFIG env > ~/.indexpilot/indexpilot.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("INDEXPILOT_CONFIG").ok());
    let config =
        indexpilot_core::IndexPilotConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            indexpilot_core::IndexPilotConfig::default()
        });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    indexpilot_store::db::init_db(&db)?;
    info!("database migrations complete");

    let store = Arc::new(indexpilot_store::ScheduleStore::new(db));

    let service = indexpilot_indexing::HttpIndexingService::new(
        config.indexing.base_url.clone(),
        config.indexing.service_token.clone(),
        Duration::from_secs(config.indexing.request_timeout_secs),
    )?;
    info!(base_url = %config.indexing.base_url, "indexing service client ready");
    let service: Arc<dyn indexpilot_indexing::IndexingService> = Arc::new(service);

    let opts = indexpilot_scheduler::EngineOptions::from_config(&config.scheduler)?;
    let engine = indexpilot_scheduler::SchedulerEngine::new(store, service, opts);

    // One-shot mode for external triggers (cron, systemd timers, CI). The
    // report goes to stdout; a selector failure exits non-zero so the
    // trigger's own retry policy can kick in.
    if cli.once {
        let report = engine.run_tick(chrono::Utc::now()).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // loop mode: tick on the configured cadence until ctrl-c
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    engine_task.await?;

    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
