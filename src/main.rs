//! Tyumen tick-activity monitor -- process entry point.
//!
//! Loads config, opens the durable store, builds the shared `Context`,
//! and drives the periodic scheduler until interrupted.

use mite_tmn_monitor::config::AppConfig;
use mite_tmn_monitor::context::Context;
use mite_tmn_monitor::scheduler;
use mite_tmn_monitor::store::Store;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("═══════════════════════════════════════════");
    log::info!("  TYUMEN TICK-ACTIVITY MONITOR STARTING UP");
    log::info!("═══════════════════════════════════════════");

    let config_path =
        env::var("MONITOR_CONFIG").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path);

    let db_path = env::var("MONITOR_DB_PATH").unwrap_or_else(|_| "data/monitor.sled".to_string());
    let store = match Store::open(std::path::Path::new(&db_path)) {
        Ok(store) => store,
        Err(e) => {
            log::error!("failed to open store at {db_path}: {e}");
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(Context::new(config, store));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler::run_scheduler(Arc::clone(&ctx), shutdown_rx).await;
    let _ = &handle;

    log::info!(
        "scheduler running, tick every {} minutes",
        ctx.config.parsing.auto_update_interval_minutes
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for shutdown signal: {e}");
    }

    log::info!("shutdown requested, waiting for in-flight run to finish");
    let _ = shutdown_tx.send(true);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    log::info!("monitor stopped");
}
