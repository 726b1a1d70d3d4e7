//! Runway control service - loads the airport configuration and runs the
//! scheduling workers until interrupted.

use std::sync::Arc;

use anyhow::Result;

use runway_control::{load_seed_file, logging, Config, ControlService, ControlState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    logging::init("runway_control=debug", config.log_json)?;

    tracing::info!("Starting runway control...");
    tracing::info!("Loading seed data from {}", config.seed_path);
    let seed = load_seed_file(&config.seed_path)?;
    let state = Arc::new(ControlState::from_seed(config, seed)?);

    let service = ControlService::start(state.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, waiting for landings in progress");

    let pending = service.shutdown().await;
    let stats = state.statistics();
    tracing::info!(
        "Stopped: {} landings ({} emergency), {} preemptions, {} requests left waiting",
        stats.total_landings,
        stats.emergency_landings,
        stats.preemptions,
        pending.len()
    );
    Ok(())
}
