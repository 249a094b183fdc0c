//! Invasive Checker - HTTP service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invasive_checker::{config::Args, server, InvasiveChecker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("invasive_checker={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Invasive Checker");
    info!("  WRiMS x Marine Regions");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("WoRMS: {}", args.upstream.worms_base_url);
    info!("Marine Regions: {}", args.upstream.marine_regions_base_url);
    info!(
        "Geometry cache: {} entries, {}s retention, sweep every {}s",
        args.cache.geometry_cache_max_entries,
        args.cache.geometry_retention_secs,
        args.cache.cache_sweep_interval_secs
    );
    info!("Buffer: {} deg", args.buffer_deg);
    info!("======================================");

    let checker = Arc::new(InvasiveChecker::new(args.checker_config()));
    let state = server::AppState::new(args, checker);

    server::run(Arc::new(state)).await?;

    Ok(())
}
