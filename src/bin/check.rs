//! Invasive Check - one-shot command line check
//!
//! Usage:
//!   invasive-check --id 132762 --lon 2.5 --lat 51.5
//!   invasive-check --id 860360 --source ncbi --lon 2.5 --lat 51.5 --nearest
//!   invasive-check --id "Animalia;Arthropoda;Hemigrapsus sanguineus" --source lineage
//!
//! Prints `{"summary": ..., "details": ...}` as JSON on stdout. Upstream
//! endpoints are taken from the same environment variables as the service
//! (WORMS_BASE_URL, MARINE_REGIONS_BASE_URL, REQUEST_TIMEOUT_MS, ...).

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use invasive_checker::cache::GeometryCacheConfig;
use invasive_checker::config::UpstreamArgs;
use invasive_checker::services::IdSource;
use invasive_checker::{CheckOptions, CheckerConfig, InvasiveChecker, SamplePoint};

#[derive(Parser, Debug)]
#[command(name = "invasive-check")]
#[command(about = "Check whether a taxon is native or introduced at a sample point")]
#[command(version)]
struct Args {
    /// Organism identifier (AphiaID, scientific name, lineage or accession)
    #[arg(long)]
    id: String,

    /// How to interpret the identifier: worms, sciname, lineage, or a
    /// foreign scheme (algaebase, bold, dyntaxa, fishbase, iucn, lsid, ncbi, tsn, gisd)
    #[arg(long, default_value = "worms")]
    source: IdSource,

    /// Sample longitude (WGS84 degrees)
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Sample latitude (WGS84 degrees)
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Also report the nearest introduced region
    #[arg(long)]
    nearest: bool,

    /// Radius in degrees used for the "within buffer" flag
    #[arg(long, env = "BUFFER_DEG", default_value = "5.0")]
    buffer_deg: f64,

    #[command(flatten)]
    upstream: UpstreamArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = args.upstream.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let checker = InvasiveChecker::new(CheckerConfig {
        worms_base_url: args.upstream.worms_base_url.clone(),
        marine_regions_base_url: args.upstream.marine_regions_base_url.clone(),
        remote: args.upstream.remote_config(),
        cache: GeometryCacheConfig::default(),
        buffer_deg: args.buffer_deg,
        ..Default::default()
    });

    let sample = SamplePoint::from_parts(args.lon, args.lat);
    info!(id = %args.id, source = %args.source, "Checking");

    let outcome = checker
        .check_organism_with(
            sample,
            &args.id,
            args.source,
            CheckOptions {
                nearest: args.nearest,
            },
        )
        .await
        .context("check failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_checked() {
        std::process::exit(2);
    }

    Ok(())
}
