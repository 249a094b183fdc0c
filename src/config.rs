//! Configuration for the invasive checker
//!
//! CLI arguments and environment variable handling using clap. A `.env`
//! file is honoured by the binaries via dotenvy.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::GeometryCacheConfig;
use crate::checker::{CheckerConfig, DEFAULT_MARINE_REGIONS_BASE_URL, DEFAULT_WORMS_BASE_URL};
use crate::services::RemoteClientConfig;

/// Invasive Checker - native / introduced status of marine taxa at sample points
#[derive(Parser, Debug, Clone)]
#[command(name = "invasive-checker")]
#[command(about = "WRiMS distribution lookups against Marine Regions geometries")]
pub struct Args {
    /// Unique node identifier for this service instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upstream services
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Geometry cache
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Radius in degrees used for the "within buffer" flag
    #[arg(long, env = "BUFFER_DEG", default_value = "5.0")]
    pub buffer_deg: f64,
}

/// Upstream REST endpoints and request policy
#[derive(Parser, Debug, Clone)]
pub struct UpstreamArgs {
    /// WoRMS REST base URL
    #[arg(long, env = "WORMS_BASE_URL", default_value = DEFAULT_WORMS_BASE_URL)]
    pub worms_base_url: String,

    /// Marine Regions REST base URL
    #[arg(long, env = "MARINE_REGIONS_BASE_URL", default_value = DEFAULT_MARINE_REGIONS_BASE_URL)]
    pub marine_regions_base_url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Wait before retrying a rate-limited (HTTP 429) request, in milliseconds
    #[arg(long, env = "RATE_LIMIT_BACKOFF_MS", default_value = "2000")]
    pub rate_limit_backoff_ms: u64,
}

/// Geometry cache sizing and expiry
#[derive(Parser, Debug, Clone)]
pub struct CacheArgs {
    /// How long a downloaded region geometry is trusted (default: 1 week)
    #[arg(long, env = "GEOMETRY_RETENTION_SECS", default_value = "604800")]
    pub geometry_retention_secs: u64,

    /// Maximum cached regions
    #[arg(long, env = "GEOMETRY_CACHE_MAX_ENTRIES", default_value = "5000")]
    pub geometry_cache_max_entries: usize,

    /// Maximum WKT fragments combined per region
    #[arg(long, env = "GEOMETRY_FRAGMENT_LIMIT", default_value = "20")]
    pub geometry_fragment_limit: usize,

    /// Interval between stale-entry sweeps
    #[arg(long, env = "CACHE_SWEEP_INTERVAL_SECS", default_value = "3600")]
    pub cache_sweep_interval_secs: u64,
}

impl UpstreamArgs {
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("WORMS_BASE_URL", &self.worms_base_url),
            ("MARINE_REGIONS_BASE_URL", &self.marine_regions_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL, got {}", name, url));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn remote_config(&self) -> RemoteClientConfig {
        RemoteClientConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            rate_limit_backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            ..Default::default()
        }
    }
}

impl CacheArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.geometry_cache_max_entries == 0 {
            return Err("GEOMETRY_CACHE_MAX_ENTRIES must be greater than zero".to_string());
        }
        if self.geometry_fragment_limit == 0 {
            return Err("GEOMETRY_FRAGMENT_LIMIT must be greater than zero".to_string());
        }
        if self.cache_sweep_interval_secs == 0 {
            return Err("CACHE_SWEEP_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn cache_config(&self) -> GeometryCacheConfig {
        GeometryCacheConfig {
            retention: Duration::from_secs(self.geometry_retention_secs),
            max_entries: self.geometry_cache_max_entries,
            sweep_interval: Duration::from_secs(self.cache_sweep_interval_secs),
        }
    }
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.upstream.validate()?;
        self.cache.validate()?;

        if !self.buffer_deg.is_finite() || self.buffer_deg < 0.0 {
            return Err("BUFFER_DEG must be a non-negative number".to_string());
        }

        Ok(())
    }

    /// Engine configuration derived from the arguments
    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            worms_base_url: self.upstream.worms_base_url.clone(),
            marine_regions_base_url: self.upstream.marine_regions_base_url.clone(),
            remote: self.upstream.remote_config(),
            cache: self.cache.cache_config(),
            fragment_limit: self.cache.geometry_fragment_limit,
            buffer_deg: self.buffer_deg,
        }
    }
}
