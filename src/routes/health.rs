//! Health check and version endpoints
//!
//! - /health, /healthz - Liveness probe, includes cache figures
//! - /version - Build information

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::GeometryCacheStats;
use crate::routes::json_response;
use crate::server::AppState;
use crate::services::RemoteClientStats;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since the service started
    pub uptime: u64,
    pub timestamp: String,
    pub node_id: String,
    pub upstream: UpstreamInfo,
    pub geometry_cache: GeometryCacheStats,
    pub remote: RemoteClientStats,
}

#[derive(Serialize)]
pub struct UpstreamInfo {
    pub worms: String,
    pub marine_regions: String,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let config = state.checker.config();

    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        node_id: state.args.node_id.to_string(),
        upstream: UpstreamInfo {
            worms: config.worms_base_url.clone(),
            marine_regions: config.marine_regions_base_url.clone(),
        },
        geometry_cache: state.checker.geometry_cache().stats(),
        remote: state.checker.remote().stats(),
    }
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is serving. Upstream reachability is not
/// probed.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &build_health_response(&state))
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "invasive-checker",
    };

    json_response(StatusCode::OK, &response)
}
