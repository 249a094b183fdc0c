//! Cache administration
//!
//! - `GET /admin/cache` - geometry cache and remote memo statistics
//! - `POST /admin/cache/clear` - drop every cached geometry and memoized response

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cache::GeometryCacheStats;
use crate::routes::json_response;
use crate::server::AppState;
use crate::services::RemoteClientStats;

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub geometry: GeometryCacheStats,
    pub remote: RemoteClientStats,
}

#[derive(Debug, Serialize)]
pub struct CacheClearResponse {
    pub message: String,
    pub geometries: usize,
    pub memoized_responses: usize,
}

pub fn handle_cache_stats(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = CacheStatsResponse {
        geometry: state.checker.geometry_cache().stats(),
        remote: state.checker.remote().stats(),
    };
    json_response(StatusCode::OK, &response)
}

pub fn handle_cache_clear(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let geometries = state.checker.geometry_cache().clear();
    let memoized_responses = state.checker.remote().clear_memo();

    info!(
        geometries = geometries,
        memoized_responses = memoized_responses,
        "Caches cleared"
    );

    let response = CacheClearResponse {
        message: format!("Cleared {} cached region geometries", geometries),
        geometries,
        memoized_responses,
    };
    json_response(StatusCode::OK, &response)
}
