//! Check endpoints
//!
//! - `GET /check?id=&source=&lon=&lat=[&nearest=true]`
//! - `GET /check/name?name=&lon=&lat=[&nearest=true]`
//!
//! Both answer `{"summary": ..., "details": ...}`. A failed check (unknown
//! taxon, no distribution) is still a 200; `details` is then `null` and the
//! summary carries `Error`. Data-integrity violations are a 500.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::checker::{CheckOptions, CheckOutcome};
use crate::routes::{error_response, json_response};
use crate::server::AppState;
use crate::services::IdSource;
use crate::types::{CheckerError, SamplePoint};

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub nearest: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub nearest: Option<String>,
}

pub async fn handle_check(state: Arc<AppState>, query: &str) -> Response<Full<Bytes>> {
    let params: CheckQuery = match serde_urlencoded::from_str(query) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid query: {}", e)),
    };

    let source = match params.source.as_deref().filter(|s| !s.trim().is_empty()) {
        None => IdSource::Worms,
        Some(raw) => match raw.parse::<IdSource>() {
            Ok(source) => source,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        },
    };

    let (sample, options) = match sample_and_options(&params.lon, &params.lat, &params.nearest) {
        Ok(parsed) => parsed,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let result = state
        .checker
        .check_organism_with(sample, &params.id, source, options)
        .await;
    outcome_response(result)
}

pub async fn handle_check_name(state: Arc<AppState>, query: &str) -> Response<Full<Bytes>> {
    let params: NameQuery = match serde_urlencoded::from_str(query) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid query: {}", e)),
    };

    let (sample, options) = match sample_and_options(&params.lon, &params.lat, &params.nearest) {
        Ok(parsed) => parsed,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let result = state.checker.check_by_name(sample, &params.name, options).await;
    outcome_response(result)
}

fn outcome_response(result: Result<CheckOutcome, CheckerError>) -> Response<Full<Bytes>> {
    match result {
        Ok(outcome) => json_response(StatusCode::OK, &outcome),
        Err(e) => {
            error!("Check failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn sample_and_options(
    lon: &Option<String>,
    lat: &Option<String>,
    nearest: &Option<String>,
) -> Result<(SamplePoint, CheckOptions), String> {
    let sample = SamplePoint::from_parts(coordinate("lon", lon)?, coordinate("lat", lat)?);
    let nearest = match nearest.as_deref().map(str::trim) {
        None | Some("") | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(other) => return Err(format!("nearest must be true or false, got {}", other)),
    };
    Ok((sample, CheckOptions { nearest }))
}

/// Empty means "not given"; anything else must be a finite number
fn coordinate(name: &str, raw: &Option<String>) -> Result<Option<f64>, String> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| format!("{} must be a number, got {}", name, value)),
    }
}
