//! HTTP routes

pub mod admin;
pub mod check;
pub mod health;

pub use admin::{handle_cache_clear, handle_cache_stats};
pub use check::{handle_check, handle_check_name};
pub use health::{health_check, version_info};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSON response with permissive CORS
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|e| format!(r#"{{"error":"Serialization failed: {}"}}"#, e));

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Error response with a message
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message
    });
    json_response(status, &body)
}
