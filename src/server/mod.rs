//! HTTP service shell

pub mod http;

pub use http::{run, serve, AppState};
