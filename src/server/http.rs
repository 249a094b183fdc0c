//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a single
//! match on (method, path); handlers live in `crate::routes`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::cache::spawn_cleanup_task;
use crate::checker::InvasiveChecker;
use crate::config::Args;
use crate::routes;
use crate::types::CheckerError;

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// The checker engine, shared by every connection
    pub checker: Arc<InvasiveChecker>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, checker: Arc<InvasiveChecker>) -> Self {
        Self {
            args,
            checker,
            started_at: Instant::now(),
        }
    }
}

/// Bind the configured address, start background tasks and serve forever
pub async fn run(state: Arc<AppState>) -> Result<(), CheckerError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Invasive checker listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    let cache = Arc::clone(state.checker.geometry_cache());
    let sweep_interval = cache.config().sweep_interval;
    spawn_cleanup_task(cache, sweep_interval);

    serve(listener, state).await
}

/// Accept loop on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), CheckerError> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        (Method::GET, "/version") => to_boxed(routes::version_info()),

        (Method::GET, "/check") => to_boxed(routes::handle_check(Arc::clone(&state), &query).await),

        (Method::GET, "/check/name") => {
            to_boxed(routes::handle_check_name(Arc::clone(&state), &query).await)
        }

        (Method::GET, "/admin/cache") => to_boxed(routes::handle_cache_stats(Arc::clone(&state))),

        (Method::POST, "/admin/cache/clear") => {
            to_boxed(routes::handle_cache_clear(Arc::clone(&state)))
        }

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        _ => {
            debug!("No route for {}", path);
            to_boxed(not_found_response(&path))
        }
    };

    Ok(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Use GET /check?id=&source=&lon=&lat= or GET /check/name?name=&lon=&lat="
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
