//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::routes;
use crate::services::AchievementService;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Names of the configured store backends, reported by the health probes
#[derive(Debug, Clone, Copy)]
pub struct Backends {
    pub references: &'static str,
    pub documents: &'static str,
}

impl Backends {
    pub fn memory() -> Self {
        Self {
            references: "memory",
            documents: "memory",
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Achievement workflow over both stores
    pub service: Arc<AchievementService>,
    /// Bearer token validation
    pub jwt: JwtValidator,
    pub backends: Backends,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        service: Arc<AchievementService>,
        jwt: JwtValidator,
        backends: Backends,
    ) -> Self {
        Self {
            args,
            service,
            jwt,
            backends,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Prestasi listening on {} (references: {}, documents: {})",
        state.args.listen, state.backends.references, state.backends.documents
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory fallbacks allowed");
    }

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
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        (&Method::GET, "/version") => routes::version_info(),

        (&Method::OPTIONS, _) => routes::preflight_response(),

        _ => match routes::handle_achievement_request(req, Arc::clone(&state)).await {
            Some(response) => response,
            None => routes::not_found_response(&path),
        },
    };

    Ok(to_boxed(response))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
