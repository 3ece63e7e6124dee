//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /ready, /readyz - Readiness probe (can both stores be reached?)
//!
//! Liveness never touches the stores. Readiness pings the reference and
//! document stores and returns 503 when either one is down.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::server::AppState;

/// Store connectivity
#[derive(Serialize)]
pub struct StoreHealth {
    /// Backend name (postgres, mongodb, memory)
    pub backend: &'static str,
    /// Whether the last ping succeeded; None on liveness probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    pub timestamp: String,
    /// Operating mode
    pub mode: &'static str,
    pub references: StoreHealth,
    pub documents: StoreHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(
    state: &AppState,
    references_ok: Option<bool>,
    documents_ok: Option<bool>,
) -> HealthResponse {
    let degraded = references_ok == Some(false) || documents_ok == Some(false);

    let error = match (references_ok, documents_ok) {
        (Some(false), Some(false)) => Some("Reference and document stores unreachable".to_string()),
        (Some(false), _) => Some("Reference store unreachable".to_string()),
        (_, Some(false)) => Some("Document store unreachable".to_string()),
        _ => None,
    };

    HealthResponse {
        healthy: !degraded,
        status: if degraded { "degraded" } else { "online" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        references: StoreHealth {
            backend: state.backends.references,
            reachable: references_ok,
        },
        documents: StoreHealth {
            backend: state.backends.documents,
            reachable: documents_ok,
        },
        error,
    }
}

fn json(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle liveness probe (/health, /healthz)
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state, None, None);
    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());
    json(StatusCode::OK, body)
}

/// Handle readiness probe (/ready, /readyz)
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let reference_store = state.service.references();
    let document_store = state.service.documents();
    let (references, documents) = tokio::join!(reference_store.ping(), document_store.ping());

    if let Err(ref e) = references {
        warn!(error = %e, "Reference store ping failed");
    }
    if let Err(ref e) = documents {
        warn!(error = %e, "Document store ping failed");
    }

    let response = build_health_response(&state, Some(references.is_ok()), Some(documents.is_ok()));
    let status = if response.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());
    json(status, body)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
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
        service: "prestasi",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());
    json(StatusCode::OK, body)
}
