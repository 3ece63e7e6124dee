//! Response envelope
//!
//! Every API response uses the same JSON shape:
//!
//! ```json
//! { "status": "success" | "error", "message": "...", "data": ..., "errors": ... }
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::types::AppError;

/// JSON envelope
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub status: &'static str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

fn build(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Cache-Control", "no-store")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Success envelope with data
pub fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response<Full<Bytes>> {
    let envelope = Envelope {
        status: "success",
        message,
        data: Some(data),
        errors: None,
    };
    let body = serde_json::to_string(&envelope).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize response");
        r#"{"status":"error","message":"Serialization failed"}"#.to_string()
    });
    build(status, body)
}

/// Error envelope for an application error.
///
/// Server-side faults carry a generic message; the detail stays in the logs.
pub fn error_response(err: &AppError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    let public = err.public_message();
    let envelope: Envelope<'_, ()> = Envelope {
        status: "error",
        message: &public,
        data: None,
        errors: None,
    };
    build(status, serde_json::to_string(&envelope).unwrap_or_default())
}

/// 404 envelope for unknown paths
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let envelope: Envelope<'_, ()> = Envelope {
        status: "error",
        message: "Route not found",
        data: None,
        errors: Some(serde_json::json!({ "path": path })),
    };
    build(
        StatusCode::NOT_FOUND,
        serde_json::to_string(&envelope).unwrap_or_default(),
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Headers",
            "Authorization, Content-Type, X-File-Name",
        )
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}
