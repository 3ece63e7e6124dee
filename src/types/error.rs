//! Error types for prestasi
//!
//! Every workflow operation returns one of these kinds. Store-level failures
//! are translated into them at the service boundary, so the transport only
//! ever sees this taxonomy.

use hyper::StatusCode;

/// Message returned to clients for any database fault. The real cause is
/// logged, never sent.
pub const GENERIC_DATABASE_MESSAGE: &str = "An internal server error occurred";

/// Main error type for prestasi operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad input, illegal status transition, ownership or advising mismatch,
    /// unsupported file type or size
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, malformed, or expired credentials
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Caller lacks the permission a route requires
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Any underlying store failure not otherwise classified
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client.
    ///
    /// Validation, authentication, permission and not-found messages are
    /// written for the caller; server-side faults collapse to a generic line.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Authentication(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg) => msg.clone(),
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                GENERIC_DATABASE_MESSAGE.to_string()
            }
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.public_message();
        (status, body)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error is a server-side fault (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for AppError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Authentication(format!("JWT error: {}", err))
    }
}

/// Result type alias for prestasi operations
pub type Result<T> = std::result::Result<T, AppError>;
