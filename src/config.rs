//! Configuration for prestasi
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::JwtValidator;
use crate::types::AppError;

/// Prestasi - achievement reporting and verification service
///
/// Students report achievements, advisors verify or reject them.
#[derive(Parser, Debug, Clone)]
#[command(name = "prestasi")]
#[command(about = "Achievement reporting and verification service")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory fallback stores, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// PostgreSQL connection URL (achievement references, profiles)
    #[arg(long, env = "POSTGRES_URL")]
    pub postgres_url: Option<String>,

    /// Maximum PostgreSQL pool size
    #[arg(long, env = "POSTGRES_MAX_CONNECTIONS", default_value = "10")]
    pub postgres_max_connections: u32,

    /// MongoDB connection URI (achievement documents)
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "prestasi")]
    pub mongodb_db: String,

    /// JWT secret for token validation (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds (dev token generation only)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Directory proof files are written to
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads/achievements")]
    pub upload_dir: PathBuf,

    /// Public URL prefix for stored proof files
    #[arg(long, env = "UPLOAD_URL_PREFIX", default_value = "/uploads/achievements")]
    pub upload_url_prefix: String,

    /// Maximum proof file size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "5242880")]
    pub max_upload_bytes: u64,

    /// Seconds between reconciliation passes (0 disables)
    #[arg(long, env = "RECONCILE_INTERVAL_SECS", default_value = "300")]
    pub reconcile_interval_secs: u64,

    /// Reconciliation entries examined per pass
    #[arg(long, env = "RECONCILE_BATCH_SIZE", default_value = "100")]
    pub reconcile_batch_size: u32,

    /// Failed repairs after which an entry is left for an operator
    #[arg(long, env = "RECONCILE_MAX_ATTEMPTS", default_value = "5")]
    pub reconcile_max_attempts: u32,

    /// JSON file with students and lecturers for the in-memory directory (dev mode)
    #[arg(long, env = "DEV_DIRECTORY")]
    pub dev_directory: Option<PathBuf>,
}

impl Args {
    /// Build the JWT validator (uses a fixed secret in dev mode when none is set)
    pub fn jwt_validator(&self) -> Result<JwtValidator, AppError> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), self.jwt_expiry_seconds),
            (None, true) => Ok(JwtValidator::new_dev()),
            (None, false) => Err(AppError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }

    /// Reconciliation interval, if enabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(ref s) if s.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                _ => {}
            }

            if self.postgres_url.is_none() {
                return Err("POSTGRES_URL is required in production mode".to_string());
            }
        }

        if self.postgres_max_connections == 0 {
            return Err("POSTGRES_MAX_CONNECTIONS must be at least 1".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than 0".to_string());
        }

        if !self.upload_url_prefix.starts_with('/') && !self.upload_url_prefix.contains("://") {
            return Err("UPLOAD_URL_PREFIX must be an absolute path or URL".to_string());
        }

        Ok(())
    }
}
