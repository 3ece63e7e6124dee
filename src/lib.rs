//! Prestasi - achievement reporting and verification service
//!
//! Students report achievements as drafts, attach proof files and submit
//! them; their academic advisor verifies (awarding points) or rejects them.
//!
//! ## Storage
//!
//! - **References** (PostgreSQL): workflow status, ownership, timestamps
//! - **Documents** (MongoDB): title, description, details, attachments, points
//! - **Reconciliation log** (PostgreSQL): cross-store leftovers, drained
//!   periodically by the reconciler
//!
//! Every store has an in-memory backend used in development mode and tests.

pub mod attachments;
pub mod auth;
pub mod config;
pub mod db;
pub mod model;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState, Backends};
pub use services::{AchievementService, Reconciler};
pub use types::{AppError, Result};
