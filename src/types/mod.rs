//! Shared types for prestasi

pub mod error;

pub use error::{AppError, Result, GENERIC_DATABASE_MESSAGE};
