//! Database layer for prestasi
//!
//! Connection helpers for MongoDB (achievement documents) and PostgreSQL
//! (achievement references, profiles, reconciliation log).

pub mod mongo;
pub mod postgres;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};
pub use schemas::{AchievementDoc, ACHIEVEMENT_COLLECTION};
