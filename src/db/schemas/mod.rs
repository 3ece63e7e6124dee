//! Database schemas for prestasi
//!
//! Defines MongoDB document structures. Relational tables are created by the
//! PostgreSQL store.

mod achievement;

pub use achievement::{
    details_from_bson, details_to_bson, AchievementDoc, AttachmentDoc, ACHIEVEMENT_COLLECTION,
};
