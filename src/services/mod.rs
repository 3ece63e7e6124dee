//! Services layer for prestasi
//!
//! ## Services
//!
//! - **Achievement**: the workflow engine over the reference and document stores
//! - **Reconcile**: periodic repair of cross-store leftovers

pub mod achievement;
pub mod reconcile;

pub use achievement::{AchievementService, ListParams, MIN_POINTS, MIN_REJECTION_NOTE_LEN};
pub use reconcile::{
    spawn_reconcile_task, ReconcileReport, Reconciler, DEFAULT_BATCH_SIZE, DEFAULT_MAX_ATTEMPTS,
};
