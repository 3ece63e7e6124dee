//! Reconciliation log entries
//!
//! Cross-store writes are not transactional. When a compensating step fails,
//! or a later write leaves the stores disagreeing, the leftover is recorded
//! here and repaired out of band by the reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What needs repairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileKind {
    /// Document with no reference pointing at it (failed create compensation)
    OrphanDocument { document_id: String },
    /// Stored file never appended to a document (failed upload compensation)
    OrphanFile { path: String },
    /// Verified reference whose document still carries stale points
    PendingPoints { document_id: String, points: i32 },
}

impl ReconcileKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OrphanDocument { .. } => "orphan_document",
            Self::OrphanFile { .. } => "orphan_file",
            Self::PendingPoints { .. } => "pending_points",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: Uuid,
    pub kind: ReconcileKind,
    /// Error that caused the entry to be recorded
    pub reason: String,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReconciliationEntry {
    pub fn new(kind: ReconcileKind, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            reason: reason.into(),
            attempts: 0,
            last_error: None,
            recorded_at: now,
            resolved_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}
