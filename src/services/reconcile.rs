//! Reconciler for cross-store leftovers
//!
//! Drains the reconciliation log: orphan documents are deleted when no
//! reference points at them, orphan files are deleted from blob storage,
//! and pending points are re-applied to their document. A repaired entry is
//! resolved; a failed repair bumps its attempt counter and stays pending
//! until it reaches the attempt cap, after which it is left for an operator.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::attachments::BlobStorage;
use crate::model::{ReconcileKind, ReconciliationEntry};
use crate::store::{DocumentStore, ReconciliationLog, ReferenceStore, StoreError, StoreResult};

/// Entries examined per run
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Failed repairs before an entry is no longer picked up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub resolved: usize,
    pub failed: usize,
}

pub struct Reconciler {
    references: Arc<dyn ReferenceStore>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStorage>,
    log: Arc<dyn ReconciliationLog>,
    batch_size: u32,
    max_attempts: u32,
}

impl Reconciler {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStorage>,
        log: Arc<dyn ReconciliationLog>,
    ) -> Self {
        Self {
            references,
            documents,
            blobs,
            log,
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Process one batch of pending entries
    pub async fn run_once(&self) -> StoreResult<ReconcileReport> {
        let pending = self.log.pending(self.batch_size, self.max_attempts).await?;
        let mut report = ReconcileReport {
            examined: pending.len(),
            ..Default::default()
        };

        for entry in pending {
            match self.repair(&entry).await {
                Ok(()) => {
                    self.log.resolve(entry.id, Utc::now()).await?;
                    report.resolved += 1;
                    info!(entry_id = %entry.id, kind = entry.kind.label(), "Reconciled");
                }
                Err(err) => {
                    self.log.bump_attempt(entry.id, &err.to_string()).await?;
                    report.failed += 1;
                    let attempts = entry.attempts.saturating_add(1);
                    if attempts as u32 >= self.max_attempts {
                        error!(
                            entry_id = %entry.id,
                            kind = entry.kind.label(),
                            attempts,
                            error = %err,
                            "Reconciliation gave up, manual repair required"
                        );
                    } else {
                        warn!(
                            entry_id = %entry.id,
                            kind = entry.kind.label(),
                            attempts,
                            error = %err,
                            "Reconciliation attempt failed"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    async fn repair(&self, entry: &ReconciliationEntry) -> StoreResult<()> {
        match &entry.kind {
            ReconcileKind::OrphanDocument { document_id } => {
                if self.references.exists_for_document(document_id).await? {
                    debug!(document_id = %document_id, "Document is referenced, keeping it");
                    return Ok(());
                }
                self.documents.delete(document_id).await?;
                Ok(())
            }
            ReconcileKind::OrphanFile { path } => self.blobs.delete(path).await,
            ReconcileKind::PendingPoints {
                document_id,
                points,
            } => {
                if self
                    .documents
                    .set_points(document_id, *points, Utc::now())
                    .await?
                {
                    Ok(())
                } else {
                    Err(StoreError::Corrupt(format!(
                        "document {} not found for pending points",
                        document_id
                    )))
                }
            }
        }
    }
}

// ============================================================================
// Background Reconcile Task
// ============================================================================

/// Spawn a background task that runs the reconciler on an interval
pub fn spawn_reconcile_task(reconciler: Arc<Reconciler>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match reconciler.run_once().await {
                Ok(report) if report.examined > 0 => {
                    info!(
                        examined = report.examined,
                        resolved = report.resolved,
                        failed = report.failed,
                        "Reconciliation pass completed"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Reconciliation pass failed"),
            }
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Reconcile task started"
    );
}
