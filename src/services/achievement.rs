//! Achievement workflow service
//!
//! Orchestrates every achievement operation across the reference store
//! (authoritative status) and the document store (content). There is no
//! transaction spanning the two, so multi-store writes are explicit steps:
//!
//! - **Create**: document first, then reference. A failed reference insert
//!   deletes the document again.
//! - **Upload**: file first, then attachment append. A failed append deletes
//!   the file again.
//! - **Verify**: reference first, then points. A failed points write is not
//!   rolled back; the pending points are recorded for the reconciler.
//!
//! Compensation runs once. If it fails too, the leftover goes to the
//! reconciliation log and the caller still gets the original database error.
//!
//! Every status change is a conditional write on the reference, so two
//! concurrent transitions from the same status cannot both land.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::attachments::{AttachmentUploader, IncomingFile};
use crate::auth::{capability, Operation, Scope};
use crate::model::{
    AchievementDetail, AchievementListItem, AchievementReference, AchievementStatus, Actor,
    AdvisorIdentity, Attachment, ContentUpdate, CreateAchievementRequest, ListFilter, NewDocument,
    PageRequest, PaginatedAchievements, ReconcileKind, StudentIdentity, StudentSummary,
    Transition,
};
use crate::store::{
    DocumentStore, IdentityResolver, ReconciliationLog, ReferenceStore, StoreError,
};
use crate::types::{AppError, Result};

/// Minimum length of a trimmed rejection note
pub const MIN_REJECTION_NOTE_LEN: usize = 5;

/// Minimum points awarded on verification
pub const MIN_POINTS: i32 = 1;

/// Listing parameters after query parsing
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub status: Option<AchievementStatus>,
    pub search: Option<String>,
    pub page: PageRequest,
}

/// Log a store failure with context and convert it to a database error
fn db_error(context: &'static str, err: StoreError) -> AppError {
    error!(error = %err, "{} failed", context);
    AppError::Database(format!("{}: {}", context, err))
}

/// Document missing or unwritable while its reference exists
fn inconsistency(reference: &AchievementReference, what: &str) -> AppError {
    error!(
        achievement_id = %reference.id,
        document_id = %reference.document_id,
        "Store inconsistency: {}", what
    );
    AppError::Database(format!(
        "achievement {} {}",
        reference.id, what
    ))
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

fn draft_only_message(operation: Operation) -> &'static str {
    match operation {
        Operation::Submit => "Only draft achievements can be submitted",
        Operation::Delete => "Only draft achievements can be deleted",
        Operation::UploadAttachment => {
            "Changes are not allowed once an achievement has been submitted for verification"
        }
        _ => "Only draft achievements can be edited",
    }
}

fn submitted_only_message(operation: Operation) -> &'static str {
    match operation {
        Operation::Reject => "Only submitted achievements can be rejected",
        _ => "Only submitted achievements can be verified",
    }
}

pub struct AchievementService {
    references: Arc<dyn ReferenceStore>,
    documents: Arc<dyn DocumentStore>,
    identities: Arc<dyn IdentityResolver>,
    reconciliation: Arc<dyn ReconciliationLog>,
    uploader: Arc<AttachmentUploader>,
}

impl AchievementService {
    pub fn new(
        references: Arc<dyn ReferenceStore>,
        documents: Arc<dyn DocumentStore>,
        identities: Arc<dyn IdentityResolver>,
        reconciliation: Arc<dyn ReconciliationLog>,
        uploader: Arc<AttachmentUploader>,
    ) -> Self {
        Self {
            references,
            documents,
            identities,
            reconciliation,
            uploader,
        }
    }

    pub fn references(&self) -> Arc<dyn ReferenceStore> {
        Arc::clone(&self.references)
    }

    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.documents)
    }

    pub fn uploader(&self) -> Arc<AttachmentUploader> {
        Arc::clone(&self.uploader)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Report a new achievement as draft
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateAchievementRequest,
    ) -> Result<AchievementReference> {
        require_text("achievement_type", &req.achievement_type)?;
        require_text("title", &req.title)?;

        let student = self
            .student_for(actor, Operation::Create)
            .await?
            .ok_or_else(|| AppError::validation("Only students may report achievements"))?;

        let now = Utc::now();
        let document_id = self
            .documents
            .insert(NewDocument {
                student_id: student.id,
                achievement_type: req.achievement_type.trim().to_string(),
                title: req.title.trim().to_string(),
                description: req.description,
                details: req.details,
                tags: req.tags,
                created_at: now,
            })
            .await
            .map_err(|e| db_error("insert achievement document", e))?;

        let reference = AchievementReference::new_draft(student.id, document_id.clone(), now);

        if let Err(err) = self.references.insert(&reference).await {
            error!(
                document_id = %document_id,
                error = %err,
                "Reference insert failed, removing document"
            );
            self.compensate_document(&document_id, &err).await;
            return Err(AppError::Database(format!("insert achievement reference: {}", err)));
        }

        info!(
            achievement_id = %reference.id,
            student_id = %student.id,
            document_id = %document_id,
            "Achievement created"
        );
        Ok(reference)
    }

    /// Apply a partial content update to an owned draft
    pub async fn edit(&self, actor: &Actor, id: Uuid, mut update: ContentUpdate) -> Result<()> {
        if let Some(ref t) = update.achievement_type {
            require_text("achievement_type", t)?;
        }
        if let Some(ref t) = update.title {
            require_text("title", t)?;
        }
        update.achievement_type = update.achievement_type.map(|t| t.trim().to_string());
        update.title = update.title.map(|t| t.trim().to_string());

        let reference = self.owned_draft(actor, id, Operation::Edit).await?;

        let now = Utc::now();
        let still_draft = self
            .references
            .touch_draft(id, now)
            .await
            .map_err(|e| db_error("touch achievement reference", e))?;
        if !still_draft {
            return Err(AppError::validation(draft_only_message(Operation::Edit)));
        }

        let matched = self
            .documents
            .update_content(&reference.document_id, &update, now)
            .await
            .map_err(|e| db_error("update achievement document", e))?;
        if !matched {
            return Err(inconsistency(&reference, "has no document to update"));
        }

        debug!(achievement_id = %id, "Achievement content updated");
        Ok(())
    }

    /// Store a proof file and append its pointer to the document
    pub async fn upload_attachment(
        &self,
        actor: &Actor,
        id: Uuid,
        file: IncomingFile,
    ) -> Result<Attachment> {
        self.uploader.validate(&file)?;

        let reference = self
            .owned_draft(actor, id, Operation::UploadAttachment)
            .await?;

        let now = Utc::now();
        let still_draft = self
            .references
            .touch_draft(id, now)
            .await
            .map_err(|e| db_error("touch achievement reference", e))?;
        if !still_draft {
            return Err(AppError::validation(draft_only_message(
                Operation::UploadAttachment,
            )));
        }

        let stored = self
            .uploader
            .store(id, &file, now)
            .await
            .map_err(|e| db_error("store attachment file", e))?;

        let failure = match self
            .documents
            .push_attachment(&reference.document_id, &stored.attachment, now)
            .await
        {
            Ok(true) => None,
            Ok(false) => Some("document not found".to_string()),
            Err(err) => Some(err.to_string()),
        };

        if let Some(reason) = failure {
            error!(
                achievement_id = %id,
                file_name = %stored.key,
                reason = %reason,
                "Attachment append failed, removing stored file"
            );
            self.compensate_file(&stored.key, &reason).await;
            return Err(AppError::Database(format!("append attachment: {}", reason)));
        }

        info!(
            achievement_id = %id,
            file_name = %stored.attachment.file_name,
            size = file.data.len(),
            "Attachment uploaded"
        );
        Ok(stored.attachment)
    }

    /// draft -> submitted
    pub async fn submit(&self, actor: &Actor, id: Uuid) -> Result<AchievementReference> {
        self.owned_draft(actor, id, Operation::Submit).await?;
        let updated = self.apply_transition(id, Transition::Submit, Operation::Submit).await?;
        info!(achievement_id = %id, "Achievement submitted");
        Ok(updated)
    }

    /// draft -> deleted. The document is kept.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<AchievementReference> {
        self.owned_draft(actor, id, Operation::Delete).await?;
        let updated = self.apply_transition(id, Transition::Delete, Operation::Delete).await?;
        info!(achievement_id = %id, "Achievement deleted");
        Ok(updated)
    }

    /// submitted -> verified, awarding points
    pub async fn verify(
        &self,
        actor: &Actor,
        id: Uuid,
        points: i32,
    ) -> Result<AchievementReference> {
        if points < MIN_POINTS {
            return Err(AppError::validation(format!(
                "Points must be at least {}",
                MIN_POINTS
            )));
        }

        let (reference, advisor) = self.reviewable(actor, id, Operation::Verify).await?;

        let updated = self
            .apply_transition(
                id,
                Transition::Verify {
                    advisor_id: advisor.id,
                },
                Operation::Verify,
            )
            .await?;

        let now = Utc::now();
        let failure = match self
            .documents
            .set_points(&reference.document_id, points, now)
            .await
        {
            Ok(true) => None,
            Ok(false) => Some("document not found".to_string()),
            Err(err) => Some(err.to_string()),
        };

        if let Some(reason) = failure {
            error!(
                achievement_id = %id,
                document_id = %reference.document_id,
                points,
                reason = %reason,
                "Reference verified but points write failed"
            );
            self.record(
                ReconcileKind::PendingPoints {
                    document_id: reference.document_id.clone(),
                    points,
                },
                &reason,
            )
            .await;
            return Err(AppError::Database(format!("write points: {}", reason)));
        }

        info!(
            achievement_id = %id,
            advisor_id = %advisor.id,
            points,
            "Achievement verified"
        );
        Ok(updated)
    }

    /// submitted -> rejected, with a note
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        rejection_note: &str,
    ) -> Result<AchievementReference> {
        let note = rejection_note.trim();
        if note.chars().count() < MIN_REJECTION_NOTE_LEN {
            return Err(AppError::validation(format!(
                "Rejection note must be at least {} characters",
                MIN_REJECTION_NOTE_LEN
            )));
        }

        let (_, advisor) = self.reviewable(actor, id, Operation::Reject).await?;

        let updated = self
            .apply_transition(
                id,
                Transition::Reject {
                    advisor_id: advisor.id,
                    note: note.to_string(),
                },
                Operation::Reject,
            )
            .await?;

        info!(achievement_id = %id, advisor_id = %advisor.id, "Achievement rejected");
        Ok(updated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// One achievement with its content and owning student
    pub async fn get_detail(&self, actor: &Actor, id: Uuid) -> Result<AchievementDetail> {
        let reference = self
            .references
            .get(id)
            .await
            .map_err(|e| db_error("load achievement reference", e))?
            .ok_or_else(|| AppError::not_found("Achievement not found"))?;

        let student = self
            .identities
            .student_by_id(reference.student_id)
            .await
            .map_err(|e| db_error("load student profile", e))?
            .ok_or_else(|| inconsistency(&reference, "has no owning student profile"))?;

        if !self.can_view(actor, &student, Operation::View).await? {
            return Err(AppError::validation(
                "You are not allowed to view this achievement",
            ));
        }

        let document = self
            .documents
            .get(&reference.document_id)
            .await
            .map_err(|e| db_error("load achievement document", e))?
            .ok_or_else(|| inconsistency(&reference, "has no document"))?;

        Ok(AchievementDetail::assemble(
            reference,
            StudentSummary::from(&student),
            document,
        ))
    }

    /// Paginated listing scoped by role: own, advisees, or all
    pub async fn list(&self, actor: &Actor, params: ListParams) -> Result<PaginatedAchievements> {
        let mut filter = ListFilter {
            status: params.status,
            search: params
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            ..Default::default()
        };

        match capability(actor.role, Operation::List) {
            Some(Scope::Own) => {
                let student = self
                    .student_for(actor, Operation::List)
                    .await?
                    .ok_or_else(|| AppError::validation("Student profile not found"))?;
                filter.student_id = Some(student.id);
            }
            Some(Scope::Advisees) => {
                let advisor = self
                    .advisor_for(actor)
                    .await?
                    .ok_or_else(|| AppError::validation("Lecturer profile not found"))?;
                filter.advisor_id = Some(advisor.id);
            }
            Some(Scope::All) => {}
            None => {
                return Err(AppError::validation(format!(
                    "Role {} cannot list achievements",
                    actor.role
                )))
            }
        }

        self.page(filter, params.page).await
    }

    /// Paginated listing of one student's achievements
    pub async fn list_by_student(
        &self,
        actor: &Actor,
        student_id: Uuid,
        status: Option<AchievementStatus>,
        page: PageRequest,
    ) -> Result<PaginatedAchievements> {
        let student = self
            .identities
            .student_by_id(student_id)
            .await
            .map_err(|e| db_error("load student profile", e))?
            .ok_or_else(|| AppError::not_found("Student not found"))?;

        if !self.can_view(actor, &student, Operation::List).await? {
            return Err(AppError::validation(
                "You are not allowed to view this student's achievements",
            ));
        }

        let filter = ListFilter {
            status,
            student_id: Some(student.id),
            ..Default::default()
        };
        self.page(filter, page).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Page references, then batch-fetch their documents.
    ///
    /// A failed batch fetch degrades to rows without content rather than
    /// failing the listing.
    async fn page(&self, filter: ListFilter, page: PageRequest) -> Result<PaginatedAchievements> {
        let (rows, total) = self
            .references
            .list(&filter, page)
            .await
            .map_err(|e| db_error("list achievement references", e))?;

        let ids: Vec<String> = rows
            .iter()
            .map(|r| r.reference.document_id.clone())
            .collect();

        let documents = if ids.is_empty() {
            Vec::new()
        } else {
            match self.documents.get_many(&ids).await {
                Ok(docs) => docs,
                Err(err) => {
                    warn!(error = %err, count = ids.len(), "Batch document fetch failed, listing without content");
                    Vec::new()
                }
            }
        };
        let by_id: HashMap<&str, _> = documents.iter().map(|d| (d.id.as_str(), d)).collect();

        let data = rows
            .iter()
            .map(|row| {
                let mut item = AchievementListItem::from_listing(row);
                if let Some(doc) = by_id.get(row.reference.document_id.as_str()) {
                    item.fill_content(doc);
                }
                item
            })
            .collect();

        Ok(PaginatedAchievements {
            data,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages(total),
        })
    }

    /// Student profile of the caller, if the role acts on its own records
    async fn student_for(
        &self,
        actor: &Actor,
        operation: Operation,
    ) -> Result<Option<StudentIdentity>> {
        if capability(actor.role, operation) != Some(Scope::Own) {
            return Ok(None);
        }
        self.identities
            .student_by_user(actor.user_id)
            .await
            .map_err(|e| db_error("resolve student profile", e))
    }

    /// Lecturer profile of the caller, if the role advises
    async fn advisor_for(&self, actor: &Actor) -> Result<Option<AdvisorIdentity>> {
        if capability(actor.role, Operation::Verify) != Some(Scope::Advisees) {
            return Ok(None);
        }
        self.identities
            .advisor_by_user(actor.user_id)
            .await
            .map_err(|e| db_error("resolve lecturer profile", e))
    }

    /// Whether the caller may see records of `student` for a read operation
    async fn can_view(
        &self,
        actor: &Actor,
        student: &StudentIdentity,
        operation: Operation,
    ) -> Result<bool> {
        match capability(actor.role, operation) {
            Some(Scope::All) => Ok(true),
            Some(Scope::Own) => Ok(self
                .student_for(actor, operation)
                .await?
                .is_some_and(|own| own.id == student.id)),
            Some(Scope::Advisees) => Ok(self
                .advisor_for(actor)
                .await?
                .is_some_and(|advisor| student.is_advised_by(&advisor))),
            None => Ok(false),
        }
    }

    /// Load a reference the caller owns and that is still draft
    async fn owned_draft(
        &self,
        actor: &Actor,
        id: Uuid,
        operation: Operation,
    ) -> Result<AchievementReference> {
        let reference = self
            .references
            .get(id)
            .await
            .map_err(|e| db_error("load achievement reference", e))?
            .ok_or_else(|| AppError::not_found("Achievement not found"))?;

        let owns = self
            .student_for(actor, operation)
            .await?
            .is_some_and(|student| student.id == reference.student_id);
        if !owns {
            return Err(AppError::validation("This is not your achievement"));
        }

        if !reference.status.allows_content_changes() {
            return Err(AppError::validation(draft_only_message(operation)));
        }

        Ok(reference)
    }

    /// Load a submitted reference the caller advises on
    async fn reviewable(
        &self,
        actor: &Actor,
        id: Uuid,
        operation: Operation,
    ) -> Result<(AchievementReference, AdvisorIdentity)> {
        let reference = self
            .references
            .get(id)
            .await
            .map_err(|e| db_error("load achievement reference", e))?
            .ok_or_else(|| AppError::not_found("Achievement not found"))?;

        let advisor = self
            .advisor_for(actor)
            .await?
            .ok_or_else(|| AppError::validation("Access denied: caller is not a lecturer"))?;

        let advised = self
            .identities
            .student_by_id(reference.student_id)
            .await
            .map_err(|e| db_error("load student profile", e))?
            .is_some_and(|student| student.is_advised_by(&advisor));
        if !advised {
            return Err(AppError::validation(
                "This achievement's student is not your advisee",
            ));
        }

        if reference.status != AchievementStatus::Submitted {
            return Err(AppError::validation(submitted_only_message(operation)));
        }

        Ok((reference, advisor))
    }

    /// Conditional status write. Losing a race to a concurrent transition
    /// is reported the same way as starting from the wrong status.
    async fn apply_transition(
        &self,
        id: Uuid,
        transition: Transition,
        operation: Operation,
    ) -> Result<AchievementReference> {
        let name = transition.name();
        let from = transition.from_status();

        match self
            .references
            .transition(id, &transition, Utc::now())
            .await
            .map_err(|e| db_error("transition achievement reference", e))?
        {
            Some(updated) => Ok(updated),
            None => {
                warn!(achievement_id = %id, transition = name, "Guarded transition lost");
                Err(AppError::validation(if from == AchievementStatus::Draft {
                    draft_only_message(operation)
                } else {
                    submitted_only_message(operation)
                }))
            }
        }
    }

    /// Undo a document insert; record the orphan if that fails too
    async fn compensate_document(&self, document_id: &str, cause: &StoreError) {
        match self.documents.delete(document_id).await {
            Ok(_) => {
                info!(document_id = %document_id, "Compensated orphan document");
            }
            Err(err) => {
                error!(
                    document_id = %document_id,
                    error = %err,
                    "Compensating document delete failed"
                );
                self.record(
                    ReconcileKind::OrphanDocument {
                        document_id: document_id.to_string(),
                    },
                    &format!("{}; compensation: {}", cause, err),
                )
                .await;
            }
        }
    }

    /// Undo a file write; record the orphan if that fails too
    async fn compensate_file(&self, key: &str, cause: &str) {
        match self.uploader.discard(key).await {
            Ok(()) => {
                info!(file_name = %key, "Compensated orphan file");
            }
            Err(err) => {
                error!(file_name = %key, error = %err, "Compensating file delete failed");
                self.record(
                    ReconcileKind::OrphanFile {
                        path: key.to_string(),
                    },
                    &format!("{}; compensation: {}", cause, err),
                )
                .await;
            }
        }
    }

    async fn record(&self, kind: ReconcileKind, reason: &str) {
        let label = kind.label();
        match self.reconciliation.record(kind, reason).await {
            Ok(entry_id) => {
                warn!(entry_id = %entry_id, kind = label, "Recorded for reconciliation");
            }
            Err(err) => {
                error!(kind = label, reason = %reason, error = %err, "Failed to record reconciliation entry");
            }
        }
    }
}
