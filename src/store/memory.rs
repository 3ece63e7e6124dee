//! In-memory store backends
//!
//! Used in dev mode when PostgreSQL/MongoDB are unreachable, and by tests.
//! Status transitions are checked and applied under the DashMap entry lock,
//! which gives the same compare-and-set guarantee as the conditional UPDATE
//! in the PostgreSQL backend.

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::model::{
    AchievementDocument, AchievementReference, AchievementStatus, AdvisorIdentity, Attachment,
    ContentUpdate, ListFilter, NewDocument, PageRequest, ReconcileKind, ReconciliationEntry,
    ReferenceListing, StudentIdentity, Transition,
};
use crate::store::{
    DocumentStore, IdentityResolver, ReconciliationLog, ReferenceStore, StoreError, StoreResult,
};

// =============================================================================
// Identity directory
// =============================================================================

/// Seed file format for the dev-mode directory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub students: Vec<StudentIdentity>,
    #[serde(default)]
    pub lecturers: Vec<AdvisorIdentity>,
}

/// Student and lecturer profiles held in memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    students: DashMap<Uuid, StudentIdentity>,
    lecturers: DashMap<Uuid, AdvisorIdentity>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for student in seed.students {
            directory.add_student(student);
        }
        for lecturer in seed.lecturers {
            directory.add_lecturer(lecturer);
        }
        directory
    }

    /// Parse a JSON seed (`{"students": [...], "lecturers": [...]}`)
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let seed: DirectorySeed = serde_json::from_str(json)
            .map_err(|e| StoreError::Corrupt(format!("invalid directory seed: {}", e)))?;
        Ok(Self::from_seed(seed))
    }

    pub fn add_student(&self, student: StudentIdentity) {
        self.students.insert(student.id, student);
    }

    pub fn add_lecturer(&self, lecturer: AdvisorIdentity) {
        self.lecturers.insert(lecturer.id, lecturer);
    }

    /// Reassign a student's advisor
    pub fn set_advisor(&self, student_id: Uuid, advisor_id: Option<Uuid>) -> bool {
        match self.students.get_mut(&student_id) {
            Some(mut student) => {
                student.advisor_id = advisor_id;
                true
            }
            None => false,
        }
    }

    pub fn student(&self, id: Uuid) -> Option<StudentIdentity> {
        self.students.get(&id).map(|s| s.clone())
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn lecturer_count(&self) -> usize {
        self.lecturers.len()
    }
}

#[async_trait]
impl IdentityResolver for MemoryDirectory {
    async fn student_by_user(&self, user_id: Uuid) -> StoreResult<Option<StudentIdentity>> {
        Ok(self
            .students
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.clone()))
    }

    async fn advisor_by_user(&self, user_id: Uuid) -> StoreResult<Option<AdvisorIdentity>> {
        Ok(self
            .lecturers
            .iter()
            .find(|l| l.user_id == user_id)
            .map(|l| l.clone()))
    }

    async fn student_by_id(&self, student_id: Uuid) -> StoreResult<Option<StudentIdentity>> {
        Ok(self.student(student_id))
    }
}

// =============================================================================
// References
// =============================================================================

/// References keyed by id; joins against a shared [`MemoryDirectory`]
pub struct MemoryReferenceStore {
    refs: DashMap<Uuid, AchievementReference>,
    directory: Arc<MemoryDirectory>,
}

impl MemoryReferenceStore {
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self {
            refs: DashMap::new(),
            directory,
        }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    fn matches(&self, reference: &AchievementReference, filter: &ListFilter) -> Option<ReferenceListing> {
        if reference.status == AchievementStatus::Deleted {
            return None;
        }
        if filter.status.is_some_and(|s| s != reference.status) {
            return None;
        }
        if filter.student_id.is_some_and(|id| id != reference.student_id) {
            return None;
        }

        let student = self.directory.student(reference.student_id)?;

        if let Some(advisor_id) = filter.advisor_id {
            if student.advisor_id != Some(advisor_id) {
                return None;
            }
        }
        if let Some(ref term) = filter.search {
            let term = term.to_lowercase();
            if !student.full_name.to_lowercase().contains(&term)
                && !student.student_number.to_lowercase().contains(&term)
            {
                return None;
            }
        }

        Some(ReferenceListing {
            reference: reference.clone(),
            student_number: student.student_number,
            student_name: student.full_name,
        })
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn insert(&self, reference: &AchievementReference) -> StoreResult<()> {
        if self.refs.contains_key(&reference.id) {
            return Err(StoreError::Unavailable(format!(
                "duplicate reference id {}",
                reference.id
            )));
        }
        self.refs.insert(reference.id, reference.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AchievementReference>> {
        Ok(self.refs.get(&id).map(|r| r.clone()))
    }

    async fn touch_draft(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        match self.refs.get_mut(&id) {
            Some(mut r) if r.status == AchievementStatus::Draft => {
                r.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AchievementReference>> {
        let Some(mut entry) = self.refs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.apply(transition, now) {
            Ok(Some(entry.clone()))
        } else {
            Ok(None)
        }
    }

    async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ReferenceListing>, u64)> {
        let snapshot: Vec<AchievementReference> =
            self.refs.iter().map(|r| r.value().clone()).collect();

        let mut rows: Vec<ReferenceListing> = snapshot
            .iter()
            .filter_map(|r| self.matches(r, filter))
            .collect();

        rows.sort_by(|a, b| {
            b.reference
                .created_at
                .cmp(&a.reference.created_at)
                .then_with(|| b.reference.id.cmp(&a.reference.id))
        });

        let total = rows.len() as u64;
        let page_rows = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();

        Ok((page_rows, total))
    }

    async fn exists_for_document(&self, document_id: &str) -> StoreResult<bool> {
        Ok(self.refs.iter().any(|r| r.document_id == document_id))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Documents keyed by ObjectId hex
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<String, AchievementDocument>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, doc: NewDocument) -> StoreResult<String> {
        let id = ObjectId::new().to_hex();
        self.docs.insert(id.clone(), doc.into_document(id.clone()));
        Ok(id)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AchievementDocument>> {
        Ok(self.docs.get(id).map(|d| d.clone()))
    }

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<AchievementDocument>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.docs.get(id).map(|d| d.clone()))
            .collect())
    }

    async fn update_content(
        &self,
        id: &str,
        update: &ContentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.docs.get_mut(id) {
            Some(mut doc) => {
                update.apply_to(&mut doc, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn push_attachment(
        &self,
        id: &str,
        attachment: &Attachment,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.docs.get_mut(id) {
            Some(mut doc) => {
                doc.attachments.push(attachment.clone());
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_points(&self, id: &str, points: i32, now: DateTime<Utc>) -> StoreResult<bool> {
        match self.docs.get_mut(id) {
            Some(mut doc) => {
                doc.points = points;
                doc.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.docs.remove(id).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// =============================================================================
// Reconciliation log
// =============================================================================

#[derive(Default)]
pub struct MemoryReconciliationLog {
    entries: DashMap<Uuid, ReconciliationEntry>,
}

impl MemoryReconciliationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, resolved or not, oldest first
    pub fn entries(&self) -> Vec<ReconciliationEntry> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.recorded_at);
        all
    }
}

#[async_trait]
impl ReconciliationLog for MemoryReconciliationLog {
    async fn record(&self, kind: ReconcileKind, reason: &str) -> StoreResult<Uuid> {
        let entry = ReconciliationEntry::new(kind, reason, Utc::now());
        let id = entry.id;
        self.entries.insert(id, entry);
        Ok(id)
    }

    async fn pending(&self, limit: u32, max_attempts: u32) -> StoreResult<Vec<ReconciliationEntry>> {
        Ok(self
            .entries()
            .into_iter()
            .filter(|e| !e.is_resolved() && (e.attempts as i64) < max_attempts as i64)
            .take(limit as usize)
            .collect())
    }

    async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.resolved_at = Some(now);
        }
        Ok(())
    }

    async fn bump_attempt(&self, id: Uuid, error: &str) -> StoreResult<()> {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}
