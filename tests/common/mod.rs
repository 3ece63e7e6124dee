//! Shared fixtures for integration tests
//!
//! Everything runs over the in-memory stores. Each store is wrapped so a
//! test can make individual writes fail and exercise compensation, or hold
//! two callers after their reference read to force a write race.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;
use uuid::Uuid;

use prestasi::attachments::{
    AttachmentPolicy, AttachmentUploader, BlobStorage, IncomingFile, MemoryBlobStorage,
};
use prestasi::auth::Role;
use prestasi::model::{
    AchievementDocument, AchievementReference, Actor, AdvisorIdentity, Attachment, ContentUpdate,
    CreateAchievementRequest, Details, ListFilter, NewDocument, PageRequest, ReferenceListing,
    StudentIdentity, Transition,
};
use prestasi::services::{AchievementService, Reconciler};
use prestasi::store::{
    DocumentStore, MemoryDirectory, MemoryDocumentStore, MemoryReconciliationLog,
    MemoryReferenceStore, ReferenceStore, StoreError, StoreResult,
};

// =============================================================================
// Fault injection
// =============================================================================

/// Switches for injected write failures; all off by default
#[derive(Debug)]
pub struct Faults {
    pub reference_insert: AtomicBool,
    pub document_delete: AtomicBool,
    pub document_push: AtomicBool,
    pub document_points: AtomicBool,
    pub blob_delete: AtomicBool,
    /// Hold each reference read until a second caller has read too
    pub pair_reads: AtomicBool,
    read_barrier: Barrier,
    /// Reads currently held at the barrier
    pub parked_reads: AtomicUsize,
    /// Guarded status writes attempted
    pub transitions: AtomicUsize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            reference_insert: AtomicBool::new(false),
            document_delete: AtomicBool::new(false),
            document_push: AtomicBool::new(false),
            document_points: AtomicBool::new(false),
            blob_delete: AtomicBool::new(false),
            pair_reads: AtomicBool::new(false),
            read_barrier: Barrier::new(2),
            parked_reads: AtomicUsize::new(0),
            transitions: AtomicUsize::new(0),
        }
    }
}

impl Faults {
    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }

    /// Yield until `n` reference reads are held at the barrier
    pub async fn wait_for_parked_reads(&self, n: usize) {
        while self.parked_reads.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    fn tripped(flag: &AtomicBool, op: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

pub struct FlakyReferences {
    inner: Arc<MemoryReferenceStore>,
    faults: Arc<Faults>,
}

#[async_trait]
impl ReferenceStore for FlakyReferences {
    async fn insert(&self, reference: &AchievementReference) -> StoreResult<()> {
        Faults::tripped(&self.faults.reference_insert, "reference insert")?;
        self.inner.insert(reference).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AchievementReference>> {
        let reference = self.inner.get(id).await;
        if self.faults.pair_reads.load(Ordering::SeqCst) {
            self.faults.parked_reads.fetch_add(1, Ordering::SeqCst);
            self.faults.read_barrier.wait().await;
            self.faults.parked_reads.fetch_sub(1, Ordering::SeqCst);
        }
        reference
    }

    async fn touch_draft(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.touch_draft(id, now).await
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AchievementReference>> {
        self.faults.transitions.fetch_add(1, Ordering::SeqCst);
        self.inner.transition(id, transition, now).await
    }

    async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ReferenceListing>, u64)> {
        self.inner.list(filter, page).await
    }

    async fn exists_for_document(&self, document_id: &str) -> StoreResult<bool> {
        self.inner.exists_for_document(document_id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

pub struct FlakyDocuments {
    inner: Arc<MemoryDocumentStore>,
    faults: Arc<Faults>,
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
    async fn insert(&self, doc: NewDocument) -> StoreResult<String> {
        self.inner.insert(doc).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<AchievementDocument>> {
        self.inner.get(id).await
    }

    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<AchievementDocument>> {
        self.inner.get_many(ids).await
    }

    async fn update_content(
        &self,
        id: &str,
        update: &ContentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.update_content(id, update, now).await
    }

    async fn push_attachment(
        &self,
        id: &str,
        attachment: &Attachment,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Faults::tripped(&self.faults.document_push, "attachment append")?;
        self.inner.push_attachment(id, attachment, now).await
    }

    async fn set_points(&self, id: &str, points: i32, now: DateTime<Utc>) -> StoreResult<bool> {
        Faults::tripped(&self.faults.document_points, "points write")?;
        self.inner.set_points(id, points, now).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Faults::tripped(&self.faults.document_delete, "document delete")?;
        self.inner.delete(id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

pub struct FlakyBlobs {
    inner: Arc<MemoryBlobStorage>,
    faults: Arc<Faults>,
}

#[async_trait]
impl BlobStorage for FlakyBlobs {
    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.inner.write(key, data).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Faults::tripped(&self.faults.blob_delete, "file delete")?;
        self.inner.delete(key).await
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub struct Person<T> {
    pub profile: T,
    pub actor: Actor,
}

pub struct Fixture {
    pub service: Arc<AchievementService>,
    pub reconciler: Reconciler,
    pub faults: Arc<Faults>,
    pub directory: Arc<MemoryDirectory>,
    pub references: Arc<MemoryReferenceStore>,
    pub documents: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStorage>,
    pub log: Arc<MemoryReconciliationLog>,
    /// Advisee of `advisor`
    pub student: Person<StudentIdentity>,
    /// Advisee of `other_advisor`
    pub other_student: Person<StudentIdentity>,
    pub advisor: Person<AdvisorIdentity>,
    pub other_advisor: Person<AdvisorIdentity>,
    pub admin: Actor,
}

fn lecturer(number: &str, name: &str) -> Person<AdvisorIdentity> {
    let user_id = Uuid::new_v4();
    Person {
        profile: AdvisorIdentity {
            id: Uuid::new_v4(),
            user_id,
            lecturer_number: number.into(),
            full_name: name.into(),
        },
        actor: Actor::new(user_id, Role::Advisor),
    }
}

fn student(number: &str, name: &str, advisor: &AdvisorIdentity) -> Person<StudentIdentity> {
    let user_id = Uuid::new_v4();
    Person {
        profile: StudentIdentity {
            id: Uuid::new_v4(),
            user_id,
            student_number: number.into(),
            full_name: name.into(),
            program_study: "Teknik Informatika".into(),
            academic_year: "2022".into(),
            advisor_id: Some(advisor.id),
        },
        actor: Actor::new(user_id, Role::Student),
    }
}

impl Fixture {
    pub fn new() -> Self {
        let advisor = lecturer("198001012005011001", "Dr. Siti Rahma");
        let other_advisor = lecturer("198502022010012002", "Dr. Agus Salim");
        let student_a = student("2210511001", "Budi Santoso", &advisor.profile);
        let student_b = student("2210511002", "Citra Lestari", &other_advisor.profile);

        let directory = Arc::new(MemoryDirectory::new());
        directory.add_lecturer(advisor.profile.clone());
        directory.add_lecturer(other_advisor.profile.clone());
        directory.add_student(student_a.profile.clone());
        directory.add_student(student_b.profile.clone());

        let faults = Arc::new(Faults::default());
        let references = Arc::new(MemoryReferenceStore::new(Arc::clone(&directory)));
        let documents = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStorage::new());
        let log = Arc::new(MemoryReconciliationLog::new());

        let flaky_references = Arc::new(FlakyReferences {
            inner: Arc::clone(&references),
            faults: Arc::clone(&faults),
        });
        let flaky_documents = Arc::new(FlakyDocuments {
            inner: Arc::clone(&documents),
            faults: Arc::clone(&faults),
        });
        let flaky_blobs = Arc::new(FlakyBlobs {
            inner: Arc::clone(&blobs),
            faults: Arc::clone(&faults),
        });

        let uploader = Arc::new(AttachmentUploader::new(
            AttachmentPolicy::default(),
            flaky_blobs.clone(),
        ));

        let service = Arc::new(AchievementService::new(
            flaky_references.clone(),
            flaky_documents.clone(),
            directory.clone(),
            log.clone(),
            uploader,
        ));
        let reconciler = Reconciler::new(flaky_references, flaky_documents, flaky_blobs, log.clone());

        Self {
            service,
            reconciler,
            faults,
            directory,
            references,
            documents,
            blobs,
            log,
            student: student_a,
            other_student: student_b,
            advisor,
            other_advisor,
            admin: Actor::new(Uuid::new_v4(), Role::Admin),
        }
    }

    /// Create a draft as `actor`
    pub async fn draft(&self, actor: &Actor, title: &str) -> AchievementReference {
        self.service
            .create(actor, create_request(title))
            .await
            .expect("create draft")
    }

    /// Create and submit as `actor`
    pub async fn submitted(&self, actor: &Actor, title: &str) -> AchievementReference {
        let draft = self.draft(actor, title).await;
        self.service
            .submit(actor, draft.id)
            .await
            .expect("submit draft")
    }
}

pub fn create_request(title: &str) -> CreateAchievementRequest {
    let mut details = Details::new();
    details.insert("rank".into(), serde_json::json!(1));
    details.insert("organizer".into(), serde_json::json!("Kemendikbud"));
    CreateAchievementRequest {
        achievement_type: "Nasional".into(),
        title: title.into(),
        description: "Lomba tingkat nasional".into(),
        details,
        tags: vec!["hackathon".into()],
    }
}

pub fn pdf(len: usize) -> IncomingFile {
    IncomingFile {
        file_name: "sertifikat.pdf".into(),
        content_type: "application/pdf".into(),
        data: bytes::Bytes::from(vec![b'%'; len]),
    }
}
