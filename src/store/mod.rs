//! Storage seams for the workflow service
//!
//! Each store is a trait so backends can be swapped:
//!
//! - [`ReferenceStore`]: achievement references (PostgreSQL or memory)
//! - [`DocumentStore`]: achievement documents (MongoDB or memory)
//! - [`IdentityResolver`]: student/lecturer profile lookups (PostgreSQL or memory)
//! - [`ReconciliationLog`]: leftovers of failed compensation (PostgreSQL or memory)
//!
//! Backends return [`StoreError`]; the workflow service maps every store
//! error to a database error before it reaches the transport.

pub mod memory;
pub mod mongo;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{
    AchievementDocument, AchievementReference, AdvisorIdentity, Attachment, ContentUpdate,
    ListFilter, NewDocument, PageRequest, ReconcileKind, ReconciliationEntry, ReferenceListing,
    StudentIdentity, Transition,
};
use crate::types::AppError;

pub use memory::{
    MemoryDirectory, MemoryDocumentStore, MemoryReconciliationLog, MemoryReferenceStore,
};
pub use mongo::MongoDocumentStore;
pub use postgres::{PgIdentityResolver, PgReconciliationLog, PgReferenceStore};

// =============================================================================
// Errors
// =============================================================================

/// Backend failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON error: {0}")]
    Bson(String),

    #[error("Blob storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row or document could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Backend unreachable or refused the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<bson::oid::Error> for StoreError {
    fn from(err: bson::oid::Error) -> Self {
        Self::Bson(err.to_string())
    }
}

impl From<bson::ser::Error> for StoreError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Bson(err.to_string())
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        Self::Bson(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Traits
// =============================================================================

/// Relational store for achievement references
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn insert(&self, reference: &AchievementReference) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<AchievementReference>>;

    /// Bump `updated_at` only while the reference is still draft.
    /// Returns false if it is no longer draft (or does not exist).
    async fn touch_draft(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Conditional status write: applies `transition` only if the current
    /// status is its source status. Returns the updated reference, or None
    /// when the guard did not match.
    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AchievementReference>>;

    /// Page over non-deleted references joined with their student, newest
    /// first. Returns the page and the total match count.
    async fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<ReferenceListing>, u64)>;

    /// Whether any reference points at this document
    async fn exists_for_document(&self, document_id: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Document store for achievement content
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; returns the generated id
    async fn insert(&self, doc: NewDocument) -> StoreResult<String>;

    async fn get(&self, id: &str) -> StoreResult<Option<AchievementDocument>>;

    /// Batch fetch; ids with no document are skipped
    async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<AchievementDocument>>;

    /// Apply supplied fields. Returns false if no document matched.
    async fn update_content(
        &self,
        id: &str,
        update: &ContentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn push_attachment(
        &self,
        id: &str,
        attachment: &Attachment,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn set_points(&self, id: &str, points: i32, now: DateTime<Utc>) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Maps accounts to student and lecturer profiles
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn student_by_user(&self, user_id: Uuid) -> StoreResult<Option<StudentIdentity>>;

    async fn advisor_by_user(&self, user_id: Uuid) -> StoreResult<Option<AdvisorIdentity>>;

    async fn student_by_id(&self, student_id: Uuid) -> StoreResult<Option<StudentIdentity>>;
}

/// Durable record of cross-store leftovers
#[async_trait]
pub trait ReconciliationLog: Send + Sync {
    async fn record(&self, kind: ReconcileKind, reason: &str) -> StoreResult<Uuid>;

    /// Unresolved entries with fewer than `max_attempts` failed repairs, oldest first
    async fn pending(&self, limit: u32, max_attempts: u32) -> StoreResult<Vec<ReconciliationEntry>>;

    async fn resolve(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// Record a failed repair attempt
    async fn bump_attempt(&self, id: Uuid, error: &str) -> StoreResult<()>;
}
