//! Achievement domain types
//!
//! An achievement is split across two stores:
//!
//! - [`AchievementReference`] lives in the relational store and owns identity,
//!   ownership and the workflow status.
//! - [`AchievementDocument`] lives in the document store and owns the content
//!   (title, description, details, tags, attachments, points).
//!
//! The reference is the single source of truth for status; the document never
//! carries one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::model::identity::StudentSummary;

/// Open key/value metadata supplied by the student
pub type Details = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Status machine
// =============================================================================

/// Workflow status of an achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementStatus {
    Draft,
    Submitted,
    Verified,
    Rejected,
    Deleted,
}

impl AchievementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Deleted => "deleted",
        }
    }

    /// Content (title, description, details, tags, attachments) is only
    /// mutable while draft
    pub fn allows_content_changes(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AchievementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown achievement status '{}'", other)),
        }
    }
}

/// A status-changing event on an existing reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// draft -> submitted
    Submit,
    /// draft -> deleted
    Delete,
    /// submitted -> verified
    Verify { advisor_id: Uuid },
    /// submitted -> rejected
    Reject { advisor_id: Uuid, note: String },
}

impl Transition {
    /// The only status this transition may start from
    pub fn from_status(&self) -> AchievementStatus {
        match self {
            Self::Submit | Self::Delete => AchievementStatus::Draft,
            Self::Verify { .. } | Self::Reject { .. } => AchievementStatus::Submitted,
        }
    }

    pub fn to_status(&self) -> AchievementStatus {
        match self {
            Self::Submit => AchievementStatus::Submitted,
            Self::Delete => AchievementStatus::Deleted,
            Self::Verify { .. } => AchievementStatus::Verified,
            Self::Reject { .. } => AchievementStatus::Rejected,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Delete => "delete",
            Self::Verify { .. } => "verify",
            Self::Reject { .. } => "reject",
        }
    }
}

// =============================================================================
// Reference (relational store)
// =============================================================================

/// Workflow record of an achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementReference {
    pub id: Uuid,
    /// Owning student's profile id; immutable after creation
    pub student_id: Uuid,
    /// Pointer into the document store; set once at creation
    pub document_id: String,
    pub status: AchievementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl AchievementReference {
    /// A fresh draft reference pointing at `document_id`
    pub fn new_draft(student_id: Uuid, document_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            document_id,
            status: AchievementStatus::Draft,
            rejection_note: None,
            verified_by: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            verified_at: None,
        }
    }

    /// Apply a transition in place.
    ///
    /// Returns false and leaves the reference untouched when the current
    /// status is not the transition's source status.
    pub fn apply(&mut self, transition: &Transition, now: DateTime<Utc>) -> bool {
        if self.status != transition.from_status() {
            return false;
        }

        self.status = transition.to_status();
        self.updated_at = now;
        match transition {
            Transition::Submit => self.submitted_at = Some(now),
            Transition::Delete => {}
            Transition::Verify { advisor_id } => {
                self.verified_at = Some(now);
                self.verified_by = Some(*advisor_id);
            }
            Transition::Reject { advisor_id, note } => {
                self.rejection_note = Some(note.clone());
                self.verified_at = Some(now);
                self.verified_by = Some(*advisor_id);
            }
        }
        true
    }
}

// =============================================================================
// Document (document store)
// =============================================================================

/// Pointer to a stored proof file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Content of an achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDocument {
    pub id: String,
    /// Denormalized owner, for cross-store sanity checks
    pub student_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Zero until verified
    #[serde(default)]
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document to insert; the store generates the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub student_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: Details,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    /// Materialize with a store-generated id
    pub fn into_document(self, id: String) -> AchievementDocument {
        AchievementDocument {
            id,
            student_id: self.student_id,
            achievement_type: self.achievement_type,
            title: self.title,
            description: self.description,
            details: self.details,
            tags: self.tags,
            attachments: Vec::new(),
            points: 0,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Partial content update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentUpdate {
    #[serde(default)]
    pub achievement_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<Details>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl ContentUpdate {
    /// Apply to a document in place
    pub fn apply_to(&self, doc: &mut AchievementDocument, now: DateTime<Utc>) {
        if let Some(ref t) = self.achievement_type {
            doc.achievement_type = t.clone();
        }
        if let Some(ref t) = self.title {
            doc.title = t.clone();
        }
        if let Some(ref d) = self.description {
            doc.description = d.clone();
        }
        if let Some(ref d) = self.details {
            doc.details = d.clone();
        }
        if let Some(ref t) = self.tags {
            doc.tags = t.clone();
        }
        doc.updated_at = now;
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Body of POST /achievements
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAchievementRequest {
    #[serde(default)]
    pub achievement_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of PUT /achievements/{id}
pub type UpdateAchievementRequest = ContentUpdate;

/// Body of POST /achievements/{id}/verify
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyAchievementRequest {
    pub points: i32,
}

/// Body of POST /achievements/{id}/reject
#[derive(Debug, Clone, Deserialize)]
pub struct RejectAchievementRequest {
    pub rejection_note: String,
}

// =============================================================================
// Read models
// =============================================================================

/// Reference row joined with its owning student, as listed
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceListing {
    pub reference: AchievementReference,
    pub student_number: String,
    pub student_name: String,
}

/// One row of a paginated listing
#[derive(Debug, Clone, Serialize)]
pub struct AchievementListItem {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_number: String,
    pub student_name: String,
    pub achievement_type: String,
    pub title: String,
    pub status: AchievementStatus,
    pub points: i32,
    pub created_at: DateTime<Utc>,
}

impl AchievementListItem {
    /// Listing row with empty content, filled in once the document is found
    pub fn from_listing(listing: &ReferenceListing) -> Self {
        Self {
            id: listing.reference.id,
            student_id: listing.reference.student_id,
            student_number: listing.student_number.clone(),
            student_name: listing.student_name.clone(),
            achievement_type: String::new(),
            title: String::new(),
            status: listing.reference.status,
            points: 0,
            created_at: listing.reference.created_at,
        }
    }

    pub fn fill_content(&mut self, doc: &AchievementDocument) {
        self.achievement_type = doc.achievement_type.clone();
        self.title = doc.title.clone();
        self.points = doc.points;
    }
}

/// Full view of one achievement assembled from both stores
#[derive(Debug, Clone, Serialize)]
pub struct AchievementDetail {
    pub id: Uuid,
    pub student: StudentSummary,
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub details: Details,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub points: i32,
    pub status: AchievementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AchievementDetail {
    pub fn assemble(
        reference: AchievementReference,
        student: StudentSummary,
        doc: AchievementDocument,
    ) -> Self {
        Self {
            id: reference.id,
            student,
            achievement_type: doc.achievement_type,
            title: doc.title,
            description: doc.description,
            details: doc.details,
            tags: doc.tags,
            attachments: doc.attachments,
            points: doc.points,
            status: reference.status,
            rejection_note: reference.rejection_note,
            verified_by: reference.verified_by,
            submitted_at: reference.submitted_at,
            verified_at: reference.verified_at,
            created_at: reference.created_at,
            updated_at: reference.updated_at,
        }
    }
}

/// Paginated listing response
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedAchievements {
    pub data: Vec<AchievementListItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

// =============================================================================
// Listing filters
// =============================================================================

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Relational filters applied when paging references.
///
/// Deleted references are never listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub status: Option<AchievementStatus>,
    pub student_id: Option<Uuid>,
    pub advisor_id: Option<Uuid>,
    /// Case-insensitive match on student name or student number
    pub search: Option<String>,
}

/// Normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Page below 1 becomes 1; a size outside 1..=100 falls back to 10
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 { 1 } else { page.min(u32::MAX as i64) as u32 };
        let page_size = if page_size < 1 || page_size > MAX_PAGE_SIZE as i64 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size as u32
        };
        Self { page, page_size }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    pub fn total_pages(&self, total: u64) -> u32 {
        total.div_ceil(self.page_size as u64) as u32
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}
