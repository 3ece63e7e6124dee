//! Achievement document schema
//!
//! Narrative content of an achievement. Workflow status lives in the
//! relational reference, never here.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::mongo::IntoIndexes;
use crate::model::{AchievementDocument, Attachment, Details, NewDocument};
use crate::store::{StoreError, StoreResult};

/// Collection name for achievements
pub const ACHIEVEMENT_COLLECTION: &str = "achievements";

/// Attachment pointer as stored
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AttachmentDoc {
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    pub uploaded_at: DateTime,
}

impl From<&Attachment> for AttachmentDoc {
    fn from(a: &Attachment) -> Self {
        Self {
            file_name: a.file_name.clone(),
            file_url: a.file_url.clone(),
            file_type: a.file_type.clone(),
            uploaded_at: DateTime::from_chrono(a.uploaded_at),
        }
    }
}

impl From<AttachmentDoc> for Attachment {
    fn from(a: AttachmentDoc) -> Self {
        Self {
            file_name: a.file_name,
            file_url: a.file_url,
            file_type: a.file_type,
            uploaded_at: a.uploaded_at.to_chrono(),
        }
    }
}

/// Achievement document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AchievementDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Owning student profile id (UUID string)
    pub student_id: String,

    pub achievement_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,

    /// Free-form details (competition level, organizer, dates, ...)
    #[serde(default)]
    pub details: Document,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub attachments: Vec<AttachmentDoc>,

    #[serde(default)]
    pub points: i32,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl TryFrom<NewDocument> for AchievementDoc {
    type Error = StoreError;

    fn try_from(new: NewDocument) -> Result<Self, Self::Error> {
        let created_at = DateTime::from_chrono(new.created_at);
        Ok(Self {
            _id: None,
            student_id: new.student_id.to_string(),
            achievement_type: new.achievement_type,
            title: new.title,
            description: new.description,
            details: details_to_bson(&new.details)?,
            tags: new.tags,
            attachments: Vec::new(),
            points: 0,
            created_at,
            updated_at: created_at,
        })
    }
}

impl TryFrom<AchievementDoc> for AchievementDocument {
    type Error = StoreError;

    fn try_from(doc: AchievementDoc) -> Result<Self, Self::Error> {
        let id = doc
            ._id
            .ok_or_else(|| StoreError::Corrupt("achievement document without _id".into()))?;
        let student_id = Uuid::parse_str(&doc.student_id).map_err(|e| {
            StoreError::Corrupt(format!("document {} has invalid student_id: {}", id, e))
        })?;

        Ok(Self {
            id: id.to_hex(),
            student_id,
            achievement_type: doc.achievement_type,
            title: doc.title,
            description: doc.description,
            details: details_from_bson(doc.details),
            tags: doc.tags,
            attachments: doc.attachments.into_iter().map(Attachment::from).collect(),
            points: doc.points,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        })
    }
}

/// JSON details -> BSON sub-document
pub fn details_to_bson(details: &Details) -> StoreResult<Document> {
    Ok(bson::to_document(details)?)
}

/// BSON sub-document -> JSON details, using relaxed extended JSON so dates
/// and ObjectIds come back as plain JSON values
pub fn details_from_bson(details: Document) -> Details {
    match Bson::Document(details).into_relaxed_extjson() {
        serde_json::Value::Object(map) => map,
        _ => Details::new(),
    }
}

impl IntoIndexes for AchievementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "student_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("student_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
