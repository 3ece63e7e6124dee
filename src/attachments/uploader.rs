//! Proof-file validation and storage
//!
//! The uploader only knows about files. Ownership and status checks belong
//! to the workflow service, which calls [`AttachmentUploader::validate`]
//! before anything else and [`AttachmentUploader::discard`] to compensate a
//! failed append.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::attachments::storage::BlobStorage;
use crate::model::Attachment;
use crate::store::StoreResult;
use crate::types::AppError;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_URL_PREFIX: &str = "/uploads/achievements";
pub const ALLOWED_CONTENT_TYPES: &[&str] =
    &["application/pdf", "image/jpeg", "image/jpg", "image/png"];

/// A file as received from the transport
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Name supplied by the client; only its extension is kept
    pub file_name: String,
    /// Declared content type
    pub content_type: String,
    pub data: Bytes,
}

impl IncomingFile {
    /// Declared type without parameters, lowercased
    pub fn mime(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Size and type limits plus the public URL prefix
#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
    pub url_prefix: String,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_types: ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect(),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }
}

impl AttachmentPolicy {
    pub fn new(max_bytes: u64, url_prefix: impl Into<String>) -> Self {
        Self {
            max_bytes,
            url_prefix: url_prefix.into(),
            ..Default::default()
        }
    }

    /// Size limit in whole MiB, as shown to clients
    fn max_megabytes(&self) -> u64 {
        (self.max_bytes / (1024 * 1024)).max(1)
    }

    /// Error for a file over the size limit
    pub fn too_large(&self) -> AppError {
        AppError::validation(format!("File too large. Maximum {}MB", self.max_megabytes()))
    }

    pub fn check(&self, file: &IncomingFile) -> Result<(), AppError> {
        if file.data.len() as u64 > self.max_bytes {
            return Err(self.too_large());
        }

        let mime = file.mime();
        if !self.allowed_types.iter().any(|t| *t == mime) {
            return Err(AppError::validation(format!(
                "Unsupported file type. Allowed types: {}",
                self.allowed_types.join(", ")
            )));
        }

        Ok(())
    }

    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name)
    }
}

/// Extension for a stored file: the client's extension when it is plain
/// alphanumeric, otherwise one derived from the content type
fn extension_for(file: &IncomingFile) -> String {
    let from_name = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));

    if let Some(ext) = from_name {
        return format!(".{}", ext);
    }

    match file.mime().as_str() {
        "application/pdf" => ".pdf".into(),
        "image/jpeg" | "image/jpg" => ".jpg".into(),
        "image/png" => ".png".into(),
        _ => String::new(),
    }
}

/// `ACH-{reference}-{unix_millis}-{random8}{ext}`
pub fn generate_file_name(reference_id: Uuid, file: &IncomingFile, now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "ACH-{}-{}-{}{}",
        reference_id,
        now.timestamp_millis(),
        &random[..8],
        extension_for(file)
    )
}

/// A file written to blob storage, not yet linked to a document
#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub attachment: Attachment,
    /// Blob storage key, for compensation
    pub key: String,
}

pub struct AttachmentUploader {
    policy: AttachmentPolicy,
    storage: Arc<dyn BlobStorage>,
}

impl AttachmentUploader {
    pub fn new(policy: AttachmentPolicy, storage: Arc<dyn BlobStorage>) -> Self {
        Self { policy, storage }
    }

    pub fn policy(&self) -> &AttachmentPolicy {
        &self.policy
    }

    pub fn validate(&self, file: &IncomingFile) -> Result<(), AppError> {
        self.policy.check(file)
    }

    /// Write the file under a fresh name and build its pointer
    pub async fn store(
        &self,
        reference_id: Uuid,
        file: &IncomingFile,
        now: DateTime<Utc>,
    ) -> StoreResult<StoredAttachment> {
        let file_name = generate_file_name(reference_id, file, now);
        self.storage.write(&file_name, &file.data).await?;

        debug!(file_name = %file_name, size = file.data.len(), "Stored attachment");

        Ok(StoredAttachment {
            attachment: Attachment {
                file_url: self.policy.file_url(&file_name),
                file_type: file.mime(),
                uploaded_at: now,
                file_name: file_name.clone(),
            },
            key: file_name,
        })
    }

    /// Remove a stored file
    pub async fn discard(&self, key: &str) -> StoreResult<()> {
        self.storage.delete(key).await
    }
}
