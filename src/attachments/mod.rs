//! Proof-file attachments: validation, naming and blob storage

pub mod storage;
pub mod uploader;

pub use storage::{BlobStorage, FilesystemStorage, MemoryBlobStorage};
pub use uploader::{
    AttachmentPolicy, AttachmentUploader, IncomingFile, StoredAttachment,
    ALLOWED_CONTENT_TYPES, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_URL_PREFIX,
};
