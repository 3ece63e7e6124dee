//! Blob storage backends for proof files
//!
//! Files are addressed by a flat storage key (the generated file name).

use async_trait::async_trait;
use dashmap::DashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::store::StoreResult;

/// Storage backend trait for different storage implementations
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Write data under a key, replacing anything already there
    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Delete a key; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Filesystem storage backend rooted at the upload directory
pub struct FilesystemStorage {
    base_path: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Create the base directory and round-trip a probe file, so permission
    /// problems surface at startup rather than on the first upload
    pub async fn validate(&self) -> Result<(), String> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", self.base_path, e))?;

        let probe = self.base_path.join(".health-check");
        fs::write(&probe, b"ok")
            .await
            .map_err(|e| format!("write({:?}): {}", probe, e))?;
        fs::remove_file(&probe)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", probe, e))?;

        Ok(())
    }
}

#[async_trait]
impl BlobStorage for FilesystemStorage {
    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let full_path = self.full_path(key);
        debug!(key = %key, full_path = %full_path.display(), size = data.len(), "blob storage: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "blob storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        if let Err(e) = write_then_rename(&temp_path, &full_path, data).await {
            warn!(
                temp_path = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "blob storage: write failed"
            );
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(temp_path = %temp_path.display(), error = %cleanup, "blob storage: temp cleanup failed");
                }
            }
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let full_path = self.full_path(key);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }
}

async fn write_then_rename(temp_path: &Path, full_path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, full_path).await
}

/// In-memory backend for tests and dev mode
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.blobs.remove(key);
        Ok(())
    }
}
