use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::sanitize;

use super::{validate_key, BlobStore};

/// Blob store rooted at a directory: `<root>/<bucket>/<path>`.
///
/// Writes land in a temporary sibling file that is synced to disk and then
/// renamed into place, so a reader sees either the previous blob or the
/// complete new one, and a successful `put` survives a crash.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        validate_key(bucket, path)?;
        let mut full = self.root.join(bucket);
        full.extend(path.split('/'));
        Ok(full)
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(bucket, path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(StorageError::Read {
                path: full,
                source: e,
            }),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let full = self.resolve(bucket, path)?;
        let parent = full
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        self.ensure_directory(&parent).await?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        debug!(
            file = %sanitize::redact_path(&full),
            bytes = bytes.len(),
            content_type,
            "Writing blob"
        );

        if let Err(e) = write_synced(&temp_path, &bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Write {
                path: temp_path,
                source: e,
            });
        }

        if let Err(e) = fs::rename(&temp_path, &full).await {
            warn!(
                file = %sanitize::redact_path(&full),
                "Failed to move blob into place: {}",
                e
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Write {
                path: full,
                source: e,
            });
        }

        // Persist the rename itself.
        if let Err(e) = sync_dir(&parent).await {
            return Err(StorageError::Write {
                path: parent,
                source: e,
            });
        }

        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir).await?.sync_all().await
}

/// Directories cannot be opened for syncing here; renames are durable once
/// the file data is.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
