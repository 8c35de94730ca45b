//! Blob storage: an opaque byte store addressed by bucket and path.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemBlobStore;
pub use memory::MemoryBlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads a whole blob. A missing blob is [`StorageError::NotFound`].
    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Writes a whole blob, replacing any previous content at `path`.
    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Rejects keys that could escape their bucket on a filesystem.
pub fn validate_key(bucket: &str, path: &str) -> Result<(), StorageError> {
    let invalid = |path: &str, reason| StorageError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(invalid(bucket, "bucket must be a single path segment"));
    }
    if path.is_empty() {
        return Err(invalid(path, "path is empty"));
    }
    if path.starts_with('/') {
        return Err(invalid(path, "path is absolute"));
    }
    if path.contains('\\') {
        return Err(invalid(path, "path contains a backslash"));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid(path, "path has an empty, '.' or '..' segment"));
    }
    Ok(())
}
