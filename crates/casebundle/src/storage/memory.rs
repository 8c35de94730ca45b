use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;

use super::{validate_key, BlobStore};

type Key = (String, String);

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-process blob store for tests and local tooling.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<Key, StoredBlob>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, StoredBlob>> {
        // A poisoned map still holds consistent entries; each insert is atomic.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds a blob without going through the async API.
    pub fn insert(&self, bucket: &str, path: &str, bytes: impl Into<Vec<u8>>, content_type: &str) {
        self.lock().insert(
            (bucket.to_string(), path.to_string()),
            StoredBlob {
                bytes: bytes.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn bytes(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|b| b.bytes.clone())
    }

    pub fn content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.lock()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|b| b.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every following `put` fail, to simulate an unavailable backend.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(bucket, path)?;
        self.bytes(bucket, path).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        validate_key(bucket, path)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                path: format!("{}/{}", bucket, path).into(),
                source: std::io::Error::other("writes disabled"),
            });
        }
        self.insert(bucket, path, bytes, content_type);
        Ok(())
    }
}
