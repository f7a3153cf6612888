//! Trait implemented by object storage backends.

use async_trait::async_trait;
use tokio::fs::File;

use crate::error::StorageResult;

/// Bucket identity reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMetadata {
    /// Bucket name.
    pub name: String,
    /// Zone the bucket lives in, when the backend can resolve it.
    pub location: Option<String>,
}

/// Result of a successful existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectStat {
    /// Object size when the backend reports it.
    pub size: Option<u64>,
}

/// Minimal object storage surface used by the mirroring pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Report the bucket name and zone.
    async fn metadata(&self) -> StorageResult<StorageMetadata>;

    /// Check whether an object exists.
    ///
    /// Must return [`crate::StorageError::NotFound`] when, and only when, the
    /// object is absent.
    async fn stat(&self, path: &str) -> StorageResult<ObjectStat>;

    /// Upload `size` bytes read from `body` to `path`.
    async fn write(&self, path: &str, body: File, size: u64) -> StorageResult<()>;
}
