//! Storage backend trait definition
//!
//! Defines the async interface that all storage backends must implement.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use sync_core::{Error, Result};
use tracing::debug;

/// Async trait for storage backends
///
/// Implementors provide basic CRUD operations for binary objects addressed
/// by `/`-separated keys, supporting both local filesystem and remote
/// storage (S3, etc.).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read data from the given path
    ///
    /// # Arguments
    /// * `path` - Relative path within the storage backend
    ///
    /// # Returns
    /// The file contents as `Bytes`
    ///
    /// # Errors
    /// Returns error if path doesn't exist or read fails
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Write data to the given path
    ///
    /// Creates parent directories if they don't exist.
    /// Uses atomic writes where possible (write to temp, then rename).
    ///
    /// # Arguments
    /// * `path` - Relative path within the storage backend
    /// * `data` - Binary data to write
    ///
    /// # Returns
    /// Number of bytes written
    async fn write(&self, path: &str, data: Bytes) -> Result<u64>;

    /// Delete data at the given path
    ///
    /// # Errors
    /// Returns error if path doesn't exist or deletion fails
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if a path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// List all object paths under a given prefix, sorted
    ///
    /// # Arguments
    /// * `prefix` - Path prefix to filter by (e.g., "owner/run-a/")
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// List the immediate child "directories" below a prefix
    ///
    /// Returns bare names (no prefix, no trailing slash), sorted.
    /// A missing prefix yields an empty list.
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete every object under a prefix, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let paths = self.list(prefix).await?;
        let mut removed = 0;
        for path in &paths {
            match self.delete(path).await {
                Ok(()) => removed += 1,
                // Raced with another deleter
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        debug!(prefix, removed, "Deleted prefix");
        Ok(removed)
    }

    /// Upload a local file to the given path
    async fn put_file(&self, path: &str, local: &Path) -> Result<u64> {
        let data = tokio::fs::read(local).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::SourceMissing {
                path: local.display().to_string(),
            },
            _ => Error::Io(e),
        })?;
        self.write(path, Bytes::from(data)).await
    }

    /// Download the object at `path` into a local file, creating parent directories
    async fn get_file(&self, path: &str, local: &Path) -> Result<u64> {
        let data = self.read(path).await?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, &data).await?;
        Ok(data.len() as u64)
    }
}

/// Join key segments with a single `/`, ignoring empty segments
pub fn join_key(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, child),
    }
}
