//! Local filesystem storage backend
//!
//! Provides async file I/O with atomic writes to prevent partial/corrupt files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sync_core::{Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::StorageBackend;

/// Local filesystem storage backend
///
/// Stores objects in a local directory with support for:
/// - Atomic writes (write to .tmp, then rename)
/// - Automatic directory creation
/// - Recursive file listing and directory-level listing
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Base path for all storage operations
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory to use as the storage root
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative path to an absolute path
    fn resolve_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path.trim_start_matches('/'))
    }

    /// Generate a unique temporary file path
    fn temp_path(&self, path: &str) -> PathBuf {
        let full_path = self.resolve_path(path);
        let temp_name = format!(
            ".{}.{}.tmp",
            full_path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        full_path.with_file_name(temp_name)
    }

    /// In-flight atomic writes are not objects yet
    fn is_temp_file(name: &str) -> bool {
        name.starts_with('.') && name.ends_with(".tmp")
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        let full_path = self.resolve_path(path);
        debug!(?full_path, "Reading file");

        match fs::read(&full_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::StoragePathNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(Error::Storage {
                message: format!("Failed to read {}: {}", path, e),
            }),
        }
    }

    #[instrument(skip(self, data), fields(backend = "local", size = data.len()))]
    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        let full_path = self.resolve_path(path);
        let temp_path = self.temp_path(path);
        let size = data.len() as u64;

        debug!(?full_path, ?temp_path, size, "Writing file atomically");

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage {
                    message: format!("Failed to create directory {:?}: {}", parent, e),
                })?;
        }

        // Write to temporary file
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage {
                message: format!("Failed to create temp file {:?}: {}", temp_path, e),
            })?;

        file.write_all(&data).await.map_err(|e| Error::Storage {
            message: format!("Failed to write data: {}", e),
        })?;

        file.sync_all().await.map_err(|e| Error::Storage {
            message: format!("Failed to sync file: {}", e),
        })?;

        // Atomic rename
        fs::rename(&temp_path, &full_path)
            .await
            .map_err(|e| Error::Storage {
                message: format!("Failed to rename {:?} to {:?}: {}", temp_path, full_path, e),
            })?;

        debug!(?full_path, size, "File written successfully");
        Ok(size)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.resolve_path(path);
        debug!(?full_path, "Deleting file");

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::StoragePathNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(Error::Storage {
                message: format!("Failed to delete {}: {}", path, e),
            }),
        }
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.resolve_path(path);
        Ok(fs::metadata(&full_path).await.is_ok())
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let search_path = self.resolve_path(prefix);
        let mut results = Vec::new();

        debug!(?search_path, "Listing files with prefix");

        // Determine the directory to scan
        let dir_to_scan = if search_path.is_dir() {
            search_path.clone()
        } else if let Some(parent) = search_path.parent() {
            if parent.is_dir() {
                parent.to_path_buf()
            } else {
                return Ok(results);
            }
        } else {
            return Ok(results);
        };

        // Recursively walk the directory
        let mut stack = vec![dir_to_scan];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let entry_path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(m) => m,
                    Err(_) => continue,
                };

                if metadata.is_dir() {
                    stack.push(entry_path);
                } else if metadata.is_file() {
                    if Self::is_temp_file(&entry.file_name().to_string_lossy()) {
                        continue;
                    }
                    // Convert to relative path
                    if let Ok(relative) = entry_path.strip_prefix(&self.base_path) {
                        let relative_str = relative.to_string_lossy().replace('\\', "/");
                        // Only include if it matches the prefix
                        if relative_str.starts_with(prefix.trim_start_matches('/')) {
                            results.push(relative_str);
                        }
                    }
                }
            }
        }

        results.sort();
        debug!(count = results.len(), "Found files");
        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.resolve_path(prefix);
        let mut results = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => {
                return Err(Error::Storage {
                    message: format!("Failed to list {}: {}", prefix, e),
                })
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::Storage {
            message: format!("Failed to list {}: {}", prefix, e),
        })? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                results.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        results.sort();
        debug!(count = results.len(), "Found directories");
        Ok(results)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let full_path = self.resolve_path(prefix);
        let paths = self.list(prefix).await?;

        if prefix.ends_with('/') && full_path.is_dir() {
            fs::remove_dir_all(&full_path)
                .await
                .map_err(|e| Error::Storage {
                    message: format!("Failed to remove {}: {}", prefix, e),
                })?;
            debug!(?full_path, removed = paths.len(), "Removed directory tree");
            return Ok(paths.len());
        }

        let mut removed = 0;
        for path in &paths {
            match self.delete(path).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}
