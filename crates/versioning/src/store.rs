//! Version store client
//!
//! [`VersionStore`] is the set of primitives the protocol needs from a remote
//! artifact store: create a version container, upload into it, mark it
//! complete, list, delete and download. [`ObjectVersionStore`] provides them
//! on top of any [`StorageBackend`], with the container representation chosen
//! by [`LayoutStrategy`]:
//!
//! - `containers`: `{owner}/{series}-{version}/…`, one dedicated container per version
//! - `branches`: `{owner}/{series}/{version}/…`, one branch per version inside a
//!   persistent series container
//!
//! Every backend failure leaves this module as [`Error::RemoteUnavailable`]
//! carrying the operation and container it hit.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{join_key, StorageBackend};
use sync_core::{Error, LayoutStrategy, Result, TransferSummary};
use tracing::{debug, instrument, warn};

use crate::marker::{CompletionMarker, COMPLETION_MARKER};
use crate::naming::{container_name, parse_container_name, Series, VersionId};

/// Bookkeeping record written when a container is created
pub const CONTAINER_RECORD: &str = ".container.json";

/// Bookkeeping record of a persistent series container (branch layout)
pub const SERIES_RECORD: &str = ".series.json";

/// Shared handle to a version store
pub type VersionStoreHandle = Arc<dyn VersionStore>;

/// Address of one version container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    /// Series the container belongs to
    pub series: Series,

    /// Version identifier, absent for pinned containers whose name has no identifier
    pub version: Option<VersionId>,

    /// Human-readable address (`owner/run-a-…` or `owner/run-a@…`)
    pub name: String,

    /// Key prefix of the container, ending with `/`
    pub prefix: String,
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Metadata stored inside each container at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub owner: String,
    pub series: Series,
    pub version: VersionId,
    pub strategy: LayoutStrategy,
    pub created_at: DateTime<Utc>,
}

/// Metadata of a persistent series container
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeriesRecord {
    owner: String,
    series: Series,
    created_at: DateTime<Utc>,
}

/// Primitive operations of the remote artifact store
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Container representation in use
    fn strategy(&self) -> LayoutStrategy;

    /// Address of the container for `version` of `series`
    fn container(&self, series: &Series, version: &VersionId) -> ContainerRef;

    /// Version identifier carried by a raw name from [`VersionStore::list_versions`]
    fn parse_version(&self, series: &Series, raw: &str) -> Option<VersionId>;

    /// Address of a caller-pinned container or branch, bypassing discovery
    fn resolve_override(&self, series: &Series, raw: &str) -> Result<ContainerRef>;

    /// Make sure the series' owning container exists; idempotent
    async fn ensure_series(&self, series: &Series) -> Result<()>;

    /// Create an empty container; fails with [`Error::VersionExists`] if the name is taken
    async fn create_version(
        &self,
        series: &Series,
        version: &VersionId,
        created_at: DateTime<Utc>,
    ) -> Result<ContainerRef>;

    /// Raw container (or branch) names that may belong to `series`
    async fn list_versions(&self, series: &Series) -> Result<Vec<String>>;

    /// Root-relative paths of every file in a container, sorted
    async fn list_files(&self, container: &ContainerRef) -> Result<Vec<String>>;

    /// Write an in-memory object into a container
    async fn write_bytes(&self, container: &ContainerRef, path: &str, data: Bytes) -> Result<u64>;

    /// Upload one local file to `path_in_container`
    async fn upload_file(
        &self,
        container: &ContainerRef,
        local: &Path,
        path_in_container: &str,
    ) -> Result<u64>;

    /// Upload a local folder's contents below `path_in_container`
    async fn upload_folder(
        &self,
        container: &ContainerRef,
        local_dir: &Path,
        path_in_container: &str,
    ) -> Result<TransferSummary>;

    /// Delete a container and everything in it
    async fn delete_version(&self, container: &ContainerRef) -> Result<()>;

    /// Download a container's files into `local_dir`
    async fn download(&self, container: &ContainerRef, local_dir: &Path) -> Result<TransferSummary>;

    /// Write the completion marker; must be the last write of an upload
    async fn mark_complete(&self, container: &ContainerRef, marker: &CompletionMarker) -> Result<()> {
        self.write_bytes(container, COMPLETION_MARKER, Bytes::from(marker.render()))
            .await?;
        Ok(())
    }

    /// Whether the container carries the completion marker
    async fn is_complete(&self, container: &ContainerRef) -> Result<bool> {
        let files = self.list_files(container).await?;
        Ok(CompletionMarker::is_present(&files))
    }
}

/// Version store over a generic object backend
pub struct ObjectVersionStore {
    backend: Arc<dyn StorageBackend>,
    owner: String,
    strategy: LayoutStrategy,
}

impl ObjectVersionStore {
    /// Create a store rooted at `owner` within `backend`
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        owner: impl Into<String>,
        strategy: LayoutStrategy,
    ) -> Result<Self> {
        let owner = owner.into();
        // Owner is a key segment, so it obeys the series naming rules
        Series::new(owner.clone()).map_err(|_| Error::InvalidConfig {
            message: format!("invalid store owner {:?}", owner),
        })?;
        Ok(Self {
            backend,
            owner,
            strategy,
        })
    }

    /// Wrap into a shared handle
    pub fn into_handle(self) -> VersionStoreHandle {
        Arc::new(self)
    }

    /// Prefix below which containers (or branches) of `series` are listed
    fn listing_prefix(&self, series: &Series) -> String {
        match self.strategy {
            LayoutStrategy::Containers => format!("{}/", self.owner),
            LayoutStrategy::Branches => format!("{}/{}/", self.owner, series),
        }
    }

    fn series_record_key(&self, series: &Series) -> String {
        format!("{}/{}/{}", self.owner, series, SERIES_RECORD)
    }

    fn key(container: &ContainerRef, path: &str) -> String {
        join_key(&container.prefix, path)
    }
}

#[async_trait]
impl VersionStore for ObjectVersionStore {
    fn strategy(&self) -> LayoutStrategy {
        self.strategy
    }

    fn container(&self, series: &Series, version: &VersionId) -> ContainerRef {
        let (name, prefix) = match self.strategy {
            LayoutStrategy::Containers => {
                let repo = container_name(series, version);
                (
                    format!("{}/{}", self.owner, repo),
                    format!("{}/{}/", self.owner, repo),
                )
            }
            LayoutStrategy::Branches => (
                format!("{}/{}@{}", self.owner, series, version),
                format!("{}/{}/{}/", self.owner, series, version),
            ),
        };
        ContainerRef {
            series: series.clone(),
            version: Some(version.clone()),
            name,
            prefix,
        }
    }

    fn parse_version(&self, series: &Series, raw: &str) -> Option<VersionId> {
        match self.strategy {
            LayoutStrategy::Containers => parse_container_name(series, raw),
            LayoutStrategy::Branches => VersionId::parse(raw),
        }
    }

    fn resolve_override(&self, series: &Series, raw: &str) -> Result<ContainerRef> {
        let invalid = || Error::InvalidConfig {
            message: format!("invalid version override {:?}", raw),
        };
        let segment = |s: &str| Series::new(s).map(|_| s.to_string()).map_err(|_| invalid());

        match self.strategy {
            LayoutStrategy::Containers => {
                // Either `name` or a full `owner/name`
                let (owner, repo) = match raw.split_once('/') {
                    Some((owner, repo)) => (segment(owner)?, segment(repo)?),
                    None => (self.owner.clone(), segment(raw)?),
                };
                Ok(ContainerRef {
                    series: series.clone(),
                    version: parse_container_name(series, &repo),
                    name: format!("{}/{}", owner, repo),
                    prefix: format!("{}/{}/", owner, repo),
                })
            }
            LayoutStrategy::Branches => {
                let branch = segment(raw)?;
                Ok(ContainerRef {
                    series: series.clone(),
                    version: VersionId::parse(&branch),
                    name: format!("{}/{}@{}", self.owner, series, branch),
                    prefix: format!("{}/{}/{}/", self.owner, series, branch),
                })
            }
        }
    }

    #[instrument(skip(self), fields(owner = %self.owner, strategy = %self.strategy))]
    async fn ensure_series(&self, series: &Series) -> Result<()> {
        if self.strategy == LayoutStrategy::Containers {
            // Dedicated containers need no owning container
            return Ok(());
        }

        let key = self.series_record_key(series);
        let target = format!("{}/{}", self.owner, series);
        let present = self
            .backend
            .exists(&key)
            .await
            .map_err(|e| Error::remote("ensure_series", &target, e))?;
        if present {
            return Ok(());
        }

        let record = SeriesRecord {
            owner: self.owner.clone(),
            series: series.clone(),
            created_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&record)?;
        self.backend
            .write(&key, Bytes::from(body))
            .await
            .map_err(|e| Error::remote("ensure_series", &target, e))?;
        debug!(series = %series, "Created series container");
        Ok(())
    }

    #[instrument(skip(self, created_at), fields(owner = %self.owner, strategy = %self.strategy))]
    async fn create_version(
        &self,
        series: &Series,
        version: &VersionId,
        created_at: DateTime<Utc>,
    ) -> Result<ContainerRef> {
        let container = self.container(series, version);

        if self.strategy == LayoutStrategy::Branches {
            let present = self
                .backend
                .exists(&self.series_record_key(series))
                .await
                .map_err(|e| Error::remote("create_version", &container.name, e))?;
            if !present {
                return Err(Error::RemoteUnavailable {
                    operation: "create_version".to_string(),
                    target: container.name.clone(),
                    message: format!("series container {}/{} does not exist", self.owner, series),
                });
            }
        }

        let existing = self
            .backend
            .list(&container.prefix)
            .await
            .map_err(|e| Error::remote("create_version", &container.name, e))?;
        if !existing.is_empty() {
            return Err(Error::VersionExists {
                container: container.name.clone(),
            });
        }

        let record = ContainerRecord {
            owner: self.owner.clone(),
            series: series.clone(),
            version: version.clone(),
            strategy: self.strategy,
            created_at,
        };
        let body = serde_json::to_vec_pretty(&record)?;
        self.backend
            .write(&Self::key(&container, CONTAINER_RECORD), Bytes::from(body))
            .await
            .map_err(|e| Error::remote("create_version", &container.name, e))?;

        debug!(container = %container, "Created version container");
        Ok(container)
    }

    async fn list_versions(&self, series: &Series) -> Result<Vec<String>> {
        let prefix = self.listing_prefix(series);
        let dirs = self
            .backend
            .list_dirs(&prefix)
            .await
            .map_err(|e| Error::remote("list_versions", prefix.trim_end_matches('/'), e))?;

        Ok(match self.strategy {
            LayoutStrategy::Containers => {
                let wanted = format!("{}-", series);
                dirs.into_iter().filter(|d| d.starts_with(&wanted)).collect()
            }
            LayoutStrategy::Branches => dirs,
        })
    }

    async fn list_files(&self, container: &ContainerRef) -> Result<Vec<String>> {
        let keys = self
            .backend
            .list(&container.prefix)
            .await
            .map_err(|e| Error::remote("list_files", &container.name, e))?;

        let mut files: Vec<String> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(container.prefix.as_str()))
            .filter(|rel| *rel != CONTAINER_RECORD)
            .map(String::from)
            .collect();
        files.sort();
        Ok(files)
    }

    async fn write_bytes(&self, container: &ContainerRef, path: &str, data: Bytes) -> Result<u64> {
        self.backend
            .write(&Self::key(container, path), data)
            .await
            .map_err(|e| Error::remote("write", &container.name, e))
    }

    async fn upload_file(
        &self,
        container: &ContainerRef,
        local: &Path,
        path_in_container: &str,
    ) -> Result<u64> {
        self.backend
            .put_file(&Self::key(container, path_in_container), local)
            .await
            .map_err(|e| Error::remote("upload_file", &container.name, e))
    }

    #[instrument(skip(self, container), fields(container = %container))]
    async fn upload_folder(
        &self,
        container: &ContainerRef,
        local_dir: &Path,
        path_in_container: &str,
    ) -> Result<TransferSummary> {
        let files = collect_files(local_dir.to_path_buf()).await?;
        let mut summary = TransferSummary::default();

        for (local, relative) in &files {
            let key = Self::key(container, &join_key(path_in_container, relative));
            let bytes = self
                .backend
                .put_file(&key, local)
                .await
                .map_err(|e| Error::remote("upload_folder", &container.name, e))?;
            summary.record(bytes);
        }

        debug!(files = summary.files, bytes = summary.bytes, "Uploaded folder");
        Ok(summary)
    }

    #[instrument(skip(self, container), fields(container = %container))]
    async fn delete_version(&self, container: &ContainerRef) -> Result<()> {
        let removed = self
            .backend
            .delete_prefix(&container.prefix)
            .await
            .map_err(|e| Error::remote("delete_version", &container.name, e))?;
        if removed == 0 {
            return Err(Error::remote(
                "delete_version",
                &container.name,
                Error::StoragePathNotFound {
                    path: container.prefix.clone(),
                },
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, container), fields(container = %container))]
    async fn download(&self, container: &ContainerRef, local_dir: &Path) -> Result<TransferSummary> {
        let files = self.list_files(container).await?;
        let mut summary = TransferSummary::default();

        for relative in &files {
            if relative.split('/').any(|seg| seg == ".." || seg.is_empty()) {
                warn!(path = %relative, "Skipping object with unsafe path");
                continue;
            }
            let target = local_dir.join(relative);
            let bytes = self
                .backend
                .get_file(&Self::key(container, relative), &target)
                .await
                .map_err(|e| Error::remote("download", &container.name, e))?;
            summary.record(bytes);
        }

        debug!(files = summary.files, bytes = summary.bytes, "Downloaded container");
        Ok(summary)
    }
}

/// Every regular file below `root` with its `/`-separated relative path, sorted
async fn collect_files(root: PathBuf) -> Result<Vec<(PathBuf, String)>> {
    tokio::task::spawn_blocking(move || {
        if !root.is_dir() {
            return Err(Error::SourceMissing {
                path: root.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(|e| Error::Internal {
                    message: format!("walked outside {}: {}", root.display(), e),
                })?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            files.push((entry.path().to_path_buf(), relative));
        }
        Ok(files)
    })
    .await
    .map_err(|e| Error::Internal {
        message: format!("file walk task failed: {}", e),
    })?
}
