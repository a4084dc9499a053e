//! Snapshot uploader
//!
//! Every call creates a brand-new version container; nothing is retried or
//! overwritten in place. The completion marker is the final write, so a
//! failure at any earlier step leaves a container the next reconcile sweeps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sync_core::{Error, Result, Step, TransferSummary};
use tracing::{info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::marker::{CompletionMarker, PROGRESS_FILE};
use crate::naming::{Series, VersionId};
use crate::retention::{RetentionManager, RetentionPolicy, RetentionReport};
use crate::store::{ContainerRef, VersionStore, VersionStoreHandle};

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub container: ContainerRef,
    pub version: VersionId,
    pub step: Step,

    /// Snapshot files and the progress copy
    pub transferred: TransferSummary,

    /// Cleanup pass run after the upload
    pub retention: RetentionReport,
}

/// Uploads local snapshots as new versions of a series
#[derive(Clone)]
pub struct Uploader {
    store: VersionStoreHandle,
    clock: Arc<dyn Clock>,
    retention: RetentionManager,
    policy: RetentionPolicy,
    progress_file: String,
}

impl Uploader {
    pub fn new(store: VersionStoreHandle, policy: RetentionPolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(store: VersionStoreHandle, policy: RetentionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            retention: RetentionManager::with_clock(store.clone(), clock.clone()),
            store,
            clock,
            policy,
            progress_file: PROGRESS_FILE.to_string(),
        }
    }

    /// Name of the progress file expected next to each snapshot directory
    pub fn with_progress_file(mut self, name: impl Into<String>) -> Self {
        self.progress_file = name.into();
        self
    }

    /// Upload `snapshot_dir` as a new version of `series`, then reconcile the series
    #[instrument(skip(self, snapshot_dir), fields(series = %series))]
    pub async fn upload(&self, snapshot_dir: &Path, series: &Series, step: Step) -> Result<UploadReceipt> {
        let (progress_path, folder_name) = self.check_sources(snapshot_dir).await?;

        let version = VersionId::from_datetime(self.clock.now());
        info!(version = %version, snapshot = %snapshot_dir.display(), "Uploading snapshot");

        self.store.ensure_series(series).await?;
        let container = self
            .store
            .create_version(series, &version, version.timestamp())
            .await?;

        let mut transferred = TransferSummary::default();
        let bytes = self
            .store
            .upload_file(&container, &progress_path, &self.progress_file)
            .await?;
        transferred.record(bytes);

        let folder = self
            .store
            .upload_folder(&container, snapshot_dir, &folder_name)
            .await?;
        transferred.merge(folder);

        let marker = CompletionMarker::new(self.clock.now(), step);
        self.store.mark_complete(&container, &marker).await?;
        info!(
            container = %container,
            files = transferred.files,
            bytes = transferred.bytes,
            "Snapshot uploaded and marked complete"
        );

        let retention = self.retention.reconcile(series, &self.policy).await;

        Ok(UploadReceipt {
            container,
            version,
            step,
            transferred,
            retention,
        })
    }

    /// Progress file path and snapshot folder name, or `SourceMissing`
    async fn check_sources(&self, snapshot_dir: &Path) -> Result<(PathBuf, String)> {
        let missing = |path: &Path| Error::SourceMissing {
            path: path.display().to_string(),
        };

        let is_dir = tokio::fs::metadata(snapshot_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(missing(snapshot_dir));
        }

        let folder_name = snapshot_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| missing(snapshot_dir))?;

        let progress_path = snapshot_dir
            .parent()
            .map(|p| p.join(&self.progress_file))
            .ok_or_else(|| missing(snapshot_dir))?;
        let is_file = tokio::fs::metadata(&progress_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(missing(&progress_path));
        }

        Ok((progress_path, folder_name))
    }
}
