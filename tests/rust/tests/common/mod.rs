//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use storage::LocalStorage;
use sync_core::{Error, LayoutStrategy, Result, Step, TransferSummary};
use tempfile::TempDir;
use versioning::{
    CompletionMarker, ContainerRef, ManualClock, ObjectVersionStore, Series, VersionId, VersionStore,
    VersionStoreHandle, PROGRESS_FILE,
};

pub const OWNER: &str = "sunshk";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("versioning=debug,monitor=debug")
        .try_init();
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// Clock advancing one second per reading from 2025-01-01 12:00:00
pub fn ticking_clock() -> ManualClock {
    ManualClock::ticking(start_time(), Duration::seconds(1))
}

/// A training run directory plus a filesystem-backed remote store
pub struct World {
    pub dir: TempDir,
    pub store: VersionStoreHandle,
    pub series: Series,
}

impl World {
    pub fn new(strategy: LayoutStrategy) -> Self {
        init_logging();
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(LocalStorage::new(dir.path().join("remote")));
        let store = ObjectVersionStore::new(backend, OWNER, strategy)
            .unwrap()
            .into_handle();
        std::fs::create_dir_all(dir.path().join("run-a")).unwrap();
        Self {
            dir,
            store,
            series: Series::new("run-a").unwrap(),
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        self.dir.path().join("run-a")
    }

    /// Write `global_step_{step}` with a couple of files and point the progress file at it
    pub fn write_snapshot(&self, step: Step) -> PathBuf {
        write_snapshot(&self.run_dir(), step)
    }

    /// Create a container directly in the store, optionally marked complete
    pub async fn seed(&self, id: &str, complete: bool) -> ContainerRef {
        let version = VersionId::parse(id).unwrap();
        self.store.ensure_series(&self.series).await.unwrap();
        let container = self
            .store
            .create_version(&self.series, &version, version.timestamp())
            .await
            .unwrap();
        self.store
            .write_bytes(&container, "global_step_1/model.bin", Bytes::from_static(b"w"))
            .await
            .unwrap();
        if complete {
            self.store
                .mark_complete(&container, &CompletionMarker::new(version.timestamp(), 1))
                .await
                .unwrap();
        }
        container
    }

    pub async fn remote_versions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .store
            .list_versions(&self.series)
            .await
            .unwrap()
            .iter()
            .filter_map(|raw| self.store.parse_version(&self.series, raw))
            .map(|v| v.to_string())
            .collect();
        ids.sort();
        ids
    }
}

pub fn write_snapshot(run: &Path, step: Step) -> PathBuf {
    let snapshot = run.join(format!("global_step_{step}"));
    std::fs::create_dir_all(snapshot.join("actor")).unwrap();
    std::fs::write(snapshot.join("actor/model.bin"), format!("weights@{step}")).unwrap();
    std::fs::write(snapshot.join("data.pt"), b"dataloader").unwrap();
    std::fs::write(run.join(PROGRESS_FILE), step.to_string()).unwrap();
    snapshot
}

/// A store operation to fail, optionally only for containers whose name contains `target`
#[derive(Debug, Clone)]
struct Fault {
    operation: &'static str,
    target: Option<String>,
}

/// Version store decorator that injects remote failures
pub struct FlakyStore {
    inner: VersionStoreHandle,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn wrap(inner: VersionStoreHandle) -> Arc<Self> {
        Arc::new(Self {
            inner,
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Fail every call of `operation`
    pub fn fail(&self, operation: &'static str) {
        self.faults.lock().push(Fault {
            operation,
            target: None,
        });
    }

    /// Fail `operation` only for containers whose name contains `target`
    pub fn fail_on(&self, operation: &'static str, target: &str) {
        self.faults.lock().push(Fault {
            operation,
            target: Some(target.to_string()),
        });
    }

    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// Operations seen so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, operation: &'static str, target: &str) -> Result<()> {
        self.calls.lock().push(operation.to_string());
        let hit = self.faults.lock().iter().any(|f| {
            f.operation == operation && f.target.as_deref().map_or(true, |t| target.contains(t))
        });
        if hit {
            return Err(Error::RemoteUnavailable {
                operation: operation.to_string(),
                target: target.to_string(),
                message: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VersionStore for FlakyStore {
    fn strategy(&self) -> LayoutStrategy {
        self.inner.strategy()
    }

    fn container(&self, series: &Series, version: &VersionId) -> ContainerRef {
        self.inner.container(series, version)
    }

    fn parse_version(&self, series: &Series, raw: &str) -> Option<VersionId> {
        self.inner.parse_version(series, raw)
    }

    fn resolve_override(&self, series: &Series, raw: &str) -> Result<ContainerRef> {
        self.inner.resolve_override(series, raw)
    }

    async fn ensure_series(&self, series: &Series) -> Result<()> {
        self.check("ensure_series", series.as_str())?;
        self.inner.ensure_series(series).await
    }

    async fn create_version(
        &self,
        series: &Series,
        version: &VersionId,
        created_at: DateTime<Utc>,
    ) -> Result<ContainerRef> {
        self.check("create_version", version.as_str())?;
        self.inner.create_version(series, version, created_at).await
    }

    async fn list_versions(&self, series: &Series) -> Result<Vec<String>> {
        self.check("list_versions", series.as_str())?;
        self.inner.list_versions(series).await
    }

    async fn list_files(&self, container: &ContainerRef) -> Result<Vec<String>> {
        self.check("list_files", &container.name)?;
        self.inner.list_files(container).await
    }

    async fn write_bytes(&self, container: &ContainerRef, path: &str, data: Bytes) -> Result<u64> {
        self.check("write_bytes", &container.name)?;
        self.inner.write_bytes(container, path, data).await
    }

    async fn upload_file(
        &self,
        container: &ContainerRef,
        local: &Path,
        path_in_container: &str,
    ) -> Result<u64> {
        self.check("upload_file", &container.name)?;
        self.inner.upload_file(container, local, path_in_container).await
    }

    async fn upload_folder(
        &self,
        container: &ContainerRef,
        local_dir: &Path,
        path_in_container: &str,
    ) -> Result<TransferSummary> {
        self.check("upload_folder", &container.name)?;
        self.inner
            .upload_folder(container, local_dir, path_in_container)
            .await
    }

    async fn delete_version(&self, container: &ContainerRef) -> Result<()> {
        self.check("delete_version", &container.name)?;
        self.inner.delete_version(container).await
    }

    async fn download(&self, container: &ContainerRef, local_dir: &Path) -> Result<TransferSummary> {
        self.check("download", &container.name)?;
        self.inner.download(container, local_dir).await
    }

    async fn mark_complete(&self, container: &ContainerRef, marker: &CompletionMarker) -> Result<()> {
        self.check("mark_complete", &container.name)?;
        self.inner.mark_complete(container, marker).await
    }
}
