//! Restore bootstrap
//!
//! Populates a local directory from the newest valid version (or a pinned
//! one). Files land in a hidden staging directory first and are moved into
//! place only once at least one file arrived, so a failed or empty restore
//! never leaves a directory that looks like a checkpoint.

use std::path::{Path, PathBuf};

use sync_core::{Error, Result, TransferSummary};
use tracing::{info, warn};
use uuid::Uuid;

use crate::naming::Series;
use crate::resolver::Resolver;
use crate::store::{ContainerRef, VersionStore, VersionStoreHandle};

/// What to restore and where
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Local directory to populate
    pub target: PathBuf,

    /// Series to restore; derived from the target's base name when unset
    pub series: Option<Series>,

    /// Exact container or branch to restore instead of the latest
    pub version_override: Option<String>,

    /// Replace an existing target
    pub force: bool,
}

impl RestoreRequest {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            series: None,
            version_override: None,
            force: false,
        }
    }

    pub fn series(&self) -> Result<Series> {
        match &self.series {
            Some(series) => Ok(series.clone()),
            None => Series::from_path(&self.target),
        }
    }
}

/// How a restore ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Target already populated and `force` not set
    AlreadyPresent,

    /// No valid version exists; start from scratch
    NothingFound,

    /// Target populated from `container`
    Restored {
        container: ContainerRef,
        summary: TransferSummary,
    },
}

/// Restore the requested version into `request.target`
pub async fn restore(store: VersionStoreHandle, request: &RestoreRequest) -> Result<RestoreOutcome> {
    let series = request.series()?;
    let target = &request.target;

    if is_populated(target).await? && !request.force {
        info!(target = %target.display(), "Local checkpoint already present, skipping restore");
        return Ok(RestoreOutcome::AlreadyPresent);
    }

    let resolver = Resolver::new(store.clone());
    let Some(container) = resolver
        .resolve(&series, request.version_override.as_deref())
        .await
    else {
        let reason = Error::NothingToResume {
            series: series.to_string(),
        };
        info!(reason = %reason, "Starting from scratch");
        return Ok(RestoreOutcome::NothingFound);
    };

    let staging = staging_dir(target)?;
    let summary = match download_into(&store, &container, &staging).await {
        Ok(summary) => summary,
        Err(e) => {
            discard(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = replace(target, &staging).await {
        discard(&staging).await;
        return Err(e);
    }

    info!(
        container = %container,
        target = %target.display(),
        files = summary.files,
        bytes = summary.bytes,
        "Restored checkpoint"
    );
    Ok(RestoreOutcome::Restored { container, summary })
}

async fn download_into(
    store: &VersionStoreHandle,
    container: &ContainerRef,
    staging: &Path,
) -> Result<TransferSummary> {
    tokio::fs::create_dir_all(staging).await?;
    let summary = store.download(container, staging).await?;
    if summary.files == 0 {
        return Err(Error::remote(
            "download",
            &container.name,
            Error::StoragePathNotFound {
                path: container.prefix.clone(),
            },
        ));
    }
    Ok(summary)
}

/// Whether `path` exists and is not an empty directory
async fn is_populated(path: &Path) -> Result<bool> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Ok(true);
    }
    let mut entries = tokio::fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_some())
}

fn staging_dir(target: &Path) -> Result<PathBuf> {
    let name = target.file_name().ok_or_else(|| Error::InvalidConfig {
        message: format!("restore target has no base name: {}", target.display()),
    })?;
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(
        ".{}.restore-{}",
        name.to_string_lossy(),
        Uuid::new_v4().simple()
    )))
}

async fn replace(target: &Path, staging: &Path) -> Result<()> {
    match tokio::fs::metadata(target).await {
        Ok(m) if m.is_dir() => tokio::fs::remove_dir_all(target).await?,
        Ok(_) => tokio::fs::remove_file(target).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::rename(staging, target).await?;
    Ok(())
}

async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staging.display(), error = %e, "Failed to remove staging directory");
        }
    }
}
