//! Resolve the newest valid version of a series

use tracing::{info, warn};

use crate::discovery::discover;
use crate::naming::Series;
use crate::store::{ContainerRef, VersionStore, VersionStoreHandle};

/// Picks the version to restore from
#[derive(Clone)]
pub struct Resolver {
    store: VersionStoreHandle,
}

impl Resolver {
    pub fn new(store: VersionStoreHandle) -> Self {
        Self { store }
    }

    /// Newest container carrying the completion marker
    ///
    /// Listing failures are logged and reported as `None`.
    pub async fn resolve_latest(&self, series: &Series) -> Option<ContainerRef> {
        let valid = self.list_valid(series).await;
        match valid.last() {
            Some(latest) => {
                info!(series = %series, container = %latest, "Selected latest valid version");
                Some(latest.clone())
            }
            None => {
                info!(series = %series, "No valid version found");
                None
            }
        }
    }

    /// Pinned container when `version_override` is set, the latest valid one otherwise
    pub async fn resolve(&self, series: &Series, version_override: Option<&str>) -> Option<ContainerRef> {
        let Some(raw) = version_override else {
            return self.resolve_latest(series).await;
        };
        match self.store.resolve_override(series, raw) {
            Ok(container) => {
                info!(series = %series, container = %container, "Using pinned version");
                Some(container)
            }
            Err(e) => {
                warn!(series = %series, version = raw, error = %e, "Rejected version override");
                None
            }
        }
    }

    /// Every valid container of `series`, ascending; empty when listing fails
    pub async fn list_valid(&self, series: &Series) -> Vec<ContainerRef> {
        match discover(self.store.as_ref(), series).await {
            Ok(discovery) => discovery.valid,
            Err(e) => {
                warn!(series = %series, error = %e, "Could not list versions");
                Vec::new()
            }
        }
    }
}
