//! Enumerate and validate the version containers of a series
//!
//! Shared by the retention sweep and the resolver so both apply the same
//! validity filter: a container counts only if it carries the completion marker.

use sync_core::Result;
use tracing::{debug, warn};

use crate::naming::Series;
use crate::store::{ContainerRef, VersionStore};

/// Classified containers of one series, each list ascending by version
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Complete containers
    pub valid: Vec<ContainerRef>,

    /// Containers without a completion marker
    pub incomplete: Vec<ContainerRef>,

    /// Containers whose marker check failed; neither valid nor deleted
    pub unreadable: Vec<ContainerRef>,

    /// Listed names that carry no version identifier
    pub malformed: Vec<String>,
}

impl Discovery {
    /// Newest valid container
    pub fn latest(&self) -> Option<&ContainerRef> {
        self.valid.last()
    }

    /// Total number of containers carrying an identifier
    pub fn candidates(&self) -> usize {
        self.valid.len() + self.incomplete.len() + self.unreadable.len()
    }
}

/// List, parse and validate every container of `series`
///
/// Fails only if the listing itself fails; per-container problems are
/// classified instead of propagated.
pub async fn discover(store: &dyn VersionStore, series: &Series) -> Result<Discovery> {
    let names = store.list_versions(series).await?;
    let mut discovery = Discovery::default();

    let mut candidates = Vec::with_capacity(names.len());
    for name in names {
        match store.parse_version(series, &name) {
            Some(version) => candidates.push(store.container(series, &version)),
            None => {
                debug!(series = %series, name = %name, "Ignoring name without version identifier");
                discovery.malformed.push(name);
            }
        }
    }
    candidates.sort_by(|a, b| a.version.cmp(&b.version));

    for container in candidates {
        match store.is_complete(&container).await {
            Ok(true) => {
                debug!(container = %container, "Container is valid");
                discovery.valid.push(container);
            }
            Ok(false) => {
                debug!(container = %container, "Container has no completion marker");
                discovery.incomplete.push(container);
            }
            Err(e) => {
                warn!(container = %container, error = %e, "Could not validate container, skipping");
                discovery.unreadable.push(container);
            }
        }
    }

    Ok(discovery)
}
