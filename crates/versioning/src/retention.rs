//! Retention manager
//!
//! One reconcile pass per series: incomplete containers are swept first,
//! then valid containers beyond the retention window are pruned oldest-first.
//! A pass never fails; every problem is logged and the item skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sync_core::Error;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::discovery::discover;
use crate::naming::Series;
use crate::store::{ContainerRef, VersionStore, VersionStoreHandle};

/// Retention settings for a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of valid versions kept; zero prunes everything
    pub keep_count: usize,

    /// Minimum age before an incomplete container is swept
    pub incomplete_grace: Duration,
}

impl RetentionPolicy {
    pub fn keep(keep_count: usize) -> Self {
        Self {
            keep_count,
            incomplete_grace: Duration::ZERO,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.incomplete_grace = grace;
        self
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::keep(3)
    }
}

/// Which valid containers survive the window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Newest `keep_count` containers, ascending
    pub keep: Vec<ContainerRef>,

    /// Everything older, oldest first
    pub delete: Vec<ContainerRef>,
}

/// Split containers (ascending by version) into kept and pruned
pub fn plan_retention(valid: &[ContainerRef], keep_count: usize) -> RetentionPlan {
    let mut sorted = valid.to_vec();
    sorted.sort_by(|a, b| a.version.cmp(&b.version));

    let cut = sorted.len().saturating_sub(keep_count);
    let keep = sorted.split_off(cut);
    RetentionPlan { keep, delete: sorted }
}

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    /// Incomplete containers deleted
    pub swept: Vec<String>,

    /// Valid containers deleted for exceeding the window
    pub pruned: Vec<String>,

    /// Valid containers retained
    pub kept: Vec<String>,

    /// Incomplete containers left alone because they are younger than the grace period
    pub deferred: Vec<String>,

    /// Containers skipped because validation or deletion failed
    pub failed: Vec<(String, String)>,

    /// Set when the series could not be listed at all
    pub listing_error: Option<String>,
}

impl RetentionReport {
    pub fn deleted(&self) -> usize {
        self.swept.len() + self.pruned.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.listing_error.is_none()
    }
}

/// Garbage collector for version containers
#[derive(Clone)]
pub struct RetentionManager {
    store: VersionStoreHandle,
    clock: Arc<dyn Clock>,
}

impl RetentionManager {
    pub fn new(store: VersionStoreHandle) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: VersionStoreHandle, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Sweep incomplete containers and prune valid ones beyond the window
    #[instrument(skip(self, policy), fields(keep_count = policy.keep_count))]
    pub async fn reconcile(&self, series: &Series, policy: &RetentionPolicy) -> RetentionReport {
        let mut report = RetentionReport::default();

        let discovery = match discover(self.store.as_ref(), series).await {
            Ok(discovery) => discovery,
            Err(e) => {
                warn!(series = %series, error = %e, "Could not list containers, skipping cleanup");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        let now = self.clock.now();
        for container in &discovery.incomplete {
            if within_grace(container, policy.incomplete_grace, now) {
                debug!(container = %container, "Incomplete container within grace period, leaving it");
                report.deferred.push(container.name.clone());
                continue;
            }
            let reason = Error::ValidationFailed {
                container: container.name.clone(),
            };
            info!(reason = %reason, "Deleting incomplete container");
            self.delete_into(container, &mut report.swept, &mut report.failed)
                .await;
        }

        for container in &discovery.unreadable {
            report
                .failed
                .push((container.name.clone(), "validation failed".to_string()));
        }

        let plan = plan_retention(&discovery.valid, policy.keep_count);
        for container in &plan.delete {
            info!(container = %container, "Deleting version beyond retention window");
            self.delete_into(container, &mut report.pruned, &mut report.failed)
                .await;
        }
        for container in &plan.keep {
            debug!(container = %container, "Keeping version");
            report.kept.push(container.name.clone());
        }

        info!(
            series = %series,
            kept = report.kept.len(),
            swept = report.swept.len(),
            pruned = report.pruned.len(),
            failed = report.failed.len(),
            "Cleanup completed"
        );
        report
    }

    async fn delete_into(
        &self,
        container: &ContainerRef,
        deleted: &mut Vec<String>,
        failed: &mut Vec<(String, String)>,
    ) {
        match self.store.delete_version(container).await {
            Ok(()) => deleted.push(container.name.clone()),
            Err(e) => {
                warn!(container = %container, error = %e, "Failed to delete container");
                failed.push((container.name.clone(), e.to_string()));
            }
        }
    }
}

fn within_grace(container: &ContainerRef, grace: Duration, now: DateTime<Utc>) -> bool {
    if grace.is_zero() {
        return false;
    }
    let Some(version) = &container.version else {
        return false;
    };
    match chrono::Duration::from_std(grace) {
        Ok(grace) => now.signed_duration_since(version.timestamp()) < grace,
        Err(_) => true,
    }
}
