//! Poll loop
//!
//! Single-flight: the progress file is not read again until the previous
//! upload attempt has returned. The last uploaded step is owned by the loop
//! and only advances when an upload succeeds.

use std::future::Future;
use std::time::Duration;

use sync_core::{Error, Result, Step, STEP_UNSET};
use tracing::{debug, error, info, warn};
use versioning::{ProgressTracker, Series, UploadReceipt, Uploader};

/// What one tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// No progress recorded yet
    Unset,

    /// Nothing newer than the last uploaded step
    UpToDate { step: Step },

    /// A new version was uploaded
    Uploaded(UploadReceipt),

    /// The upload attempt failed; the step will be retried as a new version
    Failed { step: Step, error: Error },
}

/// Drives the progress tracker and uploader on a fixed interval
pub struct PollLoop {
    tracker: ProgressTracker,
    uploader: Uploader,
    series: Series,
    interval: Duration,
    last_uploaded_step: Step,
}

impl PollLoop {
    /// Loop over the series named after the tracker's input directory
    pub fn new(tracker: ProgressTracker, uploader: Uploader, interval: Duration) -> Result<Self> {
        let series = tracker.series()?;
        Ok(Self {
            tracker,
            uploader,
            series,
            interval,
            last_uploaded_step: STEP_UNSET,
        })
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn last_uploaded_step(&self) -> Step {
        self.last_uploaded_step
    }

    /// Treat the step currently on disk as already uploaded
    pub async fn prime(&mut self) -> Step {
        self.last_uploaded_step = self.tracker.read_latest_step().await;
        info!(
            series = %self.series,
            step = self.last_uploaded_step,
            "Initial checkpoint step"
        );
        self.last_uploaded_step
    }

    /// Run the Idle/Uploading state machine once
    pub async fn tick(&mut self) -> TickOutcome {
        let current = self.tracker.read_latest_step().await;
        if current == STEP_UNSET {
            debug!(series = %self.series, "No checkpoint progress yet");
            return TickOutcome::Unset;
        }
        if current <= self.last_uploaded_step {
            debug!(step = current, "No new checkpoint");
            return TickOutcome::UpToDate { step: current };
        }

        info!(
            step = current,
            previous = self.last_uploaded_step,
            "New checkpoint detected"
        );
        let snapshot_dir = self.tracker.snapshot_dir(current);
        match self.uploader.upload(&snapshot_dir, &self.series, current).await {
            Ok(receipt) => {
                self.last_uploaded_step = current;
                info!(step = current, container = %receipt.container, "Checkpoint synchronised");
                TickOutcome::Uploaded(receipt)
            }
            Err(error) if error.is_fatal() => {
                error!(step = current, error = %error, "Checkpoint upload failed");
                TickOutcome::Failed { step: current, error }
            }
            Err(error) => {
                warn!(step = current, error = %error, "Checkpoint upload failed, retrying next tick");
                TickOutcome::Failed { step: current, error }
            }
        }
    }

    /// Tick every interval until `shutdown` resolves
    ///
    /// Shutdown interrupts an in-flight upload; its container never gets a
    /// completion marker and is swept by a later reconcile.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.interval;

        info!(
            series = %self.series,
            input = %self.tracker.input_path().display(),
            interval_secs = interval.as_secs_f64(),
            "Starting checkpoint poll loop"
        );
        self.prime().await;

        loop {
            tokio::select! {
                _ = self.tick() => {}
                _ = &mut shutdown => {
                    info!("Shutdown during upload, abandoning in-flight attempt");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }

        info!(
            last_uploaded_step = self.last_uploaded_step,
            "Checkpoint poll loop stopped"
        );
    }
}
