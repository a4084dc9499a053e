//! Local progress tracker
//!
//! The training process writes the latest completed step into a one-line
//! text file next to its `global_step_{n}` snapshot directories.

use std::path::{Path, PathBuf};

use sync_core::config::{MonitorConfig, DEFAULT_PROGRESS_FILE, DEFAULT_SNAPSHOT_PREFIX};
use sync_core::{Result, Step, STEP_UNSET};
use tracing::debug;

use crate::naming::Series;

/// Reads local training progress
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    input_path: PathBuf,
    progress_file: String,
    snapshot_prefix: String,
}

impl ProgressTracker {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            progress_file: DEFAULT_PROGRESS_FILE.to_string(),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            input_path: config.input_path.clone(),
            progress_file: config.progress_file.clone(),
            snapshot_prefix: config.snapshot_prefix.clone(),
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn progress_path(&self) -> PathBuf {
        self.input_path.join(&self.progress_file)
    }

    /// Latest completed step, or `STEP_UNSET` if the file is missing or unparseable
    pub async fn read_latest_step(&self) -> Step {
        let path = self.progress_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_step(&content).unwrap_or_else(|| {
                debug!(path = %path.display(), "Progress file is not an integer");
                STEP_UNSET
            }),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Progress file unreadable");
                STEP_UNSET
            }
        }
    }

    /// Directory holding the snapshot of `step`
    pub fn snapshot_dir(&self, step: Step) -> PathBuf {
        self.input_path
            .join(format!("{}{}", self.snapshot_prefix, step))
    }

    /// Series named after the input directory
    pub fn series(&self) -> Result<Series> {
        Series::from_path(&self.input_path)
    }
}

fn parse_step(content: &str) -> Option<Step> {
    content.trim().parse::<Step>().ok()
}
