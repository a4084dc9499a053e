//! Completion marker contract
//!
//! A version is complete iff `finish_check.txt` exists at its root. The body
//! is informational only and never parsed.

use chrono::{DateTime, SecondsFormat, Utc};
use sync_core::Step;

/// File whose presence marks a version as fully uploaded
pub const COMPLETION_MARKER: &str = "finish_check.txt";

/// Copy of the local progress scalar stored at the container root
pub const PROGRESS_FILE: &str = sync_core::config::DEFAULT_PROGRESS_FILE;

/// Advisory content of the completion marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMarker {
    pub completed_at: DateTime<Utc>,
    pub step: Step,
}

impl CompletionMarker {
    pub fn new(completed_at: DateTime<Utc>, step: Step) -> Self {
        Self { completed_at, step }
    }

    /// Human-readable body written to the marker file
    pub fn render(&self) -> String {
        format!(
            "Checkpoint upload completed at {}\nStep: {}\n",
            self.completed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.step
        )
    }

    /// The validity test: is the marker among a container's root-relative file paths?
    pub fn is_present<S: AsRef<str>>(files: &[S]) -> bool {
        files.iter().any(|f| f.as_ref() == COMPLETION_MARKER)
    }
}
