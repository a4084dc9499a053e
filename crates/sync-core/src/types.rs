//! Core type definitions shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;

/// Training step as recorded in the local progress file
pub type Step = i64;

/// Sentinel for "no progress recorded yet"
pub const STEP_UNSET: Step = -1;

/// Representation used for one version of a snapshot series
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStrategy {
    /// One persistent container per series, one branch per version
    Branches,

    /// One dedicated container per version, named `{series}-{version}`
    #[default]
    Containers,
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutStrategy::Branches => f.write_str("branches"),
            LayoutStrategy::Containers => f.write_str("containers"),
        }
    }
}

impl std::str::FromStr for LayoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "branches" | "branch" => Ok(LayoutStrategy::Branches),
            "containers" | "container" => Ok(LayoutStrategy::Containers),
            other => Err(format!("unknown layout strategy: {other}")),
        }
    }
}

/// Totals for a bulk transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    /// Number of files moved
    pub files: usize,

    /// Number of bytes moved
    pub bytes: u64,
}

impl TransferSummary {
    /// Account for one transferred file
    pub fn record(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: TransferSummary) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}
