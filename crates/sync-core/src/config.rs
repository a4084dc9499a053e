//! Synchronisation configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, LayoutStrategy, Result};

/// Name of the progress scalar written by the training process
pub const DEFAULT_PROGRESS_FILE: &str = "latest_checkpointed_iteration.txt";

/// Folder prefix of per-step snapshot directories
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "global_step_";

/// Main synchronisation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote store settings
    pub store: StoreConfig,

    /// Poll loop settings
    pub monitor: MonitorConfig,

    /// Restore bootstrap settings
    pub restore: RestoreConfig,
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&body)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(body: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(body)?;
        Ok(config)
    }

    /// Reject configurations the protocol cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.store.owner.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "store.owner must not be empty".to_string(),
            });
        }

        if let StorageBackendConfig::S3 { bucket, .. } = &self.store.backend {
            if bucket.trim().is_empty() {
                return Err(Error::InvalidConfig {
                    message: "store.backend.bucket must not be empty".to_string(),
                });
            }
        }

        if self.monitor.progress_file.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "monitor.progress_file must not be empty".to_string(),
            });
        }

        if self.monitor.poll_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "monitor.poll_interval must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace owning every container (user or organisation)
    pub owner: String,

    /// Version container representation
    pub strategy: LayoutStrategy,

    /// Object backend holding the containers
    pub backend: StorageBackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            owner: "default".to_string(),
            strategy: LayoutStrategy::default(),
            backend: StorageBackendConfig::default(),
        }
    }
}

/// Storage backend type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackendConfig {
    /// Local filesystem (a mounted share or a test directory)
    Local { root: PathBuf },

    /// S3-compatible storage
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageBackendConfig {
    fn default() -> Self {
        StorageBackendConfig::Local {
            root: PathBuf::from("./snapshot-store"),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Directory the training process writes snapshots into
    pub input_path: PathBuf,

    /// Delay between progress checks
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    /// Number of valid versions kept per series
    pub keep_count: usize,

    /// Incomplete versions younger than this are not swept
    #[serde(with = "duration_ms")]
    pub incomplete_grace: Duration,

    /// File holding the latest completed step
    pub progress_file: String,

    /// Prefix of the per-step snapshot folders
    pub snapshot_prefix: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("."),
            poll_interval: Duration::from_secs(60),
            keep_count: 3,
            incomplete_grace: Duration::ZERO,
            progress_file: DEFAULT_PROGRESS_FILE.to_string(),
            snapshot_prefix: DEFAULT_SNAPSHOT_PREFIX.to_string(),
        }
    }
}

/// Restore bootstrap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Replace an existing local directory
    pub force: bool,

    /// Exact container or branch to restore, bypassing discovery
    pub version: Option<String>,
}

/// Duration serialization helper (milliseconds on the wire)
mod duration_ms {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
