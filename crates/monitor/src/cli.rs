//! Command-line arguments shared by the binaries
//!
//! Values come from an optional TOML file first; any flag given on the
//! command line overrides the file.

use std::path::PathBuf;

use clap::Args;
use sync_core::config::StorageBackendConfig;
use sync_core::{LayoutStrategy, Result, SyncConfig};

/// Where the version store lives
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Namespace owning the version containers
    #[arg(long)]
    pub owner: Option<String>,

    /// Version container layout (branches or containers)
    #[arg(long)]
    pub strategy: Option<LayoutStrategy>,

    /// Root directory of a filesystem store
    #[arg(long, conflicts_with = "s3_bucket")]
    pub store_root: Option<PathBuf>,

    /// S3 bucket holding the store
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, requires = "s3_bucket")]
    pub s3_prefix: Option<String>,

    #[arg(long, requires = "s3_bucket")]
    pub s3_region: Option<String>,

    /// Custom endpoint (MinIO, LocalStack)
    #[arg(long, requires = "s3_bucket")]
    pub s3_endpoint: Option<String>,

    #[arg(long, requires = "s3_bucket")]
    pub s3_force_path_style: bool,
}

impl StoreArgs {
    /// Load the configuration file (if any) and apply the store flags
    pub fn load(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_toml_file(path)?,
            None => SyncConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut SyncConfig) {
        if let Some(owner) = &self.owner {
            config.store.owner = owner.clone();
        }
        if let Some(strategy) = self.strategy {
            config.store.strategy = strategy;
        }
        if let Some(root) = &self.store_root {
            config.store.backend = StorageBackendConfig::Local { root: root.clone() };
        }
        if let Some(bucket) = &self.s3_bucket {
            config.store.backend = StorageBackendConfig::S3 {
                bucket: bucket.clone(),
                prefix: self.s3_prefix.clone(),
                region: self.s3_region.clone(),
                endpoint: self.s3_endpoint.clone(),
                force_path_style: self.s3_force_path_style,
            };
        }
    }
}
