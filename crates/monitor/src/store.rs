//! Build a version store from configuration

use std::sync::Arc;

use storage::{LocalStorage, StorageBackend};
use sync_core::config::{StorageBackendConfig, StoreConfig};
use sync_core::Result;
use tracing::info;
use versioning::{ObjectVersionStore, VersionStoreHandle};

/// Open the configured backend and wrap it in the configured layout
pub async fn open_version_store(config: &StoreConfig) -> Result<VersionStoreHandle> {
    let backend = open_backend(&config.backend).await?;
    let store = ObjectVersionStore::new(backend, config.owner.clone(), config.strategy)?;
    info!(owner = %config.owner, strategy = %config.strategy, "Opened version store");
    Ok(store.into_handle())
}

async fn open_backend(config: &StorageBackendConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        StorageBackendConfig::Local { root } => {
            info!(root = %root.display(), "Using local storage backend");
            Ok(Arc::new(LocalStorage::new(root)))
        }
        #[cfg(feature = "s3")]
        StorageBackendConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            force_path_style,
        } => {
            info!(bucket = %bucket, "Using S3 storage backend");
            let s3 = storage::S3Storage::with_config(storage::S3Config {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                endpoint_url: endpoint.clone(),
                region: region.clone(),
                force_path_style: *force_path_style,
            })
            .await;
            Ok(Arc::new(s3))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackendConfig::S3 { .. } => Err(sync_core::Error::InvalidConfig {
            message: "S3 backend requested but monitor was built without the `s3` feature"
                .to_string(),
        }),
    }
}
