#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Connector;
use crate::{
    BucketConnector, BucketNames, DistributedStorage, MetadataRepository, ObjectStoreAdapter,
    StagingLayout, Storage, StorageBackend, StorageError, StorageResult,
};
use hlsvault_core::Config;
use std::sync::Arc;

/// Create a storage backend based on configuration
///
/// `metadata` is required for the distributed backend and ignored otherwise.
pub async fn create_storage(
    config: &Config,
    metadata: Option<Arc<dyn MetadataRepository>>,
) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(StagingLayout::from_paths(config.local_paths())).await?;
            tracing::info!(
                video_path = %config.video_path().display(),
                manifest_path = %config.manifest_path().display(),
                chunk_path = %config.chunk_path().display(),
                "Using local storage backend"
            );
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageBackend::Distributed => {
            let metadata = metadata.ok_or_else(|| {
                StorageError::ConfigError(
                    "Distributed storage backend requires a metadata repository".to_string(),
                )
            })?;
            let object_config = config.object_store();
            let connector =
                S3Connector::new(object_config.region.clone(), object_config.endpoint.clone())
                    .await?;
            create_distributed(&connector, config, metadata).await
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::Distributed => Err(StorageError::ConfigError(
            "Distributed storage backend not available (storage-s3 feature not enabled)"
                .to_string(),
        )),
    }
}

/// Build the distributed backend on top of any bucket connector.
pub async fn create_distributed(
    connector: &dyn BucketConnector,
    config: &Config,
    metadata: Arc<dyn MetadataRepository>,
) -> StorageResult<Arc<dyn Storage>> {
    let object_config = config.object_store();
    let names = BucketNames::from_config(object_config);
    let objects = ObjectStoreAdapter::connect(connector, names.clone(), object_config.concurrency)
        .await?;

    tracing::info!(
        video_bucket = %names.video,
        manifest_bucket = %names.manifest,
        chunk_bucket = %names.chunk,
        endpoint = ?object_config.endpoint,
        "Using distributed storage backend"
    );

    Ok(Arc::new(DistributedStorage::new(objects, metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{InMemoryConnector, InMemoryMetadataRepository};
    use hlsvault_core::config::{AppConfig, LocalPaths};

    fn config_in(dir: &std::path::Path, backend: StorageBackend) -> Config {
        Config(Box::new(AppConfig {
            storage_backend: backend,
            local: LocalPaths {
                video_path: dir.join("videos"),
                manifest_path: dir.join("manifests"),
                chunk_path: dir.join("chunks"),
            },
            ..AppConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_create_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), StorageBackend::Local);

        let storage = create_storage(&config, None).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert!(dir.path().join("chunks").is_dir());
    }

    #[tokio::test]
    async fn test_distributed_requires_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), StorageBackend::Distributed);

        let result = create_storage(&config, None).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_create_distributed_provisions_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), StorageBackend::Distributed);
        let connector = InMemoryConnector::new();

        let storage = create_distributed(
            &connector,
            &config,
            Arc::new(InMemoryMetadataRepository::new()),
        )
        .await
        .unwrap();

        assert_eq!(storage.backend_type(), StorageBackend::Distributed);
        for bucket in ["videos", "manifests", "chunks"] {
            assert_eq!(connector.provision_count(bucket), 1);
        }
    }
}
