//! Object store adapter
//!
//! Thin blob interface over `object_store`, with one bucket per artifact kind.
//! Bucket selection goes through the naming rules via `Artifact::kind`.

use crate::artifact::{Artifact, Location};
use crate::traits::{ByteStream, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use hlsvault_core::config::ObjectStoreConfig;
use hlsvault_core::ArtifactKind;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Opens (and provisions) the buckets an adapter writes to.
#[async_trait]
pub trait BucketConnector: Send + Sync {
    /// Make sure `bucket` exists. A bucket that already exists is success.
    async fn provision(&self, bucket: &str) -> StorageResult<()>;

    /// Object store handle scoped to `bucket`.
    fn open(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>>;
}

/// Bucket per artifact kind. Several kinds may share one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    pub video: String,
    pub manifest: String,
    pub chunk: String,
}

impl BucketNames {
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        BucketNames {
            video: config.video_bucket.clone(),
            manifest: config.manifest_bucket.clone(),
            chunk: config.chunk_bucket.clone(),
        }
    }

    pub fn for_kind(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Video => &self.video,
            ArtifactKind::Manifest => &self.manifest,
            ArtifactKind::Chunk => &self.chunk,
        }
    }
}

pub struct ObjectStoreAdapter {
    names: BucketNames,
    stores: HashMap<String, Arc<dyn ObjectStore>>,
    concurrency: usize,
}

impl ObjectStoreAdapter {
    /// Provision and open every bucket in `names`.
    ///
    /// `concurrency` bounds the number of in-flight writes in `store_many`.
    pub async fn connect(
        connector: &dyn BucketConnector,
        names: BucketNames,
        concurrency: usize,
    ) -> StorageResult<Self> {
        let mut stores: HashMap<String, Arc<dyn ObjectStore>> = HashMap::new();
        for bucket in [&names.video, &names.manifest, &names.chunk] {
            if stores.contains_key(bucket.as_str()) {
                continue;
            }
            connector.provision(bucket).await?;
            stores.insert(bucket.clone(), connector.open(bucket)?);
        }

        Ok(ObjectStoreAdapter {
            names,
            stores,
            concurrency: concurrency.max(1),
        })
    }

    pub fn buckets(&self) -> &BucketNames {
        &self.names
    }

    fn store_for(&self, bucket: &str) -> StorageResult<&Arc<dyn ObjectStore>> {
        self.stores
            .get(bucket)
            .ok_or_else(|| StorageError::ConfigError(format!("Unknown bucket: {}", bucket)))
    }

    /// Location `store` would write `artifact` to.
    pub fn location_of(&self, artifact: &Artifact) -> Location {
        Location {
            bucket: self.names.for_kind(artifact.kind).to_string(),
            key: artifact.object_key.clone(),
        }
    }

    /// Write one artifact. Overwrites any object under the same key.
    pub async fn store(&self, mut artifact: Artifact) -> StorageResult<Location> {
        let location = self.location_of(&artifact);
        let store = self.store_for(&location.bucket)?;
        let start = std::time::Instant::now();

        let mut buffer = Vec::with_capacity(artifact.size as usize);
        artifact
            .payload
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", artifact.name, e)))?;

        if buffer.len() as u64 != artifact.size {
            return Err(StorageError::UploadFailed(format!(
                "{}: expected {} bytes, read {}",
                artifact.name,
                artifact.size,
                buffer.len()
            )));
        }

        let size = buffer.len();
        let result: ObjectResult<_> = store
            .put(
                &Path::from(location.key.as_str()),
                PutPayload::from(Bytes::from(buffer)),
            )
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %location.bucket,
                key = %location.key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store upload failed"
            );
            map_object_error(e, &location)
        })?;

        tracing::debug!(
            bucket = %location.bucket,
            key = %location.key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store upload successful"
        );

        Ok(location)
    }

    /// Write several artifacts with bounded concurrency.
    ///
    /// Result `i` is the location of input `i`. The first failure drops the
    /// writes still in flight and is returned.
    pub async fn store_many(&self, artifacts: Vec<Artifact>) -> StorageResult<Vec<Location>> {
        futures::stream::iter(artifacts)
            .map(|artifact| self.store(artifact))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    pub async fn get(&self, location: &Location) -> StorageResult<ByteStream> {
        let store = self.store_for(&location.bucket)?;
        let result: ObjectResult<_> = store.get(&Path::from(location.key.as_str())).await;
        let result = result.map_err(|e| map_object_error(e, location))?;

        let shown = location.to_string();
        let stream = result.into_stream().map(move |item| {
            item.map_err(|e| {
                tracing::error!(location = %shown, error = %e, "Object store stream error");
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    /// Whether an object exists at `location`.
    pub async fn head(&self, location: &Location) -> StorageResult<bool> {
        let store = self.store_for(&location.bucket)?;
        match store.head(&Path::from(location.key.as_str())).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_object_error(e, location)),
        }
    }

    /// Delete the object at `location`. A missing object is not an error.
    pub async fn delete(&self, location: &Location) -> StorageResult<()> {
        let store = self.store_for(&location.bucket)?;
        match store.delete(&Path::from(location.key.as_str())).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_object_error(e, location)),
        }
    }
}

fn map_object_error(err: ObjectStoreError, location: &Location) -> StorageError {
    match err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(location.to_string()),
        err @ ObjectStoreError::Generic { .. } => StorageError::Unavailable(err.to_string()),
        other => StorageError::BackendError(other.to_string()),
    }
}
