//! Distributed storage backend
//!
//! Persists an artifact set to the object store and records every location
//! in the metadata repository. The two stores are kept consistent with a
//! compensating delete rather than a distributed transaction: blobs are
//! written first, rows last, and a failure at any step deletes the blobs of
//! the current attempt. Rows decide existence, so a leftover blob that the
//! compensation could not delete is unreachable.

use crate::artifact::{Artifact, ArtifactSet, Location};
use crate::metadata::{MetadataEntry, MetadataRepository};
use crate::object::ObjectStoreAdapter;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use hlsvault_core::naming;
use std::sync::Arc;
use uuid::Uuid;

pub struct DistributedStorage {
    objects: ObjectStoreAdapter,
    metadata: Arc<dyn MetadataRepository>,
}

impl DistributedStorage {
    pub fn new(objects: ObjectStoreAdapter, metadata: Arc<dyn MetadataRepository>) -> Self {
        DistributedStorage { objects, metadata }
    }

    fn entry_for(artifact: &Artifact, location: Location) -> MetadataEntry {
        MetadataEntry {
            name: artifact.name.clone(),
            owner: artifact.owner.clone(),
            kind: artifact.kind,
            size: artifact.size,
            location,
        }
    }

    /// Best-effort delete of every planned location. Failures are logged and
    /// not retried.
    async fn compensate(&self, video: &str, locations: &[Location]) {
        for location in locations {
            if let Err(e) = self.objects.delete(location).await {
                tracing::warn!(
                    video = %video,
                    location = %location,
                    error = %e,
                    "Compensating delete failed, blob left orphaned"
                );
            }
        }
        tracing::warn!(
            video = %video,
            blobs = locations.len(),
            "Rolled back partially stored artifact set"
        );
    }

    /// Write video, then manifest, then chunks. Returns the rows to record.
    async fn write_blobs(
        &self,
        set: ArtifactSet,
    ) -> StorageResult<(MetadataEntry, MetadataEntry, Vec<MetadataEntry>)> {
        let (video, manifest, chunks) = set.into_parts();

        let video_entry = Self::entry_for(&video, self.objects.location_of(&video));
        let manifest_entry = Self::entry_for(&manifest, self.objects.location_of(&manifest));
        let chunk_entries: Vec<_> = chunks
            .iter()
            .map(|c| Self::entry_for(c, self.objects.location_of(c)))
            .collect();

        self.objects.store(video).await?;
        self.objects.store(manifest).await?;
        self.objects.store_many(chunks).await?;

        Ok((video_entry, manifest_entry, chunk_entries))
    }
}

#[async_trait]
impl Storage for DistributedStorage {
    async fn get(&self, name: &str) -> StorageResult<ByteStream> {
        naming::classify(name)?;

        let location = self.metadata.read(name).await?;
        match self.objects.get(&location).await {
            Ok(stream) => Ok(stream),
            Err(StorageError::NotFound(_)) => {
                tracing::error!(
                    name = %name,
                    location = %location,
                    "Metadata references a missing blob"
                );
                Err(StorageError::Inconsistent(format!(
                    "{} is recorded at {} but the object is missing",
                    name, location
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn store(&self, set: ArtifactSet) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let upload_id = Uuid::new_v4();
        let video = set.video_name().to_string();
        let artifact_count = set.artifact_count();

        let set = set.scoped(&upload_id.to_string());
        let planned: Vec<Location> = set.iter().map(|a| self.objects.location_of(a)).collect();

        let (video_entry, manifest_entry, chunk_entries) = match self.write_blobs(set).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(
                    video = %video,
                    upload_id = %upload_id,
                    error = %e,
                    "Blob write failed"
                );
                self.compensate(&video, &planned).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .metadata
            .create_all(video_entry, manifest_entry, chunk_entries)
            .await
        {
            tracing::error!(
                video = %video,
                upload_id = %upload_id,
                error = %e,
                "Metadata write failed"
            );
            self.compensate(&video, &planned).await;
            return Err(e);
        }

        tracing::info!(
            video = %video,
            upload_id = %upload_id,
            artifacts = artifact_count,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored artifact set"
        );

        Ok(())
    }

    async fn remove(&self, video: &str) -> StorageResult<()> {
        let video = naming::video_stem(video)?;

        // Rows go first so the name stops resolving immediately.
        let locations = self.metadata.delete_all(video).await?;
        if locations.is_empty() {
            return Err(StorageError::NotFound(naming::video_file(video)));
        }

        let mut failed = 0usize;
        for location in &locations {
            if let Err(e) = self.objects.delete(location).await {
                failed += 1;
                tracing::warn!(
                    video = %video,
                    location = %location,
                    error = %e,
                    "Blob delete failed after metadata removal"
                );
            }
        }

        tracing::info!(
            video = %video,
            blobs = locations.len(),
            failed,
            "Removed artifact set"
        );

        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        naming::classify(name)?;

        let location = match self.metadata.read(name).await {
            Ok(location) => location,
            Err(StorageError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.objects.head(&location).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Distributed
    }
}
