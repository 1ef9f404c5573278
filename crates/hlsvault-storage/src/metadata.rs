//! Metadata repository port
//!
//! The repository records where every artifact of a distributed upload lives.
//! It is the source of truth for existence: an artifact without a row is not
//! addressable even if its blob is still in the object store.

use crate::artifact::Location;
use crate::traits::StorageResult;
use async_trait::async_trait;
use hlsvault_core::ArtifactKind;

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub name: String,
    /// Video the artifact belongs to, without extension.
    pub owner: String,
    pub kind: ArtifactKind,
    pub size: u64,
    pub location: Location,
}

#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Insert the rows of one artifact set in a single transaction.
    ///
    /// Either all rows become visible or none do. A name that already exists
    /// fails with `StorageError::DuplicateName`.
    async fn create_all(
        &self,
        video: MetadataEntry,
        manifest: MetadataEntry,
        chunks: Vec<MetadataEntry>,
    ) -> StorageResult<()>;

    /// Point lookup by artifact name.
    async fn read(&self, name: &str) -> StorageResult<Location>;

    /// Delete one row and return the location it pointed at.
    async fn delete(&self, name: &str) -> StorageResult<Location>;

    /// Delete every row owned by `video` and return their locations.
    ///
    /// An empty result means the video was unknown.
    async fn delete_all(&self, video: &str) -> StorageResult<Vec<Location>>;
}
