//! Artifacts and artifact sets

use crate::traits::{StorageError, StorageResult};
use bytes::Bytes;
use hlsvault_core::naming::{self, ArtifactKind};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Readable artifact body, consumed once.
pub type Payload = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// One named binary payload.
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    /// Video this artifact belongs to.
    pub owner: String,
    pub size: u64,
    /// Key the payload is written under in an object store. Defaults to `name`.
    pub object_key: String,
    pub payload: Payload,
}

impl Artifact {
    pub fn new(name: impl Into<String>, size: u64, payload: Payload) -> StorageResult<Self> {
        let name = name.into();
        let classified = naming::classify(&name)?;
        Ok(Artifact {
            object_key: name.clone(),
            name,
            kind: classified.kind,
            owner: classified.owner,
            size,
            payload,
        })
    }

    /// Artifact backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> StorageResult<Self> {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self::new(name, size, Box::pin(Cursor::new(data)))
    }

    /// Open a file on disk as an artifact named after the file.
    pub async fn open(path: &Path) -> StorageResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::InvalidName(path.display().to_string()))?
            .to_string();
        Self::open_as(name, path).await
    }

    /// Open a file on disk as the artifact `name`, whatever the file is called.
    pub async fn open_as(name: impl Into<String>, path: &Path) -> StorageResult<Self> {
        let name = name.into();
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.clone())
            } else {
                StorageError::IoError(e)
            }
        })?;
        let size = file.metadata().await?.len();

        Self::new(name, size, Box::pin(file))
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("size", &self.size)
            .field("object_key", &self.object_key)
            .finish_non_exhaustive()
    }
}

/// Where one artifact's bytes live in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// A video together with its manifest and chunks.
///
/// Construction checks that every artifact has the kind of its slot and
/// belongs to the same video. Chunks are kept sorted by name, which is also
/// play order.
#[derive(Debug)]
pub struct ArtifactSet {
    video: Artifact,
    manifest: Artifact,
    chunks: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn new(video: Artifact, manifest: Artifact, mut chunks: Vec<Artifact>) -> StorageResult<Self> {
        if video.kind != ArtifactKind::Video {
            return Err(StorageError::InvalidName(format!(
                "{} is not a video",
                video.name
            )));
        }
        if manifest.kind != ArtifactKind::Manifest || manifest.owner != video.owner {
            return Err(StorageError::InvalidName(format!(
                "{} is not the manifest of {}",
                manifest.name, video.name
            )));
        }
        if let Some(stray) = chunks
            .iter()
            .find(|c| c.kind != ArtifactKind::Chunk || c.owner != video.owner)
        {
            return Err(StorageError::InvalidName(format!(
                "{} is not a chunk of {}",
                stray.name, video.name
            )));
        }

        chunks.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ArtifactSet {
            video,
            manifest,
            chunks,
        })
    }

    /// Name of the video, without extension.
    pub fn video_name(&self) -> &str {
        &self.video.owner
    }

    pub fn video(&self) -> &Artifact {
        &self.video
    }

    pub fn manifest(&self) -> &Artifact {
        &self.manifest
    }

    pub fn chunks(&self) -> &[Artifact] {
        &self.chunks
    }

    /// Number of artifacts in the set, video and manifest included.
    pub fn artifact_count(&self) -> usize {
        self.chunks.len() + 2
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.video)
            .chain(std::iter::once(&self.manifest))
            .chain(self.chunks.iter())
    }

    /// Prefix every object key with `prefix/`.
    pub fn scoped(mut self, prefix: &str) -> Self {
        for artifact in std::iter::once(&mut self.video)
            .chain(std::iter::once(&mut self.manifest))
            .chain(self.chunks.iter_mut())
        {
            artifact.object_key = format!("{}/{}", prefix, artifact.name);
        }
        self
    }

    pub fn into_parts(self) -> (Artifact, Artifact, Vec<Artifact>) {
        (self.video, self.manifest, self.chunks)
    }
}
