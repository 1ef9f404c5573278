use crate::artifact::ArtifactSet;
use crate::staging::StagingLayout;
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use hlsvault_core::naming;
use tokio::fs;

/// Local filesystem storage implementation
///
/// Serves artifacts straight from the directories the derivation pipeline
/// writes to, so storing is a no-op.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    layout: StagingLayout,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating the roots if needed.
    pub async fn new(layout: StagingLayout) -> StorageResult<Self> {
        layout.ensure_roots().await?;
        Ok(LocalStorage { layout })
    }

    pub fn staging(&self) -> &StagingLayout {
        &self.layout
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, name: &str) -> StorageResult<ByteStream> {
        let path = self.layout.path_for(name)?;
        let start = std::time::Instant::now();

        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            name = %name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage opened artifact"
        );

        let path_str = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    path = %path_str,
                    error = %e,
                    "Local storage stream read error"
                );
                StorageError::DownloadFailed(e.to_string())
            })
        });

        Ok(Box::pin(stream))
    }

    async fn store(&self, set: ArtifactSet) -> StorageResult<()> {
        // Files are already in place under the layout roots.
        tracing::debug!(
            video = %set.video_name(),
            artifacts = set.artifact_count(),
            "Local storage store is a no-op"
        );
        Ok(())
    }

    async fn remove(&self, video: &str) -> StorageResult<()> {
        let video = naming::video_stem(video)?;
        let start = std::time::Instant::now();

        let (existed, failures) = self.layout.purge(video).await;

        if !failures.is_empty() {
            tracing::error!(
                video = %video,
                failures = ?failures,
                "Local storage removal incomplete"
            );
            return Err(StorageError::PartialRemoval(failures));
        }

        if !existed {
            return Err(StorageError::NotFound(naming::video_file(video)));
        }

        tracing::info!(
            video = %video,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage removal successful"
        );

        Ok(())
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.layout.path_for(name)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
