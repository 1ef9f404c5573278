//! HlsService - the operations exposed to the HTTP layer.

use crate::error::PipelineError;
use crate::pipeline::{DerivationPipeline, PipelineOptions};
use crate::segmenter::Segmenter;
use hlsvault_core::naming::{self, ArtifactKind};
use hlsvault_core::Config;
use hlsvault_storage::{ByteStream, StagingLayout, Storage, StorageError};
use std::sync::Arc;
use tokio::io::AsyncRead;

#[derive(Clone)]
pub struct HlsService {
    pipeline: Arc<DerivationPipeline>,
}

impl HlsService {
    pub fn new(pipeline: DerivationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Wire a pipeline over `storage` using the local roots of `config` for
    /// staging.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        Self::new(DerivationPipeline::new(
            storage,
            segmenter,
            StagingLayout::from_paths(config.local_paths()),
            PipelineOptions::from_config(config),
        ))
    }

    pub fn pipeline(&self) -> &DerivationPipeline {
        &self.pipeline
    }

    /// Store a new video under `name` (`alpha` or `alpha.mp4`).
    pub async fn upload<R>(&self, name: &str, reader: &mut R) -> Result<(), PipelineError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let video = naming::video_stem(name).map_err(StorageError::from)?;
        self.pipeline.upload(video, reader).await
    }

    /// Open any artifact by filename. Manifests are derived on first request.
    pub async fn serve(&self, filename: &str) -> Result<ByteStream, PipelineError> {
        let classified = naming::classify(filename).map_err(StorageError::from)?;
        match classified.kind {
            ArtifactKind::Manifest => self.pipeline.manifest(&classified.owner).await,
            ArtifactKind::Video | ArtifactKind::Chunk => {
                Ok(self.pipeline.storage().get(filename).await?)
            }
        }
    }

    /// Remove a video and everything derived from it.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, name: &str) -> Result<(), PipelineError> {
        let video = naming::video_stem(name).map_err(StorageError::from)?;
        let _guard = self.pipeline.locks().acquire(video).await;
        self.pipeline.storage().remove(video).await?;
        tracing::info!(video = %video, "Removed video and derived artifacts");
        Ok(())
    }
}
