//! Derivation pipeline: staged video -> segmenter -> storage.

use crate::error::PipelineError;
use crate::locks::NameLocks;
use crate::segmenter::{SegmentRequest, Segmenter};
use hlsvault_core::naming;
use hlsvault_core::{Config, StorageBackend};
use hlsvault_storage::{Artifact, ArtifactSet, ByteStream, StagingLayout, Storage, StorageError};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Target chunk duration handed to the segmenter.
    pub segment_seconds: u32,
    /// Upper bound on one segmenter run.
    pub deadline: Duration,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            segment_seconds: config.segment_time_secs(),
            deadline: config.derivation_timeout(),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            segment_seconds: hlsvault_core::config::SEGMENT_TIME_SECS,
            deadline: Duration::from_secs(hlsvault_core::config::DERIVATION_TIMEOUT_SECS),
        }
    }
}

/// Produces and persists the HLS artifacts of a video.
///
/// Source videos are staged under the local roots. In local mode those roots
/// are also what `LocalStorage` serves; in distributed mode the staged files
/// are dropped once the set has been handed to the backend.
pub struct DerivationPipeline {
    storage: Arc<dyn Storage>,
    segmenter: Arc<dyn Segmenter>,
    layout: StagingLayout,
    locks: NameLocks,
    options: PipelineOptions,
}

impl DerivationPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        segmenter: Arc<dyn Segmenter>,
        layout: StagingLayout,
        options: PipelineOptions,
    ) -> Self {
        Self {
            storage,
            segmenter,
            layout,
            locks: NameLocks::new(),
            options,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    pub fn locks(&self) -> &NameLocks {
        &self.locks
    }

    /// Return the manifest of `video`, deriving it first if needed.
    ///
    /// Only a manifest the backend does not know triggers a derivation; any
    /// other read failure, `Inconsistent` included, is returned as is.
    #[tracing::instrument(skip(self))]
    pub async fn manifest(&self, video: &str) -> Result<ByteStream, PipelineError> {
        let _guard = self.locks.acquire(video).await;
        let manifest = naming::manifest_file(video);

        match self.storage.get(&manifest).await {
            Ok(stream) => {
                tracing::info!(video = %video, "Serving cached manifest");
                return Ok(stream);
            }
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let source = self.layout.video_path(video);
        if !fs::try_exists(&source).await? {
            return Err(PipelineError::VideoNotFound(video.to_string()));
        }

        if let Err(e) = self.derive(video, &source).await {
            self.discard(video, None).await;
            return Err(e);
        }
        self.release_staging(video).await;

        Ok(self.storage.get(&manifest).await?)
    }

    /// Stage a new video from `reader` and derive its artifacts.
    ///
    /// The upload is written beside the video root under a name nothing
    /// serves, and only takes the video's name once its artifacts are stored.
    #[tracing::instrument(skip(self, reader))]
    pub async fn upload<R>(&self, video: &str, reader: &mut R) -> Result<(), PipelineError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let _guard = self.locks.acquire(video).await;
        let video_file = naming::video_file(video);

        if self.storage.exists(&video_file).await?
            || fs::try_exists(self.layout.video_path(video)).await?
        {
            return Err(PipelineError::DuplicateName(video_file));
        }

        self.layout.ensure_roots().await?;
        let upload = self.layout.upload_path(video);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&upload)
            .await?;

        let staged = async {
            let bytes = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;
        drop(file);

        match staged {
            Ok(bytes) => tracing::debug!(video = %video, bytes, "Staged upload"),
            Err(e) => {
                self.discard(video, Some(&upload)).await;
                return Err(e.into());
            }
        }

        if let Err(e) = self.derive(video, &upload).await {
            self.discard(video, Some(&upload)).await;
            return Err(e);
        }

        if self.storage.backend_type() == StorageBackend::Distributed {
            self.discard(video, Some(&upload)).await;
        } else if let Err(e) = fs::rename(&upload, self.layout.video_path(video)).await {
            tracing::error!(video = %video, error = %e, "Failed to publish staged upload");
            self.discard(video, Some(&upload)).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn derive(&self, video: &str, source: &Path) -> Result<(), PipelineError> {
        let start = Instant::now();
        fs::create_dir_all(self.layout.chunk_dir(video)).await?;

        let request = SegmentRequest {
            source: source.to_path_buf(),
            manifest: self.layout.manifest_path(video),
            chunk_template: self.layout.chunk_template(video),
            segment_seconds: self.options.segment_seconds,
        };

        let output = match tokio::time::timeout(
            self.options.deadline,
            self.segmenter.segment(&request),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!(video = %video, error = %e, "Failed to run segmenter");
                return Err(PipelineError::SegmentationFailed {
                    output: format!("Failed to run segmenter: {}", e),
                });
            }
            Err(_) => {
                tracing::warn!(
                    video = %video,
                    deadline_secs = self.options.deadline.as_secs(),
                    "Segmentation deadline exceeded"
                );
                return Err(PipelineError::DeadlineExceeded(self.options.deadline));
            }
        };

        if !output.success {
            tracing::error!(
                video = %video,
                exit_code = ?output.exit_code,
                output = %output.combined_output,
                "Segmentation failed"
            );
            return Err(PipelineError::SegmentationFailed {
                output: output.combined_output,
            });
        }

        if !fs::try_exists(&request.manifest).await? {
            return Err(PipelineError::SegmentationFailed {
                output: format!("No manifest was written\n{}", output.combined_output),
            });
        }

        let set = self.collect(video, source).await?;
        let artifact_count = set.artifact_count();
        self.storage.store(set).await?;

        tracing::info!(
            video = %video,
            artifacts = artifact_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Derived HLS artifacts"
        );
        Ok(())
    }

    async fn collect(&self, video: &str, source: &Path) -> Result<ArtifactSet, PipelineError> {
        let source = Artifact::open_as(naming::video_file(video), source).await?;
        let manifest = Artifact::open(&self.layout.manifest_path(video)).await?;

        let mut chunks = Vec::new();
        for path in self.layout.list_chunks(video).await? {
            chunks.push(Artifact::open(&path).await?);
        }

        Ok(ArtifactSet::new(source, manifest, chunks)?)
    }

    /// Remove the manifest and chunks an attempt left behind, plus the
    /// in-flight upload file if there is one. A published video is never
    /// touched here.
    async fn discard(&self, video: &str, upload: Option<&Path>) {
        let (_, mut failures) = self.layout.purge_derived(video).await;
        if let Some(path) = upload {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{}: {}", path.display(), e)),
            }
        }
        for failure in failures {
            tracing::warn!(video = %video, error = %failure, "Failed to clean up staged file");
        }
    }

    /// In distributed mode the backend holds everything once stored, so the
    /// staged copies go.
    async fn release_staging(&self, video: &str) {
        if self.storage.backend_type() == StorageBackend::Distributed {
            let (_, failures) = self.layout.purge(video).await;
            for failure in failures {
                tracing::warn!(video = %video, error = %failure, "Failed to clean up staged file");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::segmenter::SegmentOutput;
    use async_trait::async_trait;
    use hlsvault_storage::test_helpers::{collect, InMemoryConnector, InMemoryMetadataRepository};
    use hlsvault_storage::{
        BucketNames, DistributedStorage, LocalStorage, MetadataRepository, ObjectStoreAdapter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a manifest and `chunks` chunk files derived from the source bytes.
    pub(crate) struct FakeSegmenter {
        chunks: u32,
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    impl FakeSegmenter {
        pub(crate) fn new(chunks: u32) -> Self {
            Self {
                chunks,
                calls: AtomicUsize::new(0),
                fail: false,
                delay: None,
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0)
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(1)
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Segmenter for FakeSegmenter {
        async fn segment(&self, request: &SegmentRequest) -> std::io::Result<SegmentOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let source = fs::read(&request.source).await?;
            let template = request.chunk_template.to_string_lossy().to_string();
            let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

            for i in 0..self.chunks {
                let chunk = template.replace("%04d", &format!("{:04}", i));
                fs::write(&chunk, [source.as_slice(), &[i as u8]].concat()).await?;
                playlist.push_str("#EXTINF:4.0,\n");
                if let Some(name) = std::path::Path::new(&chunk).file_name() {
                    playlist.push_str(&name.to_string_lossy());
                    playlist.push('\n');
                }
            }

            if self.fail {
                // Leave partial output behind like a crashed ffmpeg would.
                fs::write(&request.manifest, "#EXTM3U\n").await?;
                return Ok(SegmentOutput {
                    success: false,
                    exit_code: Some(1),
                    combined_output: "Invalid data found when processing input".to_string(),
                });
            }

            playlist.push_str("#EXT-X-ENDLIST\n");
            fs::write(&request.manifest, playlist).await?;
            Ok(SegmentOutput {
                success: true,
                exit_code: Some(0),
                combined_output: String::new(),
            })
        }
    }

    pub(crate) async fn local_pipeline(dir: &TempDir, segmenter: Arc<FakeSegmenter>) -> DerivationPipeline {
        let layout = StagingLayout::under(dir.path());
        let storage = LocalStorage::new(layout.clone()).await.unwrap();
        DerivationPipeline::new(
            Arc::new(storage),
            segmenter,
            layout,
            PipelineOptions::default(),
        )
    }

    struct Distributed {
        pipeline: DerivationPipeline,
        connector: InMemoryConnector,
        metadata: Arc<InMemoryMetadataRepository>,
    }

    async fn distributed_pipeline(dir: &TempDir, segmenter: Arc<FakeSegmenter>) -> Distributed {
        let connector = InMemoryConnector::new();
        let names = BucketNames {
            video: "videos".to_string(),
            manifest: "manifests".to_string(),
            chunk: "chunks".to_string(),
        };
        let objects = ObjectStoreAdapter::connect(&connector, names, 4).await.unwrap();
        let metadata = Arc::new(InMemoryMetadataRepository::new());
        let storage = DistributedStorage::new(objects, metadata.clone());
        Distributed {
            pipeline: DerivationPipeline::new(
                Arc::new(storage),
                segmenter,
                StagingLayout::under(dir.path()),
                PipelineOptions::default(),
            ),
            connector,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_local_upload_then_serve() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::new(3));
        let pipeline = local_pipeline(&dir, segmenter.clone()).await;

        pipeline.upload("alpha", &mut &b"movie"[..]).await.unwrap();

        let storage = pipeline.storage();
        assert_eq!(collect(storage.get("alpha.mp4").await.unwrap()).await.unwrap(), b"movie");
        assert_eq!(
            collect(storage.get("alpha_0002.ts").await.unwrap()).await.unwrap(),
            b"movie\x02"
        );
        let manifest = collect(pipeline.manifest("alpha").await.unwrap()).await.unwrap();
        assert!(String::from_utf8(manifest).unwrap().contains("alpha_0001.ts"));
        assert_eq!(segmenter.calls(), 1);
    }

    #[tokio::test]
    async fn test_manifest_derives_once() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::new(2));
        let pipeline = local_pipeline(&dir, segmenter.clone()).await;
        fs::write(pipeline.layout().video_path("alpha"), b"movie").await.unwrap();

        let first = collect(pipeline.manifest("alpha").await.unwrap()).await.unwrap();
        let second = collect(pipeline.manifest("alpha").await.unwrap()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(segmenter.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_manifest_requests_share_one_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::slow(Duration::from_millis(50)));
        let pipeline = Arc::new(local_pipeline(&dir, segmenter.clone()).await);
        fs::write(pipeline.layout().video_path("alpha"), b"movie").await.unwrap();

        let requests: Vec<_> = (0..4)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    collect(pipeline.manifest("alpha").await.unwrap()).await.unwrap()
                })
            })
            .collect();
        for request in requests {
            request.await.unwrap();
        }

        assert_eq!(segmenter.calls(), 1);
        assert_eq!(pipeline.locks().active(), 0);
    }

    #[tokio::test]
    async fn test_manifest_for_unknown_video() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = local_pipeline(&dir, Arc::new(FakeSegmenter::new(1))).await;

        assert!(matches!(
            pipeline.manifest("ghost").await,
            Err(PipelineError::VideoNotFound(name)) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_upload_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::new(1));
        let pipeline = local_pipeline(&dir, segmenter.clone()).await;

        pipeline.upload("alpha", &mut &b"first"[..]).await.unwrap();
        let second = pipeline.upload("alpha", &mut &b"second"[..]).await;

        assert!(matches!(second, Err(PipelineError::DuplicateName(_))));
        let video = collect(pipeline.storage().get("alpha.mp4").await.unwrap())
            .await
            .unwrap();
        assert_eq!(video, b"first");
        assert_eq!(segmenter.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_segmentation_cleans_upload() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = local_pipeline(&dir, Arc::new(FakeSegmenter::failing())).await;

        let result = pipeline.upload("alpha", &mut &b"garbage"[..]).await;

        match result {
            Err(PipelineError::SegmentationFailed { output }) => {
                assert!(output.contains("Invalid data"))
            }
            other => panic!("expected SegmentationFailed, got {other:?}"),
        }
        let layout = pipeline.layout();
        assert!(!layout.video_path("alpha").exists());
        assert!(!layout.upload_path("alpha").exists());
        assert!(!layout.manifest_path("alpha").exists());
        assert!(!layout.chunk_dir("alpha").exists());
        assert!(!pipeline.storage().exists("alpha.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_is_not_served_until_derived() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::slow(Duration::from_millis(200)));
        let pipeline = Arc::new(local_pipeline(&dir, segmenter.clone()).await);

        let upload = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.upload("alpha", &mut &b"movie"[..]).await })
        };
        while segmenter.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(matches!(
            pipeline.storage().get("alpha.mp4").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(pipeline.layout().upload_path("alpha").exists());

        upload.await.unwrap().unwrap();

        let video = collect(pipeline.storage().get("alpha.mp4").await.unwrap())
            .await
            .unwrap();
        assert_eq!(video, b"movie");
        assert!(!pipeline.layout().upload_path("alpha").exists());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_one_name() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::slow(Duration::from_millis(50)));
        let pipeline = Arc::new(local_pipeline(&dir, segmenter.clone()).await);

        let uploads: Vec<_> = [&b"first"[..], &b"second"[..]]
            .into_iter()
            .map(|payload: &'static [u8]| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let mut reader = payload;
                    (payload, pipeline.upload("alpha", &mut reader).await)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for upload in uploads {
            match upload.await.unwrap() {
                (payload, Ok(())) => winners.push(payload),
                (_, Err(PipelineError::DuplicateName(name))) => assert_eq!(name, "alpha.mp4"),
                (_, Err(e)) => panic!("unexpected upload error: {e:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(segmenter.calls(), 1);
        let video = collect(pipeline.storage().get("alpha.mp4").await.unwrap())
            .await
            .unwrap();
        assert_eq!(video, winners[0]);
        assert_eq!(pipeline.locks().active(), 0);
    }

    #[tokio::test]
    async fn test_failed_manifest_keeps_source_video() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = local_pipeline(&dir, Arc::new(FakeSegmenter::failing())).await;
        fs::write(pipeline.layout().video_path("alpha"), b"movie").await.unwrap();

        assert!(matches!(
            pipeline.manifest("alpha").await,
            Err(PipelineError::SegmentationFailed { .. })
        ));
        assert!(pipeline.layout().video_path("alpha").exists());
        assert!(!pipeline.layout().manifest_path("alpha").exists());
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StagingLayout::under(dir.path());
        let storage = LocalStorage::new(layout.clone()).await.unwrap();
        let pipeline = DerivationPipeline::new(
            Arc::new(storage),
            Arc::new(FakeSegmenter::slow(Duration::from_secs(5))),
            layout,
            PipelineOptions {
                segment_seconds: 4,
                deadline: Duration::from_millis(20),
            },
        );

        let result = pipeline.upload("alpha", &mut &b"movie"[..]).await;

        assert!(matches!(result, Err(PipelineError::DeadlineExceeded(_))));
        assert!(!pipeline.layout().video_path("alpha").exists());
        assert!(!pipeline.layout().upload_path("alpha").exists());
    }

    #[tokio::test]
    async fn test_distributed_upload_moves_everything_to_object_store() {
        let dir = tempfile::tempdir().unwrap();
        let env = distributed_pipeline(&dir, Arc::new(FakeSegmenter::new(2))).await;

        env.pipeline.upload("alpha", &mut &b"movie"[..]).await.unwrap();

        assert_eq!(env.metadata.row_count(), 4);
        assert_eq!(env.connector.object_count().await, 4);
        let layout = env.pipeline.layout();
        assert!(!layout.video_path("alpha").exists());
        assert!(!layout.upload_path("alpha").exists());
        assert!(!layout.chunk_dir("alpha").exists());

        let chunk = collect(env.pipeline.storage().get("alpha_0001.ts").await.unwrap())
            .await
            .unwrap();
        assert_eq!(chunk, b"movie\x01");
        let manifest = collect(env.pipeline.manifest("alpha").await.unwrap())
            .await
            .unwrap();
        assert!(manifest.starts_with(b"#EXTM3U"));
    }

    #[tokio::test]
    async fn test_distributed_manifest_with_missing_blob_is_inconsistent() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(FakeSegmenter::new(2));
        let env = distributed_pipeline(&dir, segmenter.clone()).await;
        env.pipeline.upload("alpha", &mut &b"movie"[..]).await.unwrap();

        let location = env.metadata.read("alpha.m3u8").await.unwrap();
        env.connector.remove_object(&location).await;

        assert!(matches!(
            env.pipeline.manifest("alpha").await,
            Err(PipelineError::Storage(StorageError::Inconsistent(_)))
        ));
        assert_eq!(segmenter.calls(), 1);
    }

    #[tokio::test]
    async fn test_distributed_metadata_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let env = distributed_pipeline(&dir, Arc::new(FakeSegmenter::new(2))).await;
        env.metadata.fail_create_all(true);

        let result = env.pipeline.upload("alpha", &mut &b"movie"[..]).await;

        assert!(matches!(
            result,
            Err(PipelineError::Storage(StorageError::Unavailable(_)))
        ));
        assert_eq!(env.connector.object_count().await, 0);
        assert!(!env.pipeline.storage().exists("alpha.mp4").await.unwrap());
        assert!(!env.pipeline.layout().video_path("alpha").exists());
    }

    #[tokio::test]
    async fn test_distributed_duplicate_upload() {
        let dir = tempfile::tempdir().unwrap();
        let env = distributed_pipeline(&dir, Arc::new(FakeSegmenter::new(1))).await;

        env.pipeline.upload("alpha", &mut &b"first"[..]).await.unwrap();
        let second = env.pipeline.upload("alpha", &mut &b"second"[..]).await;

        assert!(matches!(second, Err(PipelineError::DuplicateName(_))));
        let video = collect(env.pipeline.storage().get("alpha.mp4").await.unwrap())
            .await
            .unwrap();
        assert_eq!(video, b"first");
    }
}
