//! On-disk layout of derived artifacts
//!
//! ```text
//! <video_root>/<name>.mp4
//! <manifest_root>/<name>.m3u8
//! <chunk_root>/<name>/<name>_0000.ts
//! ```

use crate::traits::{StorageError, StorageResult};
use hlsvault_core::config::LocalPaths;
use hlsvault_core::naming::{self, ArtifactKind};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    video_root: PathBuf,
    manifest_root: PathBuf,
    chunk_root: PathBuf,
}

impl StagingLayout {
    pub fn new(
        video_root: impl Into<PathBuf>,
        manifest_root: impl Into<PathBuf>,
        chunk_root: impl Into<PathBuf>,
    ) -> Self {
        StagingLayout {
            video_root: video_root.into(),
            manifest_root: manifest_root.into(),
            chunk_root: chunk_root.into(),
        }
    }

    /// All three roots under one base directory.
    pub fn under(base: &Path) -> Self {
        Self::new(base.join("videos"), base.join("manifests"), base.join("chunks"))
    }

    pub fn from_paths(paths: &LocalPaths) -> Self {
        Self::new(&paths.video_path, &paths.manifest_path, &paths.chunk_path)
    }

    /// Create the three root directories if they are missing.
    pub async fn ensure_roots(&self) -> StorageResult<()> {
        for root in [&self.video_root, &self.manifest_root, &self.chunk_root] {
            fs::create_dir_all(root).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub fn video_path(&self, video: &str) -> PathBuf {
        self.video_root.join(naming::video_file(video))
    }

    /// Where an upload is written while it is derived. The leading dot and
    /// `.part` suffix keep it out of reach of `path_for`.
    pub fn upload_path(&self, video: &str) -> PathBuf {
        self.video_root
            .join(format!(".{}.part", naming::video_file(video)))
    }

    pub fn manifest_path(&self, video: &str) -> PathBuf {
        self.manifest_root.join(naming::manifest_file(video))
    }

    pub fn chunk_dir(&self, video: &str) -> PathBuf {
        self.chunk_root.join(video)
    }

    /// Segment filename pattern (ffmpeg printf syntax) inside the chunk dir.
    pub fn chunk_template(&self, video: &str) -> PathBuf {
        self.chunk_dir(video).join(naming::chunk_template(video))
    }

    /// Resolve any artifact filename to its path.
    ///
    /// Names are validated by the naming rules first, so the result never
    /// escapes the roots.
    pub fn path_for(&self, name: &str) -> StorageResult<PathBuf> {
        let classified = naming::classify(name)?;
        Ok(match classified.kind {
            ArtifactKind::Video => self.video_root.join(name),
            ArtifactKind::Manifest => self.manifest_root.join(name),
            ArtifactKind::Chunk => self.chunk_dir(&classified.owner).join(name),
        })
    }

    /// Chunk files written for `video`, sorted by name.
    pub async fn list_chunks(&self, video: &str) -> StorageResult<Vec<PathBuf>> {
        let dir = self.chunk_dir(video);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut chunks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match naming::classify(&name) {
                Ok(c) if c.kind == ArtifactKind::Chunk && c.owner == video => {
                    chunks.push(entry.path())
                }
                _ => {}
            }
        }
        chunks.sort();
        Ok(chunks)
    }

    /// Delete the staged video, manifest and chunk directory.
    ///
    /// Missing entries are skipped. Returns whether anything existed and the
    /// entries that could not be deleted.
    pub async fn purge(&self, video: &str) -> (bool, Vec<String>) {
        let (video_existed, mut failures) =
            remove_entries([(self.video_path(video), false)]).await;
        let (derived_existed, derived_failures) = self.purge_derived(video).await;
        failures.extend(derived_failures);
        (video_existed || derived_existed, failures)
    }

    /// Delete the manifest and chunk directory, leaving the source video.
    pub async fn purge_derived(&self, video: &str) -> (bool, Vec<String>) {
        remove_entries([
            (self.manifest_path(video), false),
            (self.chunk_dir(video), true),
        ])
        .await
    }
}

async fn remove_entries<const N: usize>(targets: [(PathBuf, bool); N]) -> (bool, Vec<String>) {
    let mut existed = false;
    let mut failures = Vec::new();

    for (path, is_dir) in targets {
        let result = if is_dir {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        match result {
            Ok(()) => existed = true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                existed = true;
                failures.push(format!("{}: {}", path.display(), e));
            }
        }
    }

    (existed, failures)
}
