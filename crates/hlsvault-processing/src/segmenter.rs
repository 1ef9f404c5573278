//! Segmenter - cuts a video into an HLS manifest and MPEG-TS chunks.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Paths for one segmentation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub source: PathBuf,
    pub manifest: PathBuf,
    /// Chunk filename pattern in printf syntax, e.g. `.../alpha_%04d.ts`.
    pub chunk_template: PathBuf,
    pub segment_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr.
    pub combined_output: String,
}

/// External transcoding step.
///
/// An `Err` means the segmenter could not be run at all; a run that failed
/// reports `success == false` instead.
#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(&self, request: &SegmentRequest) -> std::io::Result<SegmentOutput>;
}

/// Segmenter that shells out to ffmpeg, copying streams without re-encoding.
pub struct FfmpegSegmenter {
    ffmpeg_path: String,
}

impl FfmpegSegmenter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn args(request: &SegmentRequest) -> Vec<String> {
        vec![
            "-i".to_string(),
            request.source.to_string_lossy().to_string(),
            "-codec".to_string(),
            "copy".to_string(),
            "-bsf:v".to_string(),
            "h264_mp4toannexb".to_string(),
            "-start_number".to_string(),
            "0".to_string(),
            "-hls_time".to_string(),
            request.segment_seconds.to_string(),
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_segment_filename".to_string(),
            request.chunk_template.to_string_lossy().to_string(),
            "-f".to_string(),
            "hls".to_string(),
            request.manifest.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Segmenter for FfmpegSegmenter {
    #[tracing::instrument(skip(self), fields(source = %request.source.display()))]
    async fn segment(&self, request: &SegmentRequest) -> std::io::Result<SegmentOutput> {
        // kill_on_drop lets a timed-out caller take the child down with it.
        let output = Command::new(&self.ffmpeg_path)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let mut combined_output = String::from_utf8_lossy(&output.stdout).into_owned();
        combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(SegmentOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            combined_output,
        })
    }
}
