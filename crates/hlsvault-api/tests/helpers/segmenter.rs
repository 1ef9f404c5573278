use async_trait::async_trait;
use hlsvault_processing::{SegmentOutput, SegmentRequest, Segmenter};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Writes `chunks` chunk files (source bytes plus the index byte) and a
/// playlist listing them, or fails like ffmpeg on bad input.
pub struct ScriptedSegmenter {
    chunks: u32,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedSegmenter {
    pub fn new(chunks: u32) -> Self {
        Self {
            chunks,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Segmenter for ScriptedSegmenter {
    async fn segment(&self, request: &SegmentRequest) -> std::io::Result<SegmentOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Ok(SegmentOutput {
                success: false,
                exit_code: Some(1),
                combined_output: "moov atom not found".to_string(),
            });
        }

        let source = tokio::fs::read(&request.source).await?;
        let template = request.chunk_template.to_string_lossy().to_string();
        let mut playlist = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:4\n");
        for i in 0..self.chunks {
            let path = template.replace("%04d", &format!("{:04}", i));
            let mut data = source.clone();
            data.push(i as u8);
            tokio::fs::write(&path, data).await?;
            if let Some(name) = std::path::Path::new(&path).file_name() {
                playlist.push_str(&format!("#EXTINF:4.0,\n{}\n", name.to_string_lossy()));
            }
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(&request.manifest, playlist).await?;

        Ok(SegmentOutput {
            success: true,
            exit_code: Some(0),
            combined_output: String::new(),
        })
    }
}
