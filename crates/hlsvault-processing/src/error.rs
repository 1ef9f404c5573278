//! Derivation pipeline errors

use hlsvault_core::AppError;
use hlsvault_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// The segmenter exited non-zero, could not be spawned, or wrote no
    /// manifest. `output` holds its combined stdout and stderr.
    #[error("Segmentation failed: {output}")]
    SegmentationFailed { output: String },

    #[error("Derivation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::VideoNotFound(name) => {
                AppError::NotFound(format!("Video not found: {}", name))
            }
            PipelineError::DuplicateName(name) => AppError::DuplicateName(name),
            PipelineError::SegmentationFailed { output } => AppError::SegmentationFailed(output),
            PipelineError::DeadlineExceeded(limit) => AppError::DerivationTimeout(format!(
                "Derivation did not finish within {}s",
                limit.as_secs()
            )),
            PipelineError::Storage(e) => e.into(),
            PipelineError::Io(e) => AppError::InternalWithSource {
                message: "Staging I/O failed".to_string(),
                source: e.into(),
            },
        }
    }
}
