//! HLSVault Processing Library
//!
//! Turns an uploaded video into its HLS manifest and chunks and hands the
//! result to a `Storage` backend. Work on one video name is serialised by
//! `NameLocks`; different names proceed in parallel.

pub mod error;
pub mod locks;
pub mod pipeline;
pub mod segmenter;
pub mod service;

pub use error::PipelineError;
pub use locks::{NameGuard, NameLocks};
pub use pipeline::{DerivationPipeline, PipelineOptions};
pub use segmenter::{FfmpegSegmenter, SegmentOutput, SegmentRequest, Segmenter};
pub use service::HlsService;
