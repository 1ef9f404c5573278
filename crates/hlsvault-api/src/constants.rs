//! Shared HTTP constants

/// API version prefix for all file routes.
pub const API_PREFIX: &str = "/api/v1";

pub const CONTENT_TYPE_MP4: &str = "video/mp4";
pub const CONTENT_TYPE_M3U8: &str = "application/vnd.apple.mpegurl";
pub const CONTENT_TYPE_TS: &str = "video/mp2t";
