//! Error types module
//!
//! `AppError` is the taxonomy callers of the storage engine see. Lower layers
//! (naming, storage backends, the derivation pipeline) keep their own typed
//! errors and are mapped onto these variants at the service boundary.

use std::io;

use crate::naming::NamingError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like unknown files
    Debug,
    /// Warning level - for recoverable issues like an unreachable backend
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upload form was well-formed but its file cannot be accepted.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Segmentation failed: {0}")]
    SegmentationFailed(String),

    #[error("Derivation timed out: {0}")]
    DerivationTimeout(String),

    #[error("Inconsistent storage state: {0}")]
    Inconsistent(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<NamingError> for AppError {
    fn from(err: NamingError) -> Self {
        match err {
            NamingError::UnsupportedFormat(name) => AppError::UnsupportedFormat(name),
            NamingError::InvalidName(name) => {
                AppError::InvalidInput(format!("Invalid file name: {}", name))
            }
        }
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::DuplicateName(_) => (
            409,
            "DUPLICATE_NAME",
            false,
            Some("Choose a different video name or remove the existing one"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedFormat(_) => (
            415,
            "UNSUPPORTED_FORMAT",
            false,
            Some("Use a .mp4, .m3u8 or .ts file name"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidUpload(_) => (
            422,
            "INVALID_UPLOAD",
            false,
            Some("Upload a .mp4 file in the 'file' field"),
            false,
            LogLevel::Debug,
        ),
        AppError::SegmentationFailed(_) => (
            502,
            "SEGMENTATION_FAILED",
            false,
            Some("Check that the uploaded file is a valid H.264 MP4"),
            true,
            LogLevel::Error,
        ),
        AppError::DerivationTimeout(_) => (
            504,
            "DERIVATION_TIMEOUT",
            true,
            Some("Retry later or upload a shorter video"),
            false,
            LogLevel::Warn,
        ),
        AppError::Inconsistent(_) => (
            500,
            "INCONSISTENT_STORAGE",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::StorageUnavailable(_) => (
            503,
            "STORAGE_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Full error message including the source chain, for logging.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    /// Whether the caller is at fault (as opposed to the server).
    pub fn is_client_fault(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::DuplicateName(ref name) => format!("Video already exists: {}", name),
            AppError::UnsupportedFormat(ref name) => format!("Unsupported file format: {}", name),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::InvalidUpload(ref msg) => msg.clone(),
            AppError::SegmentationFailed(_) => "Failed to segment video".to_string(),
            AppError::DerivationTimeout(_) => "Video segmentation timed out".to_string(),
            AppError::Inconsistent(_) => "Stored artifact is unavailable".to_string(),
            AppError::StorageUnavailable(_) => "Storage is temporarily unavailable".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("alpha.mp4".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "alpha.mp4");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_unsupported_format_is_client_fault() {
        let err = AppError::from(NamingError::UnsupportedFormat("x.avi".to_string()));
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
        assert_eq!(err.http_status_code(), 415);
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_server_faults_are_distinct_from_internal() {
        let segmentation = AppError::SegmentationFailed("exit 1".to_string());
        let inconsistent = AppError::Inconsistent("alpha.mp4".to_string());
        let unavailable = AppError::StorageUnavailable("connection refused".to_string());
        let internal = AppError::Internal("boom".to_string());

        for err in [&segmentation, &inconsistent, &unavailable] {
            assert!(!err.is_client_fault());
            assert_ne!(err.error_code(), internal.error_code());
        }
        assert!(unavailable.is_recoverable());
        assert_eq!(unavailable.http_status_code(), 503);
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::from(anyhow::anyhow!("db password rejected"));
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.is_sensitive());
        assert!(err.detailed_message().contains("db password rejected"));
    }

    #[test]
    fn test_invalid_name_maps_to_invalid_input() {
        let err = AppError::from(NamingError::InvalidName("../x.mp4".to_string()));
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.http_status_code(), 400);
    }
}
