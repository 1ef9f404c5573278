//! Storage abstraction trait
//!
//! This module defines the Storage trait that both backends implement.

use crate::artifact::ArtifactSet;
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use hlsvault_core::{AppError, NamingError};
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Metadata references a blob that the object store does not have.
    #[error("Inconsistent storage state: {0}")]
    Inconsistent(String),

    /// Object store or database unreachable. Safe to retry.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Removal incomplete: {}", .0.join("; "))]
    PartialRemoval(Vec<String>),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<NamingError> for StorageError {
    fn from(err: NamingError) -> Self {
        match err {
            NamingError::UnsupportedFormat(name) => StorageError::UnsupportedFormat(name),
            NamingError::InvalidName(name) => StorageError::InvalidName(name),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => AppError::NotFound(format!("File not found: {}", name)),
            StorageError::DuplicateName(name) => AppError::DuplicateName(name),
            StorageError::UnsupportedFormat(name) => AppError::UnsupportedFormat(name),
            StorageError::InvalidName(name) => {
                AppError::InvalidInput(format!("Invalid file name: {}", name))
            }
            StorageError::Inconsistent(msg) => AppError::Inconsistent(msg),
            StorageError::Unavailable(msg) => AppError::StorageUnavailable(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of artifact bytes handed back to callers.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Artifacts are addressed by filename only; the suffix decides where they
/// live (see `hlsvault_core::naming`).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open the named artifact for reading.
    async fn get(&self, name: &str) -> StorageResult<ByteStream>;

    /// Persist a complete artifact set. Either every artifact becomes
    /// retrievable or none does.
    async fn store(&self, set: ArtifactSet) -> StorageResult<()>;

    /// Remove the video and everything derived from it.
    ///
    /// `video` is the video name without extension.
    async fn remove(&self, video: &str) -> StorageResult<()>;

    /// Check whether the named artifact is retrievable.
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
