//! HLSVault Core Library
//!
//! This crate provides the artifact naming rules, error taxonomy and
//! configuration shared by every HLSVault component.

pub mod config;
pub mod error;
pub mod naming;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use naming::{classify, ArtifactKind, Classified, NamingError};
pub use storage_types::StorageBackend;
