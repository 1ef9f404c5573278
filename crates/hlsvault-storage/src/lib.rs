//! HLSVault Storage Library
//!
//! This crate persists and serves the artifacts derived from one uploaded
//! video: the video itself, its HLS manifest and its chunks. It includes the
//! `Storage` trait and two backends:
//!
//! - `LocalStorage` serves the files the derivation pipeline wrote to disk.
//! - `DistributedStorage` copies them to an object store (one bucket per
//!   artifact kind) and records every artifact's location in a metadata
//!   repository, which is the source of truth for existence.
//!
//! # Object keys
//!
//! In distributed mode every upload gets its own key prefix:
//! `{upload_id}/{filename}`. Retries and compensating deletes therefore only
//! ever touch blobs written by the same attempt.

pub mod artifact;
pub mod distributed;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod metadata;
pub mod object;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod staging;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactSet, Location};
pub use distributed::DistributedStorage;
pub use factory::create_storage;
pub use hlsvault_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use metadata::{MetadataEntry, MetadataRepository};
pub use object::{BucketConnector, BucketNames, ObjectStoreAdapter};
#[cfg(feature = "storage-s3")]
pub use s3::S3Connector;
pub use staging::StagingLayout;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
