//! HLSVault Database Library
//!
//! Postgres implementation of the metadata repository used by the
//! distributed storage backend.

pub mod db;

pub use db::{PgMetadataRepository, TransactionGuard};
