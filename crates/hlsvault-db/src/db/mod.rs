//! Database repositories for data access layer
//
// Artifact locations
pub mod artifacts;
//
// sqlx error mapping
pub mod error;
//
// Transaction utilities
pub mod transaction;

pub use artifacts::PgMetadataRepository;
pub use transaction::TransactionGuard;
