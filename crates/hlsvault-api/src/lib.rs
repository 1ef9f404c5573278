//! HLSVault API Library
//!
//! HTTP surface over `HlsService`: upload, serve and delete by filename.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
