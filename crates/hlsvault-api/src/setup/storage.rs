//! Storage setup and initialization

use anyhow::{Context, Result};
use hlsvault_core::Config;
use hlsvault_storage::{create_storage, MetadataRepository, Storage};
use std::sync::Arc;

pub async fn setup_storage(
    config: &Config,
    metadata: Option<Arc<dyn MetadataRepository>>,
) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage backend...");
    let storage = create_storage(config, metadata)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(
        backend = %storage.backend_type(),
        "Storage backend initialized successfully"
    );
    Ok(storage)
}
