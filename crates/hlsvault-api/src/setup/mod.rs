//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use hlsvault_core::Config;
use hlsvault_processing::{FfmpegSegmenter, HlsService};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        backend = %config.storage_backend(),
        production = config.is_production(),
        "Configuration loaded and validated successfully"
    );

    let metadata = database::setup_metadata(&config).await?;
    let storage = storage::setup_storage(&config, metadata).await?;

    let segmenter = Arc::new(FfmpegSegmenter::new(config.ffmpeg_path()));
    let service = HlsService::from_config(&config, storage, segmenter);
    let state = Arc::new(AppState::new(service));

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
