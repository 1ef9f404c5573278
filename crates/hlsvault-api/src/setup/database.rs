//! Database setup and initialization

use anyhow::{Context, Result};
use hlsvault_core::{Config, StorageBackend};
use hlsvault_db::PgMetadataRepository;
use hlsvault_storage::MetadataRepository;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Setup database connection pool and run migrations
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set for the distributed backend")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    // Path: workspace migrations/ from crate root
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Metadata repository for the configured backend; local mode needs none.
pub async fn setup_metadata(config: &Config) -> Result<Option<Arc<dyn MetadataRepository>>> {
    match config.storage_backend() {
        StorageBackend::Local => Ok(None),
        StorageBackend::Distributed => {
            let pool = setup_database(config).await?;
            Ok(Some(Arc::new(PgMetadataRepository::new(pool))))
        }
    }
}
