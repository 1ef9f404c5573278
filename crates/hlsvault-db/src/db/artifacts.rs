//! Artifact location repository: rows of the `artifacts` table.

use crate::db::error::map_sqlx_error;
use crate::db::transaction::TransactionGuard;
use async_trait::async_trait;
use hlsvault_storage::{Location, MetadataEntry, MetadataRepository, StorageError, StorageResult};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Row type for the location columns of `artifacts` (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct LocationRow {
    pub bucket: String,
    pub object_key: String,
}

impl LocationRow {
    pub fn to_location(self) -> Location {
        Location {
            bucket: self.bucket,
            key: self.object_key,
        }
    }
}

/// Postgres-backed metadata repository.
#[derive(Clone)]
pub struct PgMetadataRepository {
    pool: PgPool,
}

impl PgMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_entry(
        tx: &mut TransactionGuard<'_>,
        entry: &MetadataEntry,
    ) -> Result<(), sqlx::Error> {
        let size = i64::try_from(entry.size).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, name, owner, kind, size, bucket, object_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.name)
        .bind(&entry.owner)
        .bind(entry.kind)
        .bind(size)
        .bind(&entry.location.bucket)
        .bind(&entry.location.key)
        .execute(&mut ***tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for PgMetadataRepository {
    #[tracing::instrument(skip_all, fields(db.table = "artifacts", video = %video.owner, rows = chunks.len() + 2))]
    async fn create_all(
        &self,
        video: MetadataEntry,
        manifest: MetadataEntry,
        chunks: Vec<MetadataEntry>,
    ) -> StorageResult<()> {
        let mut tx = TransactionGuard::begin(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(e, &video.name))?;

        for entry in [&video, &manifest].into_iter().chain(chunks.iter()) {
            if let Err(e) = Self::insert_entry(&mut tx, entry).await {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(map_sqlx_error(e, &entry.name));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, &video.name))?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "artifacts"))]
    async fn read(&self, name: &str) -> StorageResult<Location> {
        let row: Option<LocationRow> = sqlx::query_as::<Postgres, LocationRow>(
            "SELECT bucket, object_key FROM artifacts WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, name))?;

        row.map(LocationRow::to_location)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "artifacts"))]
    async fn delete(&self, name: &str) -> StorageResult<Location> {
        let row: Option<LocationRow> = sqlx::query_as::<Postgres, LocationRow>(
            "DELETE FROM artifacts WHERE name = $1 RETURNING bucket, object_key",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, name))?;

        row.map(LocationRow::to_location)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "artifacts"))]
    async fn delete_all(&self, video: &str) -> StorageResult<Vec<Location>> {
        let rows: Vec<LocationRow> = sqlx::query_as::<Postgres, LocationRow>(
            "DELETE FROM artifacts WHERE owner = $1 RETURNING bucket, object_key",
        )
        .bind(video)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, video))?;

        Ok(rows.into_iter().map(LocationRow::to_location).collect())
    }
}
