//! Configuration module
//!
//! Settings are read once at startup from the environment (and an optional
//! `.env` file) and passed down to the components that need them.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
pub const SEGMENT_TIME_SECS: u32 = 4;
pub const DERIVATION_TIMEOUT_SECS: u64 = 600;
const OBJECT_STORE_CONCURRENCY: usize = 8;
const MAX_UPLOAD_MB: usize = 2048;
const DEFAULT_REGION: &str = "us-east-1";

/// Local directories the derivation pipeline writes into.
///
/// In local mode they are also the directories artifacts are served from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalPaths {
    pub video_path: PathBuf,
    pub manifest_path: PathBuf,
    pub chunk_path: PathBuf,
}

/// Object store settings used in distributed mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    /// Custom endpoint for S3-compatible providers (MinIO etc.)
    pub endpoint: Option<String>,
    pub region: String,
    pub video_bucket: String,
    pub manifest_bucket: String,
    pub chunk_bucket: String,
    pub concurrency: usize,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub environment: String,
    pub log_format: String,
    pub max_upload_bytes: usize,
    pub storage_backend: StorageBackend,
    pub local: LocalPaths,
    pub object_store: ObjectStoreConfig,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub ffmpeg_path: String,
    pub segment_time_secs: u32,
    pub derivation_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AppConfig>);

impl Config {
    fn as_app(&self) -> &AppConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = AppConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_app().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_app().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.as_app().server_port
    }

    pub fn log_json(&self) -> bool {
        self.as_app().log_format.eq_ignore_ascii_case("json")
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.as_app().max_upload_bytes
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_app().storage_backend
    }

    pub fn video_path(&self) -> &Path {
        &self.as_app().local.video_path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.as_app().local.manifest_path
    }

    pub fn chunk_path(&self) -> &Path {
        &self.as_app().local.chunk_path
    }

    pub fn local_paths(&self) -> &LocalPaths {
        &self.as_app().local
    }

    pub fn object_store(&self) -> &ObjectStoreConfig {
        &self.as_app().object_store
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_app().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_app().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_app().db_timeout_seconds
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_app().ffmpeg_path
    }

    pub fn segment_time_secs(&self) -> u32 {
        self.as_app().segment_time_secs
    }

    pub fn derivation_timeout(&self) -> Duration {
        Duration::from_secs(self.as_app().derivation_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let storage_backend = match env::var("STORAGE_BACKEND")
            .or_else(|_| env::var("STORAGE_TYPE"))
        {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::default(),
        };

        let local = LocalPaths {
            video_path: env::var("VIDEO_PATH")
                .unwrap_or_else(|_| "data/videos".to_string())
                .into(),
            manifest_path: env::var("MANIFEST_PATH")
                .unwrap_or_else(|_| "data/manifests".to_string())
                .into(),
            chunk_path: env::var("CHUNK_PATH")
                .unwrap_or_else(|_| "data/chunks".to_string())
                .into(),
        };

        let object_store = ObjectStoreConfig {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            video_bucket: env::var("S3_VIDEO_BUCKET").unwrap_or_else(|_| "videos".to_string()),
            manifest_bucket: env::var("S3_MANIFEST_BUCKET")
                .unwrap_or_else(|_| "manifests".to_string()),
            chunk_bucket: env::var("S3_CHUNK_BUCKET").unwrap_or_else(|_| "chunks".to_string()),
            concurrency: env::var("OBJECT_STORE_CONCURRENCY")
                .unwrap_or_else(|_| OBJECT_STORE_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(OBJECT_STORE_CONCURRENCY),
        };

        let max_upload_mb = env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_MB);

        let config = AppConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            storage_backend,
            local,
            object_store,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            segment_time_secs: env::var("SEGMENT_TIME")
                .unwrap_or_else(|_| SEGMENT_TIME_SECS.to_string())
                .parse()
                .unwrap_or(SEGMENT_TIME_SECS),
            derivation_timeout_secs: env::var("DERIVATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| DERIVATION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DERIVATION_TIMEOUT_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.segment_time_secs == 0 {
            return Err(anyhow::anyhow!("SEGMENT_TIME must be greater than zero"));
        }

        if self.derivation_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "DERIVATION_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.object_store.concurrency == 0 {
            return Err(anyhow::anyhow!(
                "OBJECT_STORE_CONCURRENCY must be greater than zero"
            ));
        }

        match self.storage_backend {
            StorageBackend::Local => {}
            StorageBackend::Distributed => {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL must be set when using distributed storage backend")
                })?;
                if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ));
                }
                let buckets = [
                    &self.object_store.video_bucket,
                    &self.object_store.manifest_bucket,
                    &self.object_store.chunk_bucket,
                ];
                if buckets.iter().any(|b| b.is_empty()) {
                    return Err(anyhow::anyhow!(
                        "S3_VIDEO_BUCKET, S3_MANIFEST_BUCKET and S3_CHUNK_BUCKET must not be empty"
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Built-in defaults, equivalent to an empty environment.
impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            log_format: "text".to_string(),
            max_upload_bytes: MAX_UPLOAD_MB * 1024 * 1024,
            storage_backend: StorageBackend::default(),
            local: LocalPaths {
                video_path: "data/videos".into(),
                manifest_path: "data/manifests".into(),
                chunk_path: "data/chunks".into(),
            },
            object_store: ObjectStoreConfig {
                endpoint: None,
                region: DEFAULT_REGION.to_string(),
                video_bucket: "videos".to_string(),
                manifest_bucket: "manifests".to_string(),
                chunk_bucket: "chunks".to_string(),
                concurrency: OBJECT_STORE_CONCURRENCY,
            },
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            ffmpeg_path: "ffmpeg".to_string(),
            segment_time_secs: SEGMENT_TIME_SECS,
            derivation_timeout_secs: DERIVATION_TIMEOUT_SECS,
        }
    }
}
