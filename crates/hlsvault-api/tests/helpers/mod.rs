//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p hlsvault-api`. The app runs in
//! local mode under a temp directory with a fake segmenter, so neither Docker
//! nor ffmpeg is needed.

pub mod segmenter;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use hlsvault_api::constants;
use hlsvault_api::setup::routes;
use hlsvault_api::state::AppState;
use hlsvault_core::config::{AppConfig, LocalPaths};
use hlsvault_core::{Config, StorageBackend};
use hlsvault_processing::HlsService;
use hlsvault_storage::create_storage;
use std::sync::Arc;
use tempfile::TempDir;

pub use segmenter::ScriptedSegmenter;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub segmenter: Arc<ScriptedSegmenter>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn create_test_config(temp_dir: &TempDir) -> Config {
    let base = temp_dir.path();
    Config(Box::new(AppConfig {
        storage_backend: StorageBackend::Local,
        local: LocalPaths {
            video_path: base.join("videos"),
            manifest_path: base.join("manifests"),
            chunk_path: base.join("chunks"),
        },
        max_upload_bytes: 1024 * 1024,
        ..AppConfig::default()
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(ScriptedSegmenter::new(3)).await
}

pub async fn setup_test_app_with(segmenter: ScriptedSegmenter) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(&temp_dir);

    let storage = create_storage(&config, None)
        .await
        .expect("Failed to create local storage");
    let segmenter = Arc::new(segmenter);
    let service = HlsService::from_config(&config, storage, segmenter.clone());
    let state = Arc::new(AppState::new(service));

    let app = routes::setup_routes(&config, state);
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        segmenter,
        config,
        _temp_dir: temp_dir,
    }
}

/// Multipart form carrying `data` as `filename`, optionally with a `name` field first.
pub fn video_form(filename: &str, data: &[u8], name: Option<&str>) -> MultipartForm {
    let mut form = MultipartForm::new();
    if let Some(name) = name {
        form = form.add_text("name", name.to_string());
    }
    let part = Part::bytes(bytes::Bytes::copy_from_slice(data))
        .file_name(filename.to_string())
        .mime_type("video/mp4");
    form.add_part("file", part)
}
