//! Route configuration and setup

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use hlsvault_core::Config;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let file_routes = Router::new()
        .route("/files", post(handlers::files::upload_file))
        .route(
            "/files/{filename}",
            get(handlers::files::get_file).delete(handlers::files::delete_file),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(API_PREFIX, file_routes)
        // The multipart extractor's own cap is replaced by the configured one.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes()))
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
