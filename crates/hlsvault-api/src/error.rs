//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Every lower-layer error converts
//! into `AppError` first, so status, body and logging stay uniform.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hlsvault_core::{AppError, ErrorMetadata, LogLevel};
use hlsvault_processing::PipelineError;
use hlsvault_storage::StorageError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: neither the trait nor AppError is local to this crate)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<PipelineError> for HttpAppError {
    fn from(err: PipelineError) -> Self {
        HttpAppError(err.into())
    }
}

fn log_error(error: &AppError) {
    let code = error.error_code();
    let details = error.detailed_message();
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %details, code, "Request failed"),
        LogLevel::Warn => tracing::warn!(error = %details, code, "Request failed"),
        LogLevel::Error => tracing::error!(error = %details, code, "Request failed"),
    }
}

/// Same resolution order as `Config::from_env`: `ENVIRONMENT`, then `APP_ENV`.
fn is_production_with(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup("ENVIRONMENT")
        .or_else(|| lookup("APP_ENV"))
        .map(|env| env.eq_ignore_ascii_case("production") || env.eq_ignore_ascii_case("prod"))
        .unwrap_or(false)
}

fn is_production_env() -> bool {
    is_production_with(|key| std::env::var(key).ok())
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Sensitive errors never leak details; others only outside production.
        let details = if is_production_env() || app_error.is_sensitive() {
            None
        } else {
            Some(app_error.detailed_message())
        };

        let body = Json(ErrorResponse {
            error: app_error.client_message(),
            details,
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
        });

        (status, body).into_response()
    }
}
