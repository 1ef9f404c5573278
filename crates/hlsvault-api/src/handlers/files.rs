use crate::constants::{CONTENT_TYPE_M3U8, CONTENT_TYPE_MP4, CONTENT_TYPE_TS};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use hlsvault_core::naming::{self, ArtifactKind, VIDEO_EXTENSION};
use hlsvault_core::AppError;
use hlsvault_processing::PipelineError;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

const SUCCESS: &str = "Success";

fn content_type(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Video => CONTENT_TYPE_MP4,
        ArtifactKind::Manifest => CONTENT_TYPE_M3U8,
        ArtifactKind::Chunk => CONTENT_TYPE_TS,
    }
}

/// Body read failures surface as `InvalidData` from the stream reader.
fn upload_error(err: PipelineError) -> HttpAppError {
    match err {
        PipelineError::Io(e) if e.kind() == io::ErrorKind::InvalidData => {
            AppError::InvalidInput(format!("Failed to read file data: {}", e)).into()
        }
        other => other.into(),
    }
}

/// `POST /api/v1/files`: multipart with a `file` field and an optional
/// `name` field sent before it.
///
/// The file is streamed to staging as it arrives; fields after `file` are
/// not read.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<&'static str>, HttpAppError> {
    let mut name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read name: {}", e)))?;
                let value = value.trim();
                if !value.is_empty() {
                    name = Some(value.to_string());
                }
            }
            "file" => {
                let filename = field.file_name().map(str::to_string).unwrap_or_default();
                let Some(stem) = filename.strip_suffix(VIDEO_EXTENSION) else {
                    return Err(AppError::InvalidUpload(format!(
                        "Expected a .mp4 file, got '{}'",
                        filename
                    ))
                    .into());
                };
                let video = name.take().unwrap_or_else(|| stem.to_string());

                let reader = StreamReader::new(
                    field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
                );
                tokio::pin!(reader);

                state
                    .service
                    .upload(&video, &mut reader)
                    .await
                    .map_err(upload_error)?;

                tracing::info!(video = %video, "Video uploaded");
                return Ok(Json(SUCCESS));
            }
            _ => {}
        }
    }

    Err(AppError::InvalidInput("No file provided".to_string()).into())
}

/// `GET /api/v1/files/{filename}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, HttpAppError> {
    let kind = naming::classify(&filename).map_err(AppError::from)?.kind;
    let stream = state.service.serve(&filename).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| io::Error::other(format!("Storage stream error: {}", e)))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(kind))
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}

/// `DELETE /api/v1/files/{filename}`: `alpha` or `alpha.mp4`.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<&'static str>, HttpAppError> {
    state.service.remove(&filename).await?;
    Ok(Json(SUCCESS))
}
