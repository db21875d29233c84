use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::errors::{AppError, Result};
use crate::services::storage::{StorageService, AVATAR_DIR, PHOTO_DIR};
use crate::state::AppState;

async fn serve_file(state: &AppState, dir: &str, file_name: &str) -> Result<Response> {
    let path = state
        .storage
        .resolve(dir, file_name)
        .ok_or_else(|| AppError::not_found("File not found"))?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found("File not found"))
        }
        Err(e) => return Err(e.into()),
    };
    if !file.metadata().await?.is_file() {
        return Err(AppError::not_found("File not found"));
    }

    let content_type = StorageService::content_type(&path);
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        body,
    )
        .into_response())
}

pub async fn waste_photo(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response> {
    serve_file(&state, PHOTO_DIR, &file_name).await
}

pub async fn avatar(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response> {
    serve_file(&state, AVATAR_DIR, &file_name).await
}
