use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use mosaic_types::api::{Claims, UploadResponse};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// 10 MB upload limit for images
const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// POST /files — accepts raw image bytes (application/octet-stream), saves
/// them under the upload dir, returns the URL the client then attaches to a
/// post or profile. Stands in for the external image service.
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::Validation("file body is required".into()));
    }

    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::PayloadTooLarge(format!(
            "file exceeds the {} MB limit",
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }

    let file_id = Uuid::new_v4().to_string();
    let size = bytes.len() as u64;

    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {}", e);
        ApiError::Internal(e.into())
    })?;

    let file_path = state.upload_dir.join(&file_id);
    tokio::fs::write(&file_path, &bytes).await.map_err(|e| {
        error!("Failed to write upload {}: {}", file_path.display(), e);
        ApiError::Internal(e.into())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url: format!("/files/{file_id}"),
            size,
        }),
    ))
}

/// GET /files/{file_id} — streams the stored bytes back.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    // Validate file_id is a valid UUID to prevent path traversal
    file_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::Validation("invalid file id".into()))?;

    let file_path = state.upload_dir.join(&file_id);
    let bytes = tokio::fs::read(&file_path)
        .await
        .map_err(|_| ApiError::NotFound("file not found"))?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}
