use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use mosaic_db::DbError;

/// Handler-level errors, mapped one-to-one onto the HTTP taxonomy:
/// validation 400, authentication 401, authorization 403, not-found 404,
/// uniqueness conflict 409, everything else 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ApiError::NotFound("resource not found"),
            DbError::Conflict(what) => ApiError::Conflict(what.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, (*msg).to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, (*msg).to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, (*msg).to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ApiError::Internal(e) => {
                error!("internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "something went wrong".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Maps a spawn_blocking join failure into a 500 with a log line.
pub(crate) fn join_err(e: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", e);
    ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}"))
}
