use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use mosaic_db::DbError;
use mosaic_types::api::{
    AddCommentRequest, Claims, CommentResponse, CreatePostRequest, FeedResponse,
    PostDetailResponse, PostGridItem,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, join_err};
use crate::middleware::MaybeClaims;
use crate::util::{Pagination, now_ts, parse_ts, parse_uuid, post_response, user_summary};

/// Number of recent comments embedded in the single-post view.
const DETAIL_COMMENT_LIMIT: u32 = 20;

pub async fn get_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();

    let db = state.db.clone();
    let viewer = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_feed(&viewer, limit, offset))
        .await
        .map_err(join_err)??;

    Ok(Json(FeedResponse {
        posts: rows.into_iter().map(post_response).collect(),
        page,
        limit,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.image_url.trim().is_empty() {
        return Err(ApiError::Validation("image is required".into()));
    }

    let post_id = Uuid::new_v4();
    let (_, created_at) = now_ts();

    let db = state.db.clone();
    let pid = post_id.to_string();
    let uid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.insert_post(&pid, &uid, &req.image_url, req.caption.as_deref(), &created_at)?;
        db.get_post(&pid, Some(&uid))
    })
    .await
    .map_err(join_err)??
    .ok_or(ApiError::NotFound("post not found"))?;

    Ok((StatusCode::CREATED, Json(json!({ "post": post_response(row) }))))
}

pub async fn get_post(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let viewer = claims.0.map(|c| c.sub.to_string());

    let db = state.db.clone();
    let pid = id.to_string();
    let (row, comment_rows) = tokio::task::spawn_blocking(move || {
        let row = db.get_post(&pid, viewer.as_deref())?;
        let comments = match &row {
            Some(_) => db.get_comments_for_post(&pid, DETAIL_COMMENT_LIMIT)?,
            None => vec![],
        };
        Ok::<_, DbError>((row, comments))
    })
    .await
    .map_err(join_err)??;

    let row = row.ok_or(ApiError::NotFound("post not found"))?;

    let comments = comment_rows
        .into_iter()
        .map(|c| CommentResponse {
            id: parse_uuid(&c.id, "comment"),
            post_id: parse_uuid(&c.post_id, "comment"),
            user: user_summary(c.author),
            content: c.content,
            created_at: parse_ts(&c.created_at, "comment"),
        })
        .collect();

    Ok(Json(json!({
        "post": PostDetailResponse {
            post: post_response(row),
            comments,
        }
    })))
}

/// DELETE shares the `/posts/{id}` route with the optionally-authenticated
/// GET, so the auth requirement lives here instead of the middleware stack.
pub async fn delete_post(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let Some(claims) = claims.0 else {
        return Err(ApiError::Unauthorized("authentication required"));
    };

    let db = state.db.clone();
    let pid = id.to_string();
    let owner = tokio::task::spawn_blocking(move || db.get_post_owner(&pid))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::NotFound("post not found"))?;

    if owner != claims.sub.to_string() {
        return Err(ApiError::Forbidden("not authorized to delete this post"));
    }

    let db = state.db.clone();
    let pid = id.to_string();
    tokio::task::spawn_blocking(move || db.delete_post(&pid))
        .await
        .map_err(join_err)??;

    Ok(Json(json!({ "message": "post deleted successfully" })))
}

pub async fn like_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let pid = id.to_string();
    let uid = claims.sub.to_string();
    let (_, created_at) = now_ts();
    tokio::task::spawn_blocking(move || {
        if db.get_post_owner(&pid)?.is_none() {
            return Err(DbError::NotFound);
        }
        db.insert_like(&Uuid::new_v4().to_string(), &uid, &pid, &created_at)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("post not found"),
        other => other.into(),
    })?;

    Ok(Json(json!({ "message": "post liked" })))
}

pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let pid = id.to_string();
    let uid = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.delete_like(&uid, &pid))
        .await
        .map_err(join_err)?
        .map_err(|e| match e {
            DbError::NotFound => ApiError::NotFound("like not found"),
            other => other.into(),
        })?;

    Ok(Json(json!({ "message": "post unliked" })))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("comment content is required".into()));
    }

    let comment_id = Uuid::new_v4();
    let (created_at_dt, created_at) = now_ts();

    let db = state.db.clone();
    let cid = comment_id.to_string();
    let pid = id.to_string();
    let uid = claims.sub.to_string();
    let stored = content.clone();
    let author = tokio::task::spawn_blocking(move || {
        if db.get_post_owner(&pid)?.is_none() {
            return Err(DbError::NotFound);
        }
        db.insert_comment(&cid, &uid, &pid, &stored, &created_at)?;
        db.get_user_by_id(&uid)?.ok_or(DbError::NotFound)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("post not found"),
        other => other.into(),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "comment": CommentResponse {
                id: comment_id,
                post_id: id,
                user: mosaic_types::models::UserSummary {
                    id: claims.sub,
                    username: author.username,
                    full_name: author.full_name,
                    avatar: author.avatar,
                },
                content,
                created_at: created_at_dt,
            }
        })),
    ))
}

pub async fn get_user_posts(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();

    let db = state.db.clone();
    let uid = user_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_user_posts(&uid, limit, offset))
        .await
        .map_err(join_err)??;

    let posts: Vec<PostGridItem> = rows
        .into_iter()
        .map(|row| PostGridItem {
            id: parse_uuid(&row.id, "post"),
            image_url: row.image_url,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
        })
        .collect();

    Ok(Json(json!({ "posts": posts, "page": page, "limit": limit })))
}
