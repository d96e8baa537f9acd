use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use mosaic_db::DbError;
use mosaic_types::api::{Claims, ProfileResponse, UpdateProfileRequest, UserWithCounts};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, join_err};
use crate::middleware::MaybeClaims;
use crate::util::{
    Pagination, current_user, default_limit, default_page, now_ts, parse_ts, parse_uuid,
    user_summary,
};
use crate::validate::is_valid_username;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.list_users(limit, offset))
        .await
        .map_err(join_err)??;

    let users: Vec<UserWithCounts> = rows
        .into_iter()
        .map(|row| UserWithCounts {
            id: parse_uuid(&row.id, "user"),
            username: row.username,
            full_name: row.full_name,
            avatar: row.avatar,
            bio: row.bio,
            is_online: row.is_online,
            posts_count: row.posts_count,
            followers_count: row.followers_count,
            following_count: row.following_count,
        })
        .collect();

    Ok(Json(json!({ "users": users, "page": page, "limit": limit })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub async fn search_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::Validation("search query required".into()))?
        .to_string();

    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let (_, limit, offset) = pagination.clamp();

    let db = state.db.clone();
    let rows = tokio::task::spawn_blocking(move || db.search_users(&q, limit, offset))
        .await
        .map_err(join_err)??;

    let users: Vec<_> = rows.into_iter().map(user_summary).collect();
    Ok(Json(json!({ "users": users })))
}

pub async fn get_profile(
    State(state): State<AppState>,
    claims: MaybeClaims,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let viewer = claims.0.map(|c| c.sub.to_string());

    let db = state.db.clone();
    let target = id.to_string();
    let (row, is_following) = tokio::task::spawn_blocking(move || {
        let row = db.get_profile(&target)?;
        let is_following = match (&row, &viewer) {
            (Some(_), Some(viewer)) => db.is_following(viewer, &target)?,
            _ => false,
        };
        Ok::<_, DbError>((row, is_following))
    })
    .await
    .map_err(join_err)??;

    let row = row.ok_or(ApiError::NotFound("user not found"))?;

    Ok(Json(ProfileResponse {
        id: parse_uuid(&row.id, "user"),
        username: row.username,
        full_name: row.full_name,
        bio: row.bio,
        avatar: row.avatar,
        is_online: row.is_online,
        last_seen: row.last_seen.as_deref().map(|ts| parse_ts(ts, "user")),
        created_at: parse_ts(&row.created_at, "user"),
        posts_count: row.posts_count,
        followers_count: row.followers_count,
        following_count: row.following_count,
        is_following,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(username) = req.username.as_deref() {
        if !is_valid_username(username) {
            return Err(ApiError::Validation(
                "username must be 3-30 characters: letters, digits, underscores".into(),
            ));
        }

        // Check availability only when actually changing names.
        if username != claims.username {
            let db = state.db.clone();
            let candidate = username.to_string();
            let taken = tokio::task::spawn_blocking(move || db.get_user_by_username(&candidate))
                .await
                .map_err(join_err)??
                .is_some();
            if taken {
                return Err(ApiError::Conflict("username already taken".into()));
            }
        }
    }

    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.update_user_profile(
            &uid,
            req.username.as_deref(),
            req.full_name.as_deref(),
            req.bio.as_deref(),
            req.avatar.as_deref(),
        )?;
        db.get_user_by_id(&uid)
    })
    .await
    .map_err(join_err)??
    .ok_or(ApiError::NotFound("user not found"))?;

    Ok(Json(json!({ "user": current_user(row) })))
}

pub async fn follow_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if id == claims.sub {
        return Err(ApiError::Validation("cannot follow yourself".into()));
    }

    let db = state.db.clone();
    let follower = claims.sub.to_string();
    let following = id.to_string();
    let (_, created_at) = now_ts();
    tokio::task::spawn_blocking(move || {
        if db.get_user_by_id(&following)?.is_none() {
            return Err(DbError::NotFound);
        }
        db.insert_follow(&Uuid::new_v4().to_string(), &follower, &following, &created_at)
    })
    .await
    .map_err(join_err)?
    .map_err(|e| match e {
        DbError::NotFound => ApiError::NotFound("user not found"),
        other => other.into(),
    })?;

    Ok(Json(json!({ "message": "user followed successfully" })))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let follower = claims.sub.to_string();
    let following = id.to_string();
    tokio::task::spawn_blocking(move || db.delete_follow(&follower, &following))
        .await
        .map_err(join_err)?
        .map_err(|e| match e {
            DbError::NotFound => ApiError::NotFound("not following this user"),
            other => other.into(),
        })?;

    Ok(Json(json!({ "message": "user unfollowed successfully" })))
}

pub async fn get_followers(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();
    let db = state.db.clone();
    let uid = id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_followers(&uid, limit, offset))
        .await
        .map_err(join_err)??;

    let followers: Vec<_> = rows.into_iter().map(user_summary).collect();
    Ok(Json(json!({ "followers": followers, "page": page, "limit": limit })))
}

pub async fn get_following(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let (page, limit, offset) = pagination.clamp();
    let db = state.db.clone();
    let uid = id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.get_following(&uid, limit, offset))
        .await
        .map_err(join_err)??;

    let following: Vec<_> = rows.into_iter().map(user_summary).collect();
    Ok(Json(json!({ "following": following, "page": page, "limit": limit })))
}
