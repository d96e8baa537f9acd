use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use uuid::Uuid;

use mosaic_db::{Database, DbError};
use mosaic_gateway::dispatcher::Dispatcher;
use mosaic_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};

use crate::error::{ApiError, ApiResult, join_err};
use crate::util::{current_user, now_ts};
use crate::validate::{is_valid_email, is_valid_password, is_valid_username};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub upload_dir: PathBuf,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("full name is required".into()));
    }
    if !is_valid_username(&req.username) {
        return Err(ApiError::Validation(
            "username must be 3-30 characters: letters, digits, underscores".into(),
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("a valid email is required".into()));
    }
    if !is_valid_password(&req.password) {
        return Err(ApiError::Validation(
            "password must be at least 6 characters".into(),
        ));
    }

    // Report which field collides so the client can highlight it.
    {
        let db = state.db.clone();
        let email = req.email.clone();
        let username = req.username.clone();
        let (by_email, by_username) = tokio::task::spawn_blocking(move || {
            let by_email = db.get_user_by_email(&email)?;
            let by_username = db.get_user_by_username(&username)?;
            Ok::<_, DbError>((by_email, by_username))
        })
        .await
        .map_err(join_err)??;

        if by_email.is_some() {
            return Err(ApiError::Conflict("email already registered".into()));
        }
        if by_username.is_some() {
            return Err(ApiError::Conflict("username already taken".into()));
        }
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    let (_, created_at) = now_ts();

    let row = {
        let db = state.db.clone();
        let uid = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            db.create_user(
                &uid,
                &req.username,
                &req.email,
                &password_hash,
                &req.full_name,
                &created_at,
            )?;
            db.get_user_by_id(&uid)
        })
        .await
        .map_err(join_err)??
        .ok_or(ApiError::NotFound("user not found"))?
    };

    let token = create_token(&state.jwt_secret, user_id, &row.username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: current_user(row),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("email and password are required".into()));
    }

    let row = {
        let db = state.db.clone();
        let email = req.email.clone();
        tokio::task::spawn_blocking(move || db.get_user_by_email(&email))
            .await
            .map_err(join_err)??
            .ok_or(ApiError::Unauthorized("invalid credentials"))?
    };

    // Verify password
    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized("invalid credentials"))?;

    let user_id: Uuid = row
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;

    // Mark online
    {
        let db = state.db.clone();
        let uid = row.id.clone();
        tokio::task::spawn_blocking(move || db.set_online(&uid, true, None))
            .await
            .map_err(join_err)??;
    }

    let token = create_token(&state.jwt_secret, user_id, &row.username)?;

    Ok(Json(AuthResponse {
        user: current_user(row),
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (_, last_seen) = now_ts();
    let db = state.db.clone();
    let uid = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.set_online(&uid, false, Some(last_seen.as_str())))
        .await
        .map_err(join_err)??;

    Ok(Json(json!({ "message": "logout successful" })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let uid = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || db.get_user_by_id(&uid))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::Unauthorized("user no longer exists"))?;

    Ok(Json(json!({ "user": current_user(row) })))
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encode failed: {e}")))
}
