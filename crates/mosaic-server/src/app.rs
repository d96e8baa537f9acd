use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mosaic_api::auth::{self, AppState, AppStateInner};
use mosaic_api::middleware::{optional_auth, require_auth};
use mosaic_api::{messages, posts, uploads, users};
use mosaic_db::Database;
use mosaic_gateway::connection;
use mosaic_gateway::dispatcher::Dispatcher;
use mosaic_types::api::Claims;

#[derive(Clone)]
struct GatewayState {
    app: AppState,
    dispatcher: Dispatcher,
    jwt_secret: String,
}

/// Assembles the full application router: public auth routes, the
/// optionally-authenticated read routes, the protected API surface, and
/// the WebSocket gateway.
pub fn build_router(db: Arc<Database>, jwt_secret: String, upload_dir: PathBuf) -> Router {
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        upload_dir,
    });

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/files/{file_id}", get(uploads::download_file))
        .with_state(app_state.clone());

    // Token honored when present; its absence is not an error.
    let optional_routes = Router::new()
        .route("/users/{id}", get(users::get_profile))
        .route("/posts/{id}", get(posts::get_post).delete(posts::delete_post))
        .layer(middleware::from_fn(optional_auth))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route("/users/search", get(users::search_users))
        .route("/users/profile", put(users::update_profile))
        .route(
            "/users/{id}/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        .route("/users/{id}/followers", get(users::get_followers))
        .route("/users/{id}/following", get(users::get_following))
        .route("/posts/feed", get(posts::get_feed))
        .route("/posts/user/{user_id}", get(posts::get_user_posts))
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}/like",
            post(posts::like_post).delete(posts::unlike_post),
        )
        .route("/posts/{id}/comments", post(posts::add_comment))
        .route(
            "/messages/conversations",
            get(messages::get_conversations).post(messages::create_conversation),
        )
        .route(
            "/messages/conversations/{id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route(
            "/messages/conversations/{id}/read",
            put(messages::mark_as_read),
        )
        .route("/files", post(uploads::upload_file))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state.clone());

    let gateway_state = GatewayState {
        app: app_state,
        dispatcher,
        jwt_secret,
    };
    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway_state);

    Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// The gateway authenticates with the same session token as the REST
/// surface, passed as a query parameter at upgrade time.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let token = query.token.ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user_id = token_data.claims.sub;
    let username = token_data.claims.username;
    let db = state.app.db.clone();

    Ok(ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, db, user_id, username)
    }))
}
