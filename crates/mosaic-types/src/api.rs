use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CurrentUser, ParticipantSummary, UserSummary};

// -- JWT Claims --

/// JWT claims shared across mosaic-api (REST middleware) and mosaic-gateway
/// (WebSocket authentication). Canonical definition lives here in
/// mosaic-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: CurrentUser,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Full profile view with derived counts.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

/// User listing entry with derived counts (GET /users).
#[derive(Debug, Serialize, Deserialize)]
pub struct UserWithCounts {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub user: UserSummary,
    pub image_url: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<PostResponse>,
    pub page: u32,
    pub limit: u32,
}

/// Single-post view: the post plus its most recent comments.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub comments: Vec<CommentResponse>,
}

/// Profile-grid entry: image plus counts, no author block.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostGridItem {
    pub id: Uuid,
    pub image_url: String,
    pub likes_count: i64,
    pub comments_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub participants: Vec<ParticipantSummary>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesPage {
    pub messages: Vec<MessageResponse>,
    pub page: u32,
    pub limit: u32,
}

// -- Uploads --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub size: u64,
}
