/// Database row types — these map directly to SQLite rows.
/// Distinct from mosaic-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
}

/// Compact author block pulled in via JOIN.
pub struct UserSummaryRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

pub struct UserWithCountsRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub is_online: bool,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

/// Post with author block and derived annotations, as produced by the
/// feed/detail queries in a single pass.
pub struct PostRow {
    pub id: String,
    pub author: UserSummaryRow,
    pub image_url: String,
    pub caption: Option<String>,
    pub created_at: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
}

/// Profile-grid entry: no author block, counts only.
pub struct PostGridRow {
    pub id: String,
    pub image_url: String,
    pub likes_count: i64,
    pub comments_count: i64,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author: UserSummaryRow,
    pub content: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub is_group: bool,
    pub group_name: Option<String>,
    pub updated_at: String,
    pub created_at: String,
}

pub struct ParticipantRow {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender: UserSummaryRow,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}
