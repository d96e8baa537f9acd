use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compact user representation embedded in posts, comments, and messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

/// The authenticated user's own record, password omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Participant listing inside a conversation — carries presence so the
/// client can render online dots without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}
