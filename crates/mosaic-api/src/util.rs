use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use mosaic_db::models::{MessageRow, ParticipantRow, PostRow, UserRow, UserSummaryRow};
use mosaic_types::api::MessageResponse;
use mosaic_types::models::{CurrentUser, ParticipantSummary, UserSummary};

/// Offset/limit pagination, page starting at 1, limit capped at 100.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_limit() -> u32 {
    20
}

impl Pagination {
    /// Returns (page, limit, offset) with bounds applied.
    pub fn clamp(&self) -> (u32, u32, u32) {
        let page = self.page.max(1);
        let limit = self.limit.clamp(1, 100);
        (page, limit, (page - 1) * limit)
    }
}

/// Current instant plus its RFC 3339 text form as stored in SQLite.
/// Microsecond precision keeps feed ordering stable across fast inserts.
pub(crate) fn now_ts() -> (DateTime<Utc>, String) {
    let now = Utc::now();
    let text = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    (now, text)
}

/// Rows written by handlers carry RFC 3339; rows created through the
/// schema's `datetime('now')` default are "YYYY-MM-DD HH:MM:SS" without
/// timezone. Accept both.
pub(crate) fn parse_ts(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub(crate) fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

// -- Row-to-DTO conversions shared across handler modules --

pub(crate) fn user_summary(row: UserSummaryRow) -> UserSummary {
    UserSummary {
        id: parse_uuid(&row.id, "user"),
        username: row.username,
        full_name: row.full_name,
        avatar: row.avatar,
    }
}

pub(crate) fn current_user(row: UserRow) -> CurrentUser {
    CurrentUser {
        id: parse_uuid(&row.id, "user"),
        username: row.username,
        email: row.email,
        full_name: row.full_name,
        avatar: row.avatar,
        bio: row.bio,
        created_at: parse_ts(&row.created_at, "user"),
    }
}

pub(crate) fn participant_summary(row: ParticipantRow) -> ParticipantSummary {
    ParticipantSummary {
        id: parse_uuid(&row.user_id, "participant"),
        username: row.username,
        full_name: row.full_name,
        avatar: row.avatar,
        is_online: row.is_online,
        last_seen: row.last_seen.as_deref().map(|ts| parse_ts(ts, "participant")),
    }
}

pub(crate) fn post_response(row: PostRow) -> mosaic_types::api::PostResponse {
    mosaic_types::api::PostResponse {
        id: parse_uuid(&row.id, "post"),
        user: user_summary(row.author),
        image_url: row.image_url,
        caption: row.caption,
        created_at: parse_ts(&row.created_at, "post"),
        likes_count: row.likes_count,
        comments_count: row.comments_count,
        is_liked: row.is_liked,
    }
}

pub(crate) fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id, "message"),
        conversation_id: parse_uuid(&row.conversation_id, "message"),
        sender: user_summary(row.sender),
        content: row.content,
        is_read: row.is_read,
        created_at: parse_ts(&row.created_at, "message"),
    }
}
