use rusqlite::{Connection, params};

use crate::models::{
    CommentRow, ConversationRow, MessageRow, ParticipantRow, PostGridRow, PostRow, ProfileRow,
    UserRow, UserSummaryRow, UserWithCountsRow,
};
use crate::{conflict_on_constraint, Database, DbError, DbResult};

impl Database {
    // -- Users --

    #[allow(clippy::too_many_arguments)]
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, full_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, username, email, password_hash, full_name, created_at],
            )
            .map_err(|e| conflict_on_constraint(e, "username or email already taken"))?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    /// Partial profile update — absent fields keep their current value.
    pub fn update_user_profile(
        &self,
        id: &str,
        username: Option<&str>,
        full_name: Option<&str>,
        bio: Option<&str>,
        avatar: Option<&str>,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            let affected = conn
                .execute(
                    "UPDATE users SET
                        username  = COALESCE(?2, username),
                        full_name = COALESCE(?3, full_name),
                        bio       = COALESCE(?4, bio),
                        avatar    = COALESCE(?5, avatar)
                     WHERE id = ?1",
                    params![id, username, full_name, bio, avatar],
                )
                .map_err(|e| conflict_on_constraint(e, "username already taken"))?;
            if affected == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    /// Presence flip. `last_seen` is only recorded when going offline.
    pub fn set_online(&self, id: &str, online: bool, last_seen: Option<&str>) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET is_online = ?2, last_seen = COALESCE(?3, last_seen) WHERE id = ?1",
                params![id, online as i64, last_seen],
            )?;
            Ok(())
        })
    }

    pub fn search_users(&self, q: &str, limit: u32, offset: u32) -> DbResult<Vec<UserSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, full_name, avatar FROM users
                 WHERE username LIKE '%' || ?1 || '%' OR full_name LIKE '%' || ?1 || '%'
                 ORDER BY username
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![q, limit, offset], |row| {
                    Ok(UserSummaryRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                        avatar: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_users(&self, limit: u32, offset: u32) -> DbResult<Vec<UserWithCountsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.avatar, u.bio, u.is_online,
                        (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id),
                        (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id),
                        (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id)
                 FROM users u
                 ORDER BY u.created_at DESC, u.id DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(params![limit, offset], |row| {
                    Ok(UserWithCountsRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                        avatar: row.get(3)?,
                        bio: row.get(4)?,
                        is_online: row.get(5)?,
                        posts_count: row.get(6)?,
                        followers_count: row.get(7)?,
                        following_count: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_profile(&self, id: &str) -> DbResult<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.bio, u.avatar, u.is_online,
                        u.last_seen, u.created_at,
                        (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id),
                        (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id),
                        (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id)
                 FROM users u WHERE u.id = ?1",
            )?;
            stmt.query_row([id], |row| {
                Ok(ProfileRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    full_name: row.get(2)?,
                    bio: row.get(3)?,
                    avatar: row.get(4)?,
                    is_online: row.get(5)?,
                    last_seen: row.get(6)?,
                    created_at: row.get(7)?,
                    posts_count: row.get(8)?,
                    followers_count: row.get(9)?,
                    following_count: row.get(10)?,
                })
            })
            .optional()
        })
    }

    // -- Follows --

    pub fn insert_follow(
        &self,
        id: &str,
        follower_id: &str,
        following_id: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO follows (id, follower_id, following_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, follower_id, following_id, created_at],
            )
            .map_err(|e| conflict_on_constraint(e, "already following this user"))?;
            Ok(())
        })
    }

    pub fn delete_follow(&self, follower_id: &str, following_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                params![follower_id, following_id],
            )?;
            if affected == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    pub fn is_following(&self, follower_id: &str, following_id: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
                params![follower_id, following_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_followers(&self, user_id: &str, limit: u32, offset: u32) -> DbResult<Vec<UserSummaryRow>> {
        self.with_conn(|conn| query_follow_edge(conn, user_id, limit, offset, true))
    }

    pub fn get_following(&self, user_id: &str, limit: u32, offset: u32) -> DbResult<Vec<UserSummaryRow>> {
        self.with_conn(|conn| query_follow_edge(conn, user_id, limit, offset, false))
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        user_id: &str,
        image_url: &str,
        caption: Option<&str>,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, image_url, caption, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, image_url, caption, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_post_owner(&self, id: &str) -> DbResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT user_id FROM posts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    pub fn delete_post(&self, id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    /// Feed: posts authored by the viewer or by accounts they follow,
    /// newest first, annotated in a single pass (no N+1).
    pub fn get_feed(&self, viewer_id: &str, limit: u32, offset: u32) -> DbResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT}
                 WHERE p.user_id = ?1
                    OR p.user_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3",
            ))?;
            let rows = stmt
                .query_map(params![viewer_id, limit, offset], map_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Single post, annotated for an optional viewer (`is_liked` is false
    /// when unauthenticated).
    pub fn get_post(&self, id: &str, viewer_id: Option<&str>) -> DbResult<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{POST_SELECT} WHERE p.id = ?2"))?;
            stmt.query_row(params![viewer_id, id], map_post_row).optional()
        })
    }

    pub fn get_user_posts(&self, user_id: &str, limit: u32, offset: u32) -> DbResult<Vec<PostGridRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.image_url,
                        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
                        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id)
                 FROM posts p
                 WHERE p.user_id = ?1
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit, offset], |row| {
                    Ok(PostGridRow {
                        id: row.get(0)?,
                        image_url: row.get(1)?,
                        likes_count: row.get(2)?,
                        comments_count: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    pub fn insert_like(
        &self,
        id: &str,
        user_id: &str,
        post_id: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO likes (id, user_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, post_id, created_at],
            )
            .map_err(|e| conflict_on_constraint(e, "already liked this post"))?;
            Ok(())
        })
    }

    pub fn delete_like(&self, user_id: &str, post_id: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id, post_id],
            )?;
            if affected == 0 {
                return Err(DbError::NotFound);
            }
            Ok(())
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        user_id: &str,
        post_id: &str,
        content: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, user_id, post_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, post_id, content, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_comments_for_post(&self, post_id: &str, limit: u32) -> DbResult<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.user_id, u.username, u.full_name, u.avatar,
                        c.content, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![post_id, limit], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author: UserSummaryRow {
                            id: row.get(2)?,
                            username: row.get(3)?,
                            full_name: row.get(4)?,
                            avatar: row.get(5)?,
                        },
                        content: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Conversations --

    pub fn insert_conversation(
        &self,
        id: &str,
        is_group: bool,
        group_name: Option<&str>,
        now: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, is_group, group_name, updated_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, is_group as i64, group_name, now],
            )?;
            Ok(())
        })
    }

    pub fn insert_participant(
        &self,
        id: &str,
        conversation_id: &str,
        user_id: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_participants (id, conversation_id, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, conversation_id, user_id, created_at],
            )
            .map_err(|e| conflict_on_constraint(e, "already a participant"))?;
            Ok(())
        })
    }

    pub fn get_conversation(&self, id: &str) -> DbResult<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, is_group, group_name, updated_at, created_at
                 FROM conversations WHERE id = ?1",
                [id],
                map_conversation_row,
            )
            .optional()
        })
    }

    /// Existing 1:1 conversation between two users, if any.
    pub fn find_direct_conversation(&self, a: &str, b: &str) -> DbResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id FROM conversations c
                 WHERE c.is_group = 0
                   AND EXISTS (SELECT 1 FROM conversation_participants p
                               WHERE p.conversation_id = c.id AND p.user_id = ?1)
                   AND EXISTS (SELECT 1 FROM conversation_participants p
                               WHERE p.conversation_id = c.id AND p.user_id = ?2)
                 LIMIT 1",
                params![a, b],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM conversation_participants
                               WHERE conversation_id = ?1 AND user_id = ?2)",
                params![conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_user_conversations(&self, user_id: &str) -> DbResult<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.is_group, c.group_name, c.updated_at, c.created_at
                 FROM conversations c
                 JOIN conversation_participants cp ON cp.conversation_id = c.id
                 WHERE cp.user_id = ?1
                 ORDER BY c.updated_at DESC, c.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_participants(&self, conversation_id: &str) -> DbResult<Vec<ParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.full_name, u.avatar, u.is_online, u.last_seen
                 FROM conversation_participants cp
                 JOIN users u ON u.id = cp.user_id
                 WHERE cp.conversation_id = ?1",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(ParticipantRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                        avatar: row.get(3)?,
                        is_online: row.get(4)?,
                        last_seen: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn touch_conversation(&self, id: &str, now: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        created_at: &str,
    ) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, conversation_id, sender_id, content, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> DbResult<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
                [id],
                map_message_row,
            )
            .optional()
        })
    }

    pub fn get_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2 OFFSET ?3",
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, limit, offset], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_last_message(&self, conversation_id: &str) -> DbResult<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "{MESSAGE_SELECT}
                     WHERE m.conversation_id = ?1
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT 1",
                ),
                [conversation_id],
                map_message_row,
            )
            .optional()
        })
    }

    pub fn unread_count(&self, conversation_id: &str, user_id: &str) -> DbResult<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Flips the other participants' unread messages to read. Never touches
    /// the reader's own messages. Returns the number of rows flipped.
    pub fn mark_read(&self, conversation_id: &str, reader_id: &str) -> DbResult<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![conversation_id, reader_id],
            )?;
            Ok(affected)
        })
    }
}

/// Shared post projection: author block plus derived annotations.
/// `?1` is the (nullable) viewer id used for `is_liked`.
const POST_SELECT: &str = "SELECT p.id, p.user_id, u.username, u.full_name, u.avatar,
        p.image_url, p.caption, p.created_at,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id),
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1)
 FROM posts p
 JOIN users u ON u.id = p.user_id";

fn map_post_row(row: &rusqlite::Row<'_>) -> std::result::Result<PostRow, rusqlite::Error> {
    Ok(PostRow {
        id: row.get(0)?,
        author: UserSummaryRow {
            id: row.get(1)?,
            username: row.get(2)?,
            full_name: row.get(3)?,
            avatar: row.get(4)?,
        },
        image_url: row.get(5)?,
        caption: row.get(6)?,
        created_at: row.get(7)?,
        likes_count: row.get(8)?,
        comments_count: row.get(9)?,
        is_liked: row.get(10)?,
    })
}

/// Shared message projection with the sender block joined in (no N+1).
const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, u.username,
        u.full_name, u.avatar, m.content, m.is_read, m.created_at
 FROM messages m
 JOIN users u ON u.id = m.sender_id";

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender: UserSummaryRow {
            id: row.get(2)?,
            username: row.get(3)?,
            full_name: row.get(4)?,
            avatar: row.get(5)?,
        },
        content: row.get(6)?,
        is_read: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_conversation_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get(0)?,
        is_group: row.get(1)?,
        group_name: row.get(2)?,
        updated_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> DbResult<Option<UserRow>> {
    // `column` is one of a fixed set of identifiers, never user input.
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, email, password, full_name, avatar, bio, is_online,
                last_seen, created_at
         FROM users WHERE {column} = ?1",
    ))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            full_name: row.get(4)?,
            avatar: row.get(5)?,
            bio: row.get(6)?,
            is_online: row.get(7)?,
            last_seen: row.get(8)?,
            created_at: row.get(9)?,
        })
    })
    .optional()
}

fn query_follow_edge(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
    followers: bool,
) -> DbResult<Vec<UserSummaryRow>> {
    let sql = if followers {
        "SELECT u.id, u.username, u.full_name, u.avatar
         FROM follows f JOIN users u ON u.id = f.follower_id
         WHERE f.following_id = ?1
         ORDER BY f.created_at DESC, f.id DESC
         LIMIT ?2 OFFSET ?3"
    } else {
        "SELECT u.id, u.username, u.full_name, u.avatar
         FROM follows f JOIN users u ON u.id = f.following_id
         WHERE f.follower_id = ?1
         ORDER BY f.created_at DESC, f.id DESC
         LIMIT ?2 OFFSET ?3"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user_id, limit, offset], |row| {
            Ok(UserSummaryRow {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                avatar: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> DbResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> DbResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
