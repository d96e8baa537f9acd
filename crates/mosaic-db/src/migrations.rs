use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            full_name   TEXT NOT NULL,
            avatar      TEXT,
            bio         TEXT,
            is_online   INTEGER NOT NULL DEFAULT 0,
            last_seen   TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            image_url   TEXT NOT NULL,
            caption     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id, created_at);

        CREATE TABLE IF NOT EXISTS likes (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, post_id)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_post
            ON likes(post_id);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        CREATE TABLE IF NOT EXISTS follows (
            id            TEXT PRIMARY KEY,
            follower_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            following_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(follower_id, following_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_following
            ON follows(following_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            is_group    INTEGER NOT NULL DEFAULT 0,
            group_name  TEXT,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(conversation_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_participants_user
            ON conversation_participants(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content          TEXT NOT NULL,
            is_read          INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
