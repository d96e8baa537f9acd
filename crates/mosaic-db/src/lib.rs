pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

/// Typed persistence errors. Uniqueness violations surface as `Conflict`
/// so handlers can map them to 409 without inspecting SQLite codes.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("database lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }
}

/// Maps a unique-constraint failure to `Conflict`, leaving other SQLite
/// errors untouched.
pub(crate) fn conflict_on_constraint(err: rusqlite::Error, what: &'static str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Conflict(what)
        }
        _ => DbError::Sqlite(err),
    }
}
