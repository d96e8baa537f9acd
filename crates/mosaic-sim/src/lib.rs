//! Single-device simulation store: a file-backed approximation of the
//! social domain with multiple local accounts, posts, stories, notes, and a
//! message-request workflow. Collections are plain JSON documents with
//! last-write-wins semantics and no referential integrity. This crate is
//! independent of the server-side crates and shares no types with the REST
//! surface.

pub mod accounts;
pub mod feed;
pub mod requests;
pub mod seed;
pub mod store;

use std::path::Path;

use thiserror::Error;

use crate::store::KvStore;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type SimResult<T> = std::result::Result<T, SimError>;

/// Handle over the on-disk collections. Cheap to construct; every call
/// reads and rewrites whole collections, exactly like the browser storage
/// it models.
pub struct Simulation {
    store: KvStore,
}

impl Simulation {
    pub fn open(dir: &Path) -> SimResult<Self> {
        Ok(Self {
            store: KvStore::open(dir)?,
        })
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }
}
