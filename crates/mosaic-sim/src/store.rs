use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::SimResult;

/// Directory of `<key>.json` documents standing in for browser local
/// storage. Reads and writes are synchronous and unguarded: the last
/// writer wins, and two processes sharing a directory can race.
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    pub fn open(dir: &Path) -> SimResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> SimResult<Option<T>> {
        match fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Missing key reads as the type's default — an absent collection is an
    /// empty collection.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> SimResult<T> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> SimResult<()> {
        fs::write(self.path(key), serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> SimResult<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();

        let values: Vec<String> = store.get_or_default("nothing").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();

        store.set("items", &vec!["a".to_string()]).unwrap();
        store.set("items", &vec!["b".to_string(), "c".to_string()]).unwrap();

        let items: Vec<String> = store.get_or_default("items").unwrap();
        assert_eq!(items, vec!["b", "c"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path()).unwrap();

        store.set("flag", &true).unwrap();
        store.remove("flag").unwrap();
        store.remove("flag").unwrap();
        assert_eq!(store.get::<bool>("flag").unwrap(), None);
    }
}
