//! Small persistent key-value stores backed by pretty-printed JSON files.
//!
//! Each store lives in its own file (`session.json`, `library.json`,
//! `equalizer.json`). Values are staged in memory and written by `commit`.

use std::path::{Path, PathBuf};

use log::warn;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Writes `contents` next to `path` and renames it into place.
pub fn write_file_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let write_error = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    let staging_path = path.with_extension("json.tmp");
    std::fs::write(&staging_path, contents).map_err(write_error)?;
    std::fs::rename(&staging_path, path).map_err(write_error)
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl PreferenceStore {
    /// Opens a store. A missing file is an empty store; an unreadable or
    /// corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(values) => values,
                Err(err) => {
                    warn!(
                        "PreferenceStore: ignoring corrupt store {}: {}",
                        path.display(),
                        err
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                warn!(
                    "PreferenceStore: failed to read {}: {}",
                    path.display(),
                    err
                );
                Map::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn put_i64(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn put_string_list(&mut self, key: &str, values: &[String]) {
        self.values.insert(
            key.to_string(),
            Value::Array(values.iter().cloned().map(Value::String).collect()),
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn commit(&self) -> Result<(), PersistenceError> {
        let text = serde_json::to_string_pretty(&self.values).map_err(|source| {
            PersistenceError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        write_file_atomically(&self.path, text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::PreferenceStore;

    #[test]
    fn test_committed_values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs/session.json");

        let mut store = PreferenceStore::open(&path);
        store.put_i64("lastTrackId", 42);
        store.put_string("lastQueueSource", "Favorites");
        store.put_string_list("favorites", &["b".to_string(), "a".to_string()]);
        store.commit().expect("commit");

        let reopened = PreferenceStore::open(&path);
        assert_eq!(reopened.get_i64("lastTrackId"), Some(42));
        assert_eq!(reopened.get_string("lastQueueSource"), Some("Favorites"));
        assert_eq!(reopened.get_string_list("favorites"), vec!["b", "a"]);
    }

    #[test]
    fn test_missing_and_corrupt_stores_open_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = PreferenceStore::open(dir.path().join("none.json"));
        assert_eq!(missing.get_i64("lastTrackId"), None);

        let corrupt_path = dir.path().join("corrupt.json");
        std::fs::write(&corrupt_path, "{not json").expect("write");
        let corrupt = PreferenceStore::open(&corrupt_path);
        assert_eq!(corrupt.get_i64("lastTrackId"), None);
        assert!(corrupt.get_string_list("favorites").is_empty());
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = PreferenceStore::open(dir.path().join("s.json"));
        store.put_string("lastTabIndex", "two");
        assert_eq!(store.get_i64("lastTabIndex"), None);
        store.remove("lastTabIndex");
        assert_eq!(store.get_string("lastTabIndex"), None);
    }
}
