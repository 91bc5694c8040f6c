//! `playlists.json` persistence. The file is rewritten wholesale on every
//! mutation.

use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::preferences::{write_file_atomically, PersistenceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Track locators in playlist order, without duplicates.
    #[serde(default)]
    pub songs: Vec<String>,
}

impl Playlist {
    /// Appends a locator unless it is already present. Returns whether the
    /// playlist changed.
    pub fn add_song(&mut self, locator: &str) -> bool {
        if self.songs.iter().any(|song| song == locator) {
            return false;
        }
        self.songs.push(locator.to_string());
        true
    }

    pub fn remove_song(&mut self, locator: &str) -> bool {
        let before = self.songs.len();
        self.songs.retain(|song| song != locator);
        self.songs.len() != before
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistStore {
    path: PathBuf,
}

impl PlaylistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads all playlists. A missing file means no playlists; a corrupt one
    /// is logged and also yields none.
    pub fn load(&self) -> Vec<Playlist> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "PlaylistStore: failed to read {}: {}",
                        self.path.display(),
                        err
                    );
                }
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Playlist>>(&text) {
            Ok(playlists) => playlists,
            Err(err) => {
                warn!(
                    "PlaylistStore: failed to parse {}: {}",
                    self.path.display(),
                    err
                );
                Vec::new()
            }
        }
    }

    pub fn save(&self, playlists: &[Playlist]) -> Result<(), PersistenceError> {
        let text = serde_json::to_string_pretty(playlists).map_err(|source| {
            PersistenceError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        write_file_atomically(&self.path, text.as_bytes())
    }
}
