//! Favorites and playlists.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::playlist_store::{Playlist, PlaylistStore};
use crate::preferences::{PersistenceError, PreferenceStore};

pub const FAVORITES_KEY: &str = "favorites";

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("no playlist with id {0}")]
    UnknownPlaylist(String),
    #[error("playlist name must not be empty")]
    EmptyPlaylistName,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// User library state. Every mutation is persisted before it returns.
pub struct MusicLibrary {
    preferences: PreferenceStore,
    playlist_store: PlaylistStore,
    favorites: Vec<String>,
    playlists: Vec<Playlist>,
}

fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

impl MusicLibrary {
    pub fn load(preferences: PreferenceStore, playlist_store: PlaylistStore) -> Self {
        let mut favorites: Vec<String> = Vec::new();
        for locator in preferences.get_string_list(FAVORITES_KEY) {
            if !favorites.contains(&locator) {
                favorites.push(locator);
            }
        }
        let playlists = playlist_store.load();
        Self {
            preferences,
            playlist_store,
            favorites,
            playlists,
        }
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, playlist_id: &str) -> Option<&Playlist> {
        self.playlists
            .iter()
            .find(|playlist| playlist.id == playlist_id)
    }

    pub fn is_favorite(&self, locator: &str) -> bool {
        self.favorites.iter().any(|favorite| favorite == locator)
    }

    /// Persists `next` and adopts it only once it is on disk.
    fn save_favorites(&mut self, next: Vec<String>) -> Result<(), PersistenceError> {
        self.preferences.put_string_list(FAVORITES_KEY, &next);
        if let Err(err) = self.preferences.commit() {
            self.preferences
                .put_string_list(FAVORITES_KEY, &self.favorites);
            return Err(err);
        }
        self.favorites = next;
        Ok(())
    }

    pub fn add_favorite(&mut self, locator: &str) -> Result<bool, LibraryError> {
        if self.is_favorite(locator) {
            return Ok(false);
        }
        let mut next = self.favorites.clone();
        next.push(locator.to_string());
        self.save_favorites(next)?;
        Ok(true)
    }

    pub fn remove_favorite(&mut self, locator: &str) -> Result<bool, LibraryError> {
        if !self.is_favorite(locator) {
            return Ok(false);
        }
        let next = self
            .favorites
            .iter()
            .filter(|favorite| favorite.as_str() != locator)
            .cloned()
            .collect();
        self.save_favorites(next)?;
        Ok(true)
    }

    /// Returns whether the locator is a favorite afterwards.
    pub fn toggle_favorite(&mut self, locator: &str) -> Result<bool, LibraryError> {
        if self.is_favorite(locator) {
            self.remove_favorite(locator)?;
            Ok(false)
        } else {
            self.add_favorite(locator)?;
            Ok(true)
        }
    }

    fn next_playlist_id(&self) -> String {
        let mut candidate = current_time_millis();
        while self.playlist(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        candidate.to_string()
    }

    fn save_playlists(&mut self, next: Vec<Playlist>) -> Result<(), PersistenceError> {
        self.playlist_store.save(&next)?;
        self.playlists = next;
        Ok(())
    }

    /// Applies `change` to a copy of the named playlist and saves the result
    /// when `change` reports a modification.
    fn update_playlist<F>(&mut self, playlist_id: &str, change: F) -> Result<bool, LibraryError>
    where
        F: FnOnce(&mut Playlist) -> bool,
    {
        let mut next = self.playlists.clone();
        let playlist = next
            .iter_mut()
            .find(|playlist| playlist.id == playlist_id)
            .ok_or_else(|| LibraryError::UnknownPlaylist(playlist_id.to_string()))?;
        if !change(playlist) {
            return Ok(false);
        }
        self.save_playlists(next)?;
        Ok(true)
    }

    pub fn create_playlist(&mut self, name: &str) -> Result<Playlist, LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyPlaylistName);
        }
        let playlist = Playlist {
            id: self.next_playlist_id(),
            name: name.to_string(),
            songs: Vec::new(),
        };
        let mut next = self.playlists.clone();
        next.push(playlist.clone());
        self.save_playlists(next)?;
        Ok(playlist)
    }

    pub fn add_to_playlist(&mut self, playlist_id: &str, locator: &str) -> Result<bool, LibraryError> {
        self.update_playlist(playlist_id, |playlist| playlist.add_song(locator))
    }

    pub fn remove_from_playlist(
        &mut self,
        playlist_id: &str,
        locator: &str,
    ) -> Result<bool, LibraryError> {
        self.update_playlist(playlist_id, |playlist| playlist.remove_song(locator))
    }

    pub fn rename_playlist(&mut self, playlist_id: &str, name: &str) -> Result<(), LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::EmptyPlaylistName);
        }
        self.update_playlist(playlist_id, |playlist| {
            playlist.name = name.to_string();
            true
        })?;
        Ok(())
    }

    pub fn delete_playlist(&mut self, playlist_id: &str) -> Result<(), LibraryError> {
        if self.playlist(playlist_id).is_none() {
            return Err(LibraryError::UnknownPlaylist(playlist_id.to_string()));
        }
        let next = self
            .playlists
            .iter()
            .filter(|playlist| playlist.id != playlist_id)
            .cloned()
            .collect();
        self.save_playlists(next)?;
        Ok(())
    }
}
