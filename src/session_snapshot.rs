//! Last-session state restored at startup.

use crate::preferences::{PersistenceError, PreferenceStore};
use crate::queue_controller::QueueSource;

pub const LAST_TRACK_ID_KEY: &str = "lastTrackId";
pub const LAST_TAB_INDEX_KEY: &str = "lastTabIndex";
pub const LAST_QUEUE_SOURCE_KEY: &str = "lastQueueSource";
pub const LAST_PLAYLIST_ID_KEY: &str = "lastPlaylistId";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub last_track_id: Option<u64>,
    pub last_tab_index: u32,
    pub last_queue_source: QueueSource,
}

impl SessionSnapshot {
    /// Reads the snapshot. Absent or malformed keys fall back to defaults:
    /// no track, first tab, all songs.
    pub fn load(store: &PreferenceStore) -> Self {
        let last_track_id = store
            .get_i64(LAST_TRACK_ID_KEY)
            .filter(|id| *id >= 0)
            .map(|id| id as u64);
        let last_tab_index = store
            .get_i64(LAST_TAB_INDEX_KEY)
            .and_then(|index| u32::try_from(index).ok())
            .unwrap_or(0);
        let last_queue_source = store
            .get_string(LAST_QUEUE_SOURCE_KEY)
            .and_then(|tag| {
                QueueSource::from_tag(
                    tag,
                    store.get_string(LAST_PLAYLIST_ID_KEY).map(str::to_string),
                )
            })
            .unwrap_or_default();
        Self {
            last_track_id,
            last_tab_index,
            last_queue_source,
        }
    }

    /// Stages the snapshot in `store` and commits it. The playlist id is only
    /// kept while the queue source is a playlist.
    pub fn save(&self, store: &mut PreferenceStore) -> Result<(), PersistenceError> {
        match self.last_track_id {
            Some(track_id) => store.put_i64(LAST_TRACK_ID_KEY, track_id as i64),
            None => store.put_i64(LAST_TRACK_ID_KEY, -1),
        }
        store.put_i64(LAST_TAB_INDEX_KEY, i64::from(self.last_tab_index));
        store.put_string(LAST_QUEUE_SOURCE_KEY, self.last_queue_source.tag());
        match self.last_queue_source.playlist_id() {
            Some(playlist_id) => store.put_string(LAST_PLAYLIST_ID_KEY, playlist_id),
            None => store.remove(LAST_PLAYLIST_ID_KEY),
        }
        store.commit()
    }
}
