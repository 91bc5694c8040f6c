//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the catalog
//! loader, the playback coordinator, the media engine, the media session
//! service and the console front end.

use std::path::PathBuf;

use crate::catalog::{FolderEntry, Track};
use crate::media_engine::EngineEvent;
use crate::playlist_store::Playlist;
use crate::queue_controller::QueueSource;
use crate::session_bridge::PlayerUiState;
use crate::session_snapshot::SessionSnapshot;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Playback(PlaybackMessage),
    Engine(EngineEvent),
    Session(SessionMessage),
    Library(LibraryMessage),
    Service(ServiceMessage),
}

/// Commands executed by the playback coordinator, the only engine writer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMessage {
    /// Rebuild the active queue from `source` and start `track_id`.
    PlayTrack {
        track_id: u64,
        source: QueueSource,
    },
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    SeekTo(u64),
    Stop,
    SelectTab(u32),
    /// Position poller tick.
    PollPosition,
    ReleaseEngine,
    Shutdown,
}

/// Transport state as mirrored by the media session service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// Observable session state published by the coordinator.
#[derive(Debug, Clone)]
pub enum SessionMessage {
    UiStateChanged(PlayerUiState),
    Transport(TransportSnapshot),
    TrackInfoChanged { title: String, artist: String },
    SessionRestored(SessionSnapshot),
    /// Recoverable condition worth surfacing to the user.
    Diagnostic(String),
}

/// Catalog and library-state traffic.
#[derive(Debug, Clone)]
pub enum LibraryMessage {
    RequestCatalog,
    /// Replaces the scanned folders; takes effect on the next `RequestCatalog`.
    SetLibraryFolders(Vec<PathBuf>),
    CatalogLoadStarted,
    CatalogLoaded(Vec<Track>),
    ListFolder(PathBuf),
    FolderListed {
        folder: PathBuf,
        entries: Vec<FolderEntry>,
    },
    ToggleFavorite(u64),
    CreatePlaylist(String),
    AddToPlaylist {
        playlist_id: String,
        track_id: u64,
    },
    RemoveFromPlaylist {
        playlist_id: String,
        track_id: u64,
    },
    RenamePlaylist {
        playlist_id: String,
        name: String,
    },
    DeletePlaylist(String),
    FavoritesChanged(Vec<String>),
    PlaylistsChanged(Vec<Playlist>),
}

/// Commands accepted from the notification and the system media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceIntent {
    Play,
    Pause,
    Previous,
    Next,
}

impl ServiceIntent {
    pub const ACTION_PLAY: &'static str = "play";
    pub const ACTION_PAUSE: &'static str = "pause";
    pub const ACTION_PREVIOUS: &'static str = "previous";
    pub const ACTION_NEXT: &'static str = "next";

    pub fn action_id(self) -> &'static str {
        match self {
            Self::Play => Self::ACTION_PLAY,
            Self::Pause => Self::ACTION_PAUSE,
            Self::Previous => Self::ACTION_PREVIOUS,
            Self::Next => Self::ACTION_NEXT,
        }
    }

    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            Self::ACTION_PLAY => Some(Self::Play),
            Self::ACTION_PAUSE => Some(Self::Pause),
            Self::ACTION_PREVIOUS => Some(Self::Previous),
            Self::ACTION_NEXT => Some(Self::Next),
            _ => None,
        }
    }

    /// Playback command the intent translates to.
    pub fn playback_message(self) -> PlaybackMessage {
        match self {
            Self::Play => PlaybackMessage::Play,
            Self::Pause => PlaybackMessage::Pause,
            Self::Previous => PlaybackMessage::Previous,
            Self::Next => PlaybackMessage::Next,
        }
    }
}

/// Lifecycle traffic for the background media session service.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceMessage {
    /// The engine is live and the service should bind to it.
    EngineAttached,
    Intent(ServiceIntent),
    /// Periodic notification refresh while playing.
    RefreshTick,
    /// Host task went away; playback is force-stopped.
    TaskRemoved,
    Stop,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::{PlaybackMessage, ServiceIntent};

    #[test]
    fn test_service_intent_action_ids_resolve_back_to_intents() {
        for intent in [
            ServiceIntent::Play,
            ServiceIntent::Pause,
            ServiceIntent::Previous,
            ServiceIntent::Next,
        ] {
            assert_eq!(ServiceIntent::from_action_id(intent.action_id()), Some(intent));
        }
        assert_eq!(ServiceIntent::from_action_id("rewind"), None);
    }

    #[test]
    fn test_service_intent_maps_to_playback_commands() {
        assert_eq!(
            ServiceIntent::Previous.playback_message(),
            PlaybackMessage::Previous
        );
        assert_eq!(ServiceIntent::Pause.playback_message(), PlaybackMessage::Pause);
    }
}
