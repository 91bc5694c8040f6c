//! Active queue construction and previous/next navigation.
//!
//! The active queue is rebuilt from scratch on every activation and mirrors
//! the engine's media items one to one. Only the playback coordinator thread
//! calls into this module, so activations and advances never interleave.

use std::fmt;

use log::{debug, warn};

use crate::catalog::{find_track_by_locator, Track};
use crate::media_engine::{EngineError, MediaEngine, MediaItem};

/// Position after which "previous" restarts the current track instead.
pub const PREVIOUS_RESTART_THRESHOLD_MS: u64 = 3_000;

/// The list a queue was built from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueueSource {
    #[default]
    AllSongs,
    Favorites,
    Playlist(String),
}

impl QueueSource {
    pub const ALL_SONGS_TAG: &'static str = "AllSongs";
    pub const FAVORITES_TAG: &'static str = "Favorites";
    pub const PLAYLIST_TAG: &'static str = "Playlist";

    pub fn tag(&self) -> &'static str {
        match self {
            Self::AllSongs => Self::ALL_SONGS_TAG,
            Self::Favorites => Self::FAVORITES_TAG,
            Self::Playlist(_) => Self::PLAYLIST_TAG,
        }
    }

    pub fn playlist_id(&self) -> Option<&str> {
        match self {
            Self::Playlist(id) => Some(id),
            _ => None,
        }
    }

    /// Rebuilds a source from its persisted tag. A playlist tag without an
    /// id is not a valid source.
    pub fn from_tag(tag: &str, playlist_id: Option<String>) -> Option<Self> {
        match tag {
            Self::ALL_SONGS_TAG => Some(Self::AllSongs),
            Self::FAVORITES_TAG => Some(Self::Favorites),
            Self::PLAYLIST_TAG => playlist_id
                .filter(|id| !id.is_empty())
                .map(Self::Playlist),
            _ => None,
        }
    }
}

impl fmt::Display for QueueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playlist(id) => write!(f, "playlist {}", id),
            other => f.write_str(other.tag()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// "Previous" past the restart threshold: same track, position zero.
    Restarted,
    Moved {
        index: usize,
        track: Track,
    },
    /// The engine moved but its item is not in the active queue. The
    /// selection is left as it was.
    Unresolved {
        index: usize,
        locator: Option<String>,
    },
    /// No neighbour in that direction.
    AtBoundary,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("track {track_id} is not part of the {queue_source} list")]
    TrackNotInSource {
        track_id: u64,
        queue_source: QueueSource,
    },
    #[error("the active queue is empty")]
    EmptyQueue,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveQueue {
    pub source: QueueSource,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Default)]
pub struct QueueController {
    active: ActiveQueue,
}

fn media_item_for(track: &Track) -> MediaItem {
    MediaItem {
        media_id: track.id.to_string(),
        uri: track.locator.clone(),
    }
}

fn load_engine(
    engine: &mut dyn MediaEngine,
    tracks: &[Track],
    index: usize,
    start_playback: bool,
) -> Result<(), EngineError> {
    requeue(engine, tracks, Some(index))?;
    engine.prepare()?;
    if start_playback {
        engine.play()?;
    }
    Ok(())
}

fn requeue(
    engine: &mut dyn MediaEngine,
    tracks: &[Track],
    index: Option<usize>,
) -> Result<(), EngineError> {
    engine.stop()?;
    engine.clear_media_items()?;
    for track in tracks {
        engine.add_media_item(media_item_for(track))?;
    }
    match index {
        Some(index) if index < tracks.len() => engine.seek_to_item(index, 0),
        _ => Ok(()),
    }
}

impl QueueController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_queue(&self) -> &ActiveQueue {
        &self.active
    }

    /// Replaces the engine queue with `source_list` and starts `selected`.
    pub fn activate_queue(
        &mut self,
        engine: &mut dyn MediaEngine,
        selected: &Track,
        source_list: Vec<Track>,
        source: QueueSource,
    ) -> Result<usize, QueueError> {
        self.load_queue(engine, selected, source_list, source, true)
    }

    /// Same as `activate_queue`; `start_playback == false` prepares the
    /// selection without playing it.
    pub fn load_queue(
        &mut self,
        engine: &mut dyn MediaEngine,
        selected: &Track,
        source_list: Vec<Track>,
        source: QueueSource,
        start_playback: bool,
    ) -> Result<usize, QueueError> {
        let Some(index) = source_list
            .iter()
            .position(|track| track.id == selected.id)
        else {
            return Err(QueueError::TrackNotInSource {
                track_id: selected.id,
                queue_source: source,
            });
        };

        debug!(
            "QueueController: activating {} tracks from {} at index {}",
            source_list.len(),
            source,
            index
        );
        let prior_index = engine.current_media_item_index();
        if let Err(err) = load_engine(engine, &source_list, index, start_playback) {
            warn!(
                "QueueController: activation from {} failed, restoring the previous queue: {}",
                source, err
            );
            self.restore_engine(engine, prior_index);
            return Err(err.into());
        }
        self.active = ActiveQueue {
            source,
            tracks: source_list,
        };
        Ok(index)
    }

    /// Puts the active queue back into the engine after a failed activation.
    /// If that fails as well the active queue is dropped so nothing resolves
    /// against a list the engine no longer holds.
    fn restore_engine(&mut self, engine: &mut dyn MediaEngine, prior_index: Option<usize>) {
        if let Err(err) = requeue(engine, &self.active.tracks, prior_index) {
            warn!("QueueController: previous queue could not be restored: {}", err);
            self.active = ActiveQueue::default();
        }
    }

    pub fn advance(
        &mut self,
        engine: &mut dyn MediaEngine,
        direction: Direction,
    ) -> Result<AdvanceOutcome, QueueError> {
        if self.active.tracks.is_empty() {
            return Err(QueueError::EmptyQueue);
        }

        let moved = match direction {
            Direction::Previous => {
                if engine.current_position_ms()? > PREVIOUS_RESTART_THRESHOLD_MS {
                    engine.seek_to(0)?;
                    return Ok(AdvanceOutcome::Restarted);
                }
                engine.seek_to_previous_media_item()?
            }
            Direction::Next => engine.seek_to_next_media_item()?,
        };
        if !moved {
            return Ok(AdvanceOutcome::AtBoundary);
        }

        let index = engine.current_media_item_index().unwrap_or(0);
        let locator = engine.current_media_item().map(|item| item.uri);
        let resolved = locator
            .as_deref()
            .and_then(|locator| find_track_by_locator(&self.active.tracks, locator))
            .cloned();
        match resolved {
            Some(track) => Ok(AdvanceOutcome::Moved { index, track }),
            None => {
                warn!(
                    "QueueController: engine item {:?} at index {} is not in the active queue",
                    locator, index
                );
                Ok(AdvanceOutcome::Unresolved { index, locator })
            }
        }
    }

    /// Resolves an engine locator against the active queue, then the catalog.
    pub fn resolve_track(&self, locator: &str, catalog: &[Track]) -> Option<Track> {
        find_track_by_locator(&self.active.tracks, locator)
            .or_else(|| find_track_by_locator(catalog, locator))
            .cloned()
    }
}
