//! Media engine abstraction.
//!
//! The engine owns the playlist of media items, the play/pause state and the
//! playback position. It is driven from a single thread (the playback
//! coordinator) and reports asynchronous changes as `EngineEvent`s on the bus.

/// An item in the engine queue. `media_id` carries the catalog track id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub media_id: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePlaybackState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// The previous item finished and the engine moved on by itself.
    Auto,
    Seek,
    PlaylistChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PlaybackStateChanged(EnginePlaybackState),
    IsPlayingChanged(bool),
    MediaItemTransition {
        media_item: Option<MediaItem>,
        reason: TransitionReason,
    },
    PositionDiscontinuity {
        position_ms: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("engine has been released")]
    Released,
    #[error("media item index {index} is out of range for {count} items")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("failed to load {uri}: {reason}")]
    Load { uri: String, reason: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
}

pub trait MediaEngine: Send {
    fn stop(&mut self) -> Result<(), EngineError>;
    fn clear_media_items(&mut self) -> Result<(), EngineError>;
    fn add_media_item(&mut self, item: MediaItem) -> Result<(), EngineError>;
    fn seek_to_item(&mut self, index: usize, position_ms: u64) -> Result<(), EngineError>;
    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError>;
    fn prepare(&mut self) -> Result<(), EngineError>;
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn release(&mut self);

    fn media_item_count(&self) -> usize;
    fn current_media_item_index(&self) -> Option<usize>;
    fn media_item_at(&self, index: usize) -> Option<MediaItem>;
    fn current_position_ms(&self) -> Result<u64, EngineError>;
    /// `None` until the current item's duration is known.
    fn duration_ms(&self) -> Result<Option<u64>, EngineError>;
    fn is_playing(&self) -> bool;
    fn playback_state(&self) -> EnginePlaybackState;

    fn current_media_item(&self) -> Option<MediaItem> {
        self.current_media_item_index()
            .and_then(|index| self.media_item_at(index))
    }

    /// Moves to the following item. Returns false at the tail.
    fn seek_to_next_media_item(&mut self) -> Result<bool, EngineError> {
        match self.current_media_item_index() {
            Some(index) if index + 1 < self.media_item_count() => {
                self.seek_to_item(index + 1, 0)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Moves to the prior item. Returns false at the head.
    fn seek_to_previous_media_item(&mut self) -> Result<bool, EngineError> {
        match self.current_media_item_index() {
            Some(index) if index > 0 => {
                self.seek_to_item(index - 1, 0)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
