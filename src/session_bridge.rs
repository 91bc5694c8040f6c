//! Mirrors engine transport state into observable UI state.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast::Sender;

use crate::catalog::Track;
use crate::media_engine::{EngineEvent, EnginePlaybackState, MediaEngine};
use crate::protocol::{Message, PlaybackMessage};
use crate::queue_controller::QueueController;
use crate::rate_gate::{UpdateGate, UpdateKind};
use crate::ticker::PeriodicTicker;

pub const DEFAULT_EVENT_COALESCE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot rendered by front ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerUiState {
    pub is_playing: bool,
    pub current_position_ms: u64,
    pub duration_ms: u64,
    pub selected_track: Option<Track>,
}

/// What changed while handling an input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeUpdate {
    pub state_changed: bool,
    /// Set when the selected track was replaced.
    pub track_changed: Option<Track>,
}

impl BridgeUpdate {
    fn merge(&mut self, other: BridgeUpdate) {
        self.state_changed |= other.state_changed;
        if other.track_changed.is_some() {
            self.track_changed = other.track_changed;
        }
    }
}

pub struct PlaybackSessionBridge {
    state: PlayerUiState,
    event_gate: UpdateGate,
    poll_interval: Duration,
    tick_sender: Sender<Message>,
    position_poller: Option<PeriodicTicker>,
}

impl PlaybackSessionBridge {
    pub fn new(
        tick_sender: Sender<Message>,
        coalesce_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: PlayerUiState::default(),
            event_gate: UpdateGate::new(coalesce_interval),
            poll_interval,
            tick_sender,
            position_poller: None,
        }
    }

    pub fn state(&self) -> &PlayerUiState {
        &self.state
    }

    pub fn is_polling(&self) -> bool {
        self.position_poller.is_some()
    }

    /// Replaces the selection directly, e.g. after a queue activation.
    pub fn select_track(&mut self, track: Track) -> BridgeUpdate {
        if self.state.selected_track.as_ref() == Some(&track) {
            return BridgeUpdate::default();
        }
        self.state.current_position_ms = 0;
        self.state.duration_ms = track.duration_ms;
        self.state.selected_track = Some(track.clone());
        BridgeUpdate {
            state_changed: true,
            track_changed: Some(track),
        }
    }

    pub fn set_position(&mut self, position_ms: u64) -> BridgeUpdate {
        if self.state.current_position_ms == position_ms {
            return BridgeUpdate::default();
        }
        self.state.current_position_ms = position_ms;
        BridgeUpdate {
            state_changed: true,
            track_changed: None,
        }
    }

    pub fn handle_engine_event(
        &mut self,
        event: &EngineEvent,
        engine: &dyn MediaEngine,
        queue: &QueueController,
        catalog: &[Track],
    ) -> BridgeUpdate {
        match event {
            EngineEvent::IsPlayingChanged(is_playing) => self.set_playing(*is_playing),
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Ready) => {
                self.refresh_duration(engine)
            }
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Ended) => {
                let mut update = self.set_playing(false);
                update.merge(self.refresh_position(engine));
                update
            }
            EngineEvent::PlaybackStateChanged(_) => BridgeUpdate::default(),
            EngineEvent::MediaItemTransition { .. } | EngineEvent::PositionDiscontinuity { .. } => {
                if !self.event_gate.admit(UpdateKind::Throttled) {
                    debug!("PlaybackSessionBridge: coalesced {:?}", event);
                    return BridgeUpdate::default();
                }
                let mut update = self.refresh_duration(engine);
                update.merge(self.refresh_position(engine));
                update.merge(self.refresh_selected_track(engine, queue, catalog));
                update
            }
        }
    }

    /// Position poller tick. Ignored unless playing.
    pub fn handle_position_tick(
        &mut self,
        engine: &dyn MediaEngine,
        queue: &QueueController,
        catalog: &[Track],
    ) -> BridgeUpdate {
        if !self.state.is_playing {
            return BridgeUpdate::default();
        }
        let mut update = self.refresh_position(engine);
        if self.state.duration_ms == 0 {
            update.merge(self.refresh_duration(engine));
        }
        update.merge(self.refresh_selected_track(engine, queue, catalog));
        update
    }

    fn set_playing(&mut self, is_playing: bool) -> BridgeUpdate {
        if is_playing {
            self.start_position_poller();
        } else {
            self.position_poller = None;
        }
        if self.state.is_playing == is_playing {
            return BridgeUpdate::default();
        }
        self.state.is_playing = is_playing;
        BridgeUpdate {
            state_changed: true,
            track_changed: None,
        }
    }

    fn start_position_poller(&mut self) {
        if self.position_poller.is_some() {
            return;
        }
        let tick_sender = self.tick_sender.clone();
        self.position_poller = PeriodicTicker::start(
            "position-poller",
            self.poll_interval,
            move || {
                let _ = tick_sender.send(Message::Playback(PlaybackMessage::PollPosition));
            },
        );
    }

    fn refresh_position(&mut self, engine: &dyn MediaEngine) -> BridgeUpdate {
        match engine.current_position_ms() {
            Ok(position_ms) => self.set_position(position_ms),
            Err(err) => {
                warn!("PlaybackSessionBridge: failed to read position: {}", err);
                BridgeUpdate::default()
            }
        }
    }

    fn refresh_duration(&mut self, engine: &dyn MediaEngine) -> BridgeUpdate {
        let duration_ms = match engine.duration_ms() {
            Ok(duration_ms) => duration_ms.unwrap_or(0),
            Err(err) => {
                warn!("PlaybackSessionBridge: failed to read duration: {}", err);
                return BridgeUpdate::default();
            }
        };
        if duration_ms == 0 || self.state.duration_ms == duration_ms {
            return BridgeUpdate::default();
        }
        self.state.duration_ms = duration_ms;
        BridgeUpdate {
            state_changed: true,
            track_changed: None,
        }
    }

    fn refresh_selected_track(
        &mut self,
        engine: &dyn MediaEngine,
        queue: &QueueController,
        catalog: &[Track],
    ) -> BridgeUpdate {
        let Some(item) = engine.current_media_item() else {
            return BridgeUpdate::default();
        };
        if self
            .state
            .selected_track
            .as_ref()
            .is_some_and(|track| track.locator == item.uri)
        {
            return BridgeUpdate::default();
        }
        match queue.resolve_track(&item.uri, catalog) {
            Some(track) => {
                self.state.selected_track = Some(track.clone());
                self.state.duration_ms = match engine.duration_ms() {
                    Ok(Some(duration_ms)) if duration_ms > 0 => duration_ms,
                    _ => track.duration_ms,
                };
                BridgeUpdate {
                    state_changed: true,
                    track_changed: Some(track),
                }
            }
            None => {
                warn!(
                    "PlaybackSessionBridge: engine item {} is not in the queue or catalog",
                    item.uri
                );
                BridgeUpdate::default()
            }
        }
    }
}
