//! Single writer for the media engine.
//!
//! Every playback command, engine event and library mutation is applied on
//! this manager's thread, so queue activations and navigation never race.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::catalog::{find_track_by_id, tracks_for_locators, Track};
use crate::media_engine::{EngineError, EngineEvent, MediaEngine};
use crate::music_library::{LibraryError, MusicLibrary};
use crate::preferences::PreferenceStore;
use crate::protocol::{
    LibraryMessage, Message, PlaybackMessage, ServiceMessage, SessionMessage, TransportSnapshot,
};
use crate::queue_controller::{AdvanceOutcome, Direction, QueueController, QueueError, QueueSource};
use crate::session_bridge::{BridgeUpdate, PlaybackSessionBridge};
use crate::session_snapshot::SessionSnapshot;

/// Builds a fresh engine. Called lazily and again after a release.
pub type EngineFactory = Box<dyn FnMut() -> Result<Box<dyn MediaEngine>, EngineError> + Send>;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub event_coalesce_interval: Duration,
    pub position_poll_interval: Duration,
}

pub struct PlaybackCoordinator {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    engine_factory: EngineFactory,
    engine: Option<Box<dyn MediaEngine>>,
    engine_attached: bool,
    queue: QueueController,
    bridge: PlaybackSessionBridge,
    library: MusicLibrary,
    catalog: Vec<Track>,
    session_store: PreferenceStore,
    snapshot: SessionSnapshot,
    session_restored: bool,
}

impl PlaybackCoordinator {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        engine_factory: EngineFactory,
        library: MusicLibrary,
        session_store: PreferenceStore,
        config: CoordinatorConfig,
    ) -> Self {
        let snapshot = SessionSnapshot::load(&session_store);
        let bridge = PlaybackSessionBridge::new(
            bus_producer.clone(),
            config.event_coalesce_interval,
            config.position_poll_interval,
        );
        Self {
            bus_consumer,
            bus_producer,
            engine_factory,
            engine: None,
            engine_attached: false,
            queue: QueueController::new(),
            bridge,
            library,
            catalog: Vec::new(),
            session_store,
            snapshot,
            session_restored: false,
        }
    }

    fn send(&self, message: Message) {
        let _ = self.bus_producer.send(message);
    }

    fn diagnostic(&self, text: impl Into<String>) {
        self.send(Message::Session(SessionMessage::Diagnostic(text.into())));
    }

    fn ensure_engine(&mut self) -> bool {
        if self.engine.is_some() {
            return true;
        }
        match (self.engine_factory)() {
            Ok(engine) => {
                info!("PlaybackCoordinator: media engine created");
                self.engine = Some(engine);
                self.engine_attached = false;
                self.queue = QueueController::new();
                true
            }
            Err(err) => {
                error!("PlaybackCoordinator: failed to create media engine: {}", err);
                self.diagnostic(format!("Playback unavailable: {}", err));
                false
            }
        }
    }

    fn attach_service(&mut self) {
        if self.engine_attached || self.engine.is_none() {
            return;
        }
        self.engine_attached = true;
        self.send(Message::Service(ServiceMessage::EngineAttached));
    }

    fn persist_snapshot(&mut self) {
        if let Err(err) = self.snapshot.save(&mut self.session_store) {
            warn!("PlaybackCoordinator: failed to persist session: {}", err);
        }
    }

    fn publish(&mut self, update: BridgeUpdate) {
        if let Some(track) = update.track_changed {
            self.send(Message::Session(SessionMessage::TrackInfoChanged {
                title: track.title.clone(),
                artist: track.artist.clone(),
            }));
            if self.snapshot.last_track_id != Some(track.id) {
                self.snapshot.last_track_id = Some(track.id);
                self.persist_snapshot();
            }
        }
        if update.state_changed {
            let state = self.bridge.state().clone();
            self.send(Message::Session(SessionMessage::Transport(TransportSnapshot {
                is_playing: state.is_playing,
                position_ms: state.current_position_ms,
                duration_ms: state.duration_ms,
            })));
            self.send(Message::Session(SessionMessage::UiStateChanged(state)));
        }
    }

    /// Tracks of `source`, in the order the user sees them.
    fn source_list(&self, source: &QueueSource) -> Option<Vec<Track>> {
        match source {
            QueueSource::AllSongs => Some(self.catalog.clone()),
            QueueSource::Favorites => {
                Some(tracks_for_locators(&self.catalog, self.library.favorites()))
            }
            QueueSource::Playlist(playlist_id) => self
                .library
                .playlist(playlist_id)
                .map(|playlist| tracks_for_locators(&self.catalog, &playlist.songs)),
        }
    }

    fn play_track(&mut self, track_id: u64, source: QueueSource) {
        let Some(track) = find_track_by_id(&self.catalog, track_id).cloned() else {
            warn!("PlaybackCoordinator: track {} is not in the catalog", track_id);
            self.diagnostic(format!("Track {} is not in the library", track_id));
            return;
        };
        let Some(source_list) = self.source_list(&source) else {
            warn!("PlaybackCoordinator: {} no longer exists", source);
            self.diagnostic(format!("The {} list no longer exists", source));
            return;
        };
        if !self.ensure_engine() {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        match self
            .queue
            .activate_queue(engine.as_mut(), &track, source_list, source.clone())
        {
            Ok(index) => {
                debug!(
                    "PlaybackCoordinator: playing {} at index {} of {}",
                    track.title, index, source
                );
                self.snapshot.last_queue_source = source;
                self.snapshot.last_track_id = Some(track.id);
                self.persist_snapshot();
                let update = self.bridge.select_track(track);
                self.publish(update);
                self.attach_service();
            }
            Err(QueueError::TrackNotInSource {
                track_id,
                queue_source,
            }) => {
                warn!(
                    "PlaybackCoordinator: track {} is not part of {}; queue left unchanged",
                    track_id, queue_source
                );
                self.diagnostic(format!("That track is not in the {} list", queue_source));
            }
            Err(err) => {
                error!("PlaybackCoordinator: queue activation failed: {}", err);
                self.diagnostic(format!("Playback failed: {}", err));
            }
        }
    }

    fn advance(&mut self, direction: Direction) {
        let Some(engine) = self.engine.as_mut() else {
            debug!("PlaybackCoordinator: no engine for {:?}", direction);
            return;
        };
        match self.queue.advance(engine.as_mut(), direction) {
            Ok(AdvanceOutcome::Moved { track, .. }) => {
                let update = self.bridge.select_track(track);
                self.publish(update);
            }
            Ok(AdvanceOutcome::Restarted) => {
                let update = self.bridge.set_position(0);
                self.publish(update);
            }
            Ok(AdvanceOutcome::Unresolved { .. }) | Ok(AdvanceOutcome::AtBoundary) => {}
            Err(QueueError::EmptyQueue) => {
                debug!("PlaybackCoordinator: nothing queued for {:?}", direction);
            }
            Err(err) => warn!("PlaybackCoordinator: {:?} failed: {}", direction, err),
        }
    }

    /// Runs `command` against the live engine, logging failures.
    fn with_engine(
        &mut self,
        label: &str,
        command: impl FnOnce(&mut dyn MediaEngine) -> Result<(), EngineError>,
    ) -> bool {
        let Some(engine) = self.engine.as_mut() else {
            debug!("PlaybackCoordinator: no engine for {}", label);
            return false;
        };
        match command(engine.as_mut()) {
            Ok(()) => true,
            Err(err) => {
                warn!("PlaybackCoordinator: {} failed: {}", label, err);
                false
            }
        }
    }

    fn handle_playback(&mut self, message: PlaybackMessage) {
        match message {
            PlaybackMessage::PlayTrack { track_id, source } => self.play_track(track_id, source),
            PlaybackMessage::Play => {
                if self.with_engine("play", |engine| engine.play()) {
                    self.attach_service();
                }
            }
            PlaybackMessage::Pause => {
                self.with_engine("pause", |engine| engine.pause());
            }
            PlaybackMessage::TogglePlayPause => {
                let playing = self
                    .engine
                    .as_ref()
                    .is_some_and(|engine| engine.is_playing());
                let message = if playing {
                    PlaybackMessage::Pause
                } else {
                    PlaybackMessage::Play
                };
                self.handle_playback(message);
            }
            PlaybackMessage::Next => self.advance(Direction::Next),
            PlaybackMessage::Previous => self.advance(Direction::Previous),
            PlaybackMessage::SeekTo(position_ms) => {
                if self.with_engine("seek", |engine| engine.seek_to(position_ms)) {
                    let update = self.bridge.set_position(position_ms);
                    self.publish(update);
                }
            }
            PlaybackMessage::Stop => {
                self.with_engine("stop", |engine| engine.stop());
            }
            PlaybackMessage::SelectTab(tab_index) => {
                if self.snapshot.last_tab_index != tab_index {
                    self.snapshot.last_tab_index = tab_index;
                    self.persist_snapshot();
                }
            }
            PlaybackMessage::PollPosition => {
                let Some(engine) = self.engine.as_ref() else {
                    return;
                };
                let update = self
                    .bridge
                    .handle_position_tick(engine.as_ref(), &self.queue, &self.catalog);
                self.publish(update);
            }
            PlaybackMessage::ReleaseEngine => self.release_engine(),
            PlaybackMessage::Shutdown => {}
        }
    }

    fn release_engine(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        engine.release();
        self.engine_attached = false;
        let update = self.bridge.handle_engine_event(
            &EngineEvent::IsPlayingChanged(false),
            engine.as_ref(),
            &self.queue,
            &self.catalog,
        );
        self.publish(update);
        info!("PlaybackCoordinator: media engine released");
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        let Some(engine) = self.engine.as_ref() else {
            debug!("PlaybackCoordinator: dropping {:?} after release", event);
            return;
        };
        let update =
            self.bridge
                .handle_engine_event(&event, engine.as_ref(), &self.queue, &self.catalog);
        self.publish(update);
    }

    fn restore_session(&mut self) {
        self.session_restored = true;
        let restore_target = self
            .snapshot
            .last_track_id
            .and_then(|track_id| find_track_by_id(&self.catalog, track_id).cloned());

        if let Some(track) = restore_target {
            let mut source = self.snapshot.last_queue_source.clone();
            let mut source_list = self.source_list(&source).unwrap_or_default();
            if !source_list.iter().any(|candidate| candidate.id == track.id) {
                debug!(
                    "PlaybackCoordinator: {} no longer holds the last track, restoring from all songs",
                    source
                );
                source = QueueSource::AllSongs;
                source_list = self.catalog.clone();
            }
            if self.ensure_engine() {
                if let Some(engine) = self.engine.as_mut() {
                    match self.queue.load_queue(
                        engine.as_mut(),
                        &track,
                        source_list,
                        source.clone(),
                        false,
                    ) {
                        Ok(_) => {
                            info!("PlaybackCoordinator: restored {} from {}", track.title, source);
                            self.snapshot.last_queue_source = source;
                            let update = self.bridge.select_track(track);
                            self.publish(update);
                        }
                        Err(err) => warn!("PlaybackCoordinator: session restore failed: {}", err),
                    }
                }
            }
        }
        self.send(Message::Session(SessionMessage::SessionRestored(
            self.snapshot.clone(),
        )));
    }

    fn publish_library_state(&self) {
        self.send(Message::Library(LibraryMessage::FavoritesChanged(
            self.library.favorites().to_vec(),
        )));
        self.send(Message::Library(LibraryMessage::PlaylistsChanged(
            self.library.playlists().to_vec(),
        )));
    }

    fn locator_for(&self, track_id: u64) -> Option<String> {
        let locator = find_track_by_id(&self.catalog, track_id).map(|track| track.locator.clone());
        if locator.is_none() {
            self.diagnostic(format!("Track {} is not in the library", track_id));
        }
        locator
    }

    fn apply_library_result<T>(&self, operation: &str, result: Result<T, LibraryError>) {
        match result {
            Ok(_) => self.publish_library_state(),
            Err(err) => {
                warn!("PlaybackCoordinator: {} failed: {}", operation, err);
                self.diagnostic(format!("Could not {}: {}", operation, err));
            }
        }
    }

    fn handle_library(&mut self, message: LibraryMessage) {
        match message {
            LibraryMessage::CatalogLoaded(tracks) => {
                self.catalog = tracks;
                if !self.session_restored {
                    self.restore_session();
                }
            }
            LibraryMessage::ToggleFavorite(track_id) => {
                if let Some(locator) = self.locator_for(track_id) {
                    let result = self.library.toggle_favorite(&locator);
                    self.apply_library_result("update favorites", result);
                }
            }
            LibraryMessage::CreatePlaylist(name) => {
                let result = self.library.create_playlist(&name);
                self.apply_library_result("create playlist", result);
            }
            LibraryMessage::AddToPlaylist {
                playlist_id,
                track_id,
            } => {
                if let Some(locator) = self.locator_for(track_id) {
                    let result = self.library.add_to_playlist(&playlist_id, &locator);
                    self.apply_library_result("add to playlist", result);
                }
            }
            LibraryMessage::RemoveFromPlaylist {
                playlist_id,
                track_id,
            } => {
                if let Some(locator) = self.locator_for(track_id) {
                    let result = self.library.remove_from_playlist(&playlist_id, &locator);
                    self.apply_library_result("remove from playlist", result);
                }
            }
            LibraryMessage::RenamePlaylist { playlist_id, name } => {
                let result = self.library.rename_playlist(&playlist_id, &name);
                self.apply_library_result("rename playlist", result);
            }
            LibraryMessage::DeletePlaylist(playlist_id) => {
                let result = self.library.delete_playlist(&playlist_id);
                self.apply_library_result("delete playlist", result);
            }
            _ => {}
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Playback(message) => self.handle_playback(message),
            Message::Engine(event) => self.handle_engine_event(event),
            Message::Library(message) => self.handle_library(message),
            Message::Session(_) | Message::Service(_) => {}
        }
    }

    pub fn run(&mut self) {
        info!("PlaybackCoordinator: started");
        self.publish_library_state();
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Playback(PlaybackMessage::Shutdown)) => {
                    self.persist_snapshot();
                    self.release_engine();
                    break;
                }
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("PlaybackCoordinator: bus lagged by {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("PlaybackCoordinator: stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::tracks;
    use crate::media_engine::test_support::RecordingEngine;
    use crate::playlist_store::PlaylistStore;
    use crate::session_bridge::PlayerUiState;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct Harness {
        coordinator: PlaybackCoordinator,
        receiver: broadcast::Receiver<Message>,
        engines_created: Arc<AtomicUsize>,
    }

    fn harness(dir: &Path) -> Harness {
        let (sender, receiver) = broadcast::channel(256);
        let engines_created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&engines_created);
        let factory: EngineFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingEngine::default()) as Box<dyn MediaEngine>)
        });
        let library = MusicLibrary::load(
            PreferenceStore::open(dir.join("library.json")),
            PlaylistStore::new(dir.join("playlists.json")),
        );
        let coordinator = PlaybackCoordinator::new(
            sender.subscribe(),
            sender,
            factory,
            library,
            PreferenceStore::open(dir.join("session.json")),
            CoordinatorConfig {
                event_coalesce_interval: Duration::ZERO,
                position_poll_interval: Duration::from_secs(60),
            },
        );
        Harness {
            coordinator,
            receiver,
            engines_created,
        }
    }

    fn drain(receiver: &mut broadcast::Receiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn last_ui_state(messages: &[Message]) -> Option<PlayerUiState> {
        messages.iter().rev().find_map(|message| match message {
            Message::Session(SessionMessage::UiStateChanged(state)) => Some(state.clone()),
            _ => None,
        })
    }

    fn engine_uris(coordinator: &PlaybackCoordinator) -> Vec<String> {
        let Some(engine) = coordinator.engine.as_ref() else {
            return Vec::new();
        };
        (0..engine.media_item_count())
            .filter_map(|index| engine.media_item_at(index).map(|item| item.uri))
            .collect()
    }

    fn load_catalog(h: &mut Harness, catalog: &[Track]) {
        h.coordinator
            .handle_message(Message::Library(LibraryMessage::CatalogLoaded(catalog.to_vec())));
    }

    #[test]
    fn test_play_track_activates_queue_and_publishes_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B", "C", "D"]);
        load_catalog(&mut h, &catalog);
        drain(&mut h.receiver);

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[2].id,
                source: QueueSource::AllSongs,
            }));

        let messages = drain(&mut h.receiver);
        let state = last_ui_state(&messages).expect("ui state");
        assert_eq!(state.selected_track, Some(catalog[2].clone()));
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Service(ServiceMessage::EngineAttached)
        )));
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Session(SessionMessage::TrackInfoChanged { title, .. }) if title == "C"
        )));
        assert_eq!(engine_uris(&h.coordinator).len(), 4);

        let persisted =
            SessionSnapshot::load(&PreferenceStore::open(dir.path().join("session.json")));
        assert_eq!(persisted.last_track_id, Some(catalog[2].id));
        assert_eq!(persisted.last_queue_source, QueueSource::AllSongs);
    }

    #[test]
    fn test_first_selection_reaches_the_media_session_service() {
        use crate::media_session_service::test_support::{
            config, wait_for_posts, RecordingPresenter, RecordingSession,
        };
        use crate::media_session_service::MediaSessionService;

        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B", "C"]);
        load_catalog(&mut h, &catalog);
        drain(&mut h.receiver);

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[1].id,
                source: QueueSource::AllSongs,
            }));
        let messages = drain(&mut h.receiver);

        let (service_sender, service_receiver) = broadcast::channel(64);
        let presenter = Arc::new(RecordingPresenter::default());
        let mut service = MediaSessionService::new(
            service_receiver,
            service_sender,
            RecordingSession::default(),
            Arc::clone(&presenter) as Arc<dyn crate::notification::NotificationPresenter>,
            config(),
        );
        for message in messages {
            service.handle_message(message);
        }

        let posted = wait_for_posts(&presenter, 1);
        assert!(!posted.is_empty());
        assert!(posted.iter().all(|content| content.title == "B"));
    }

    #[test]
    fn test_track_outside_favorites_leaves_queue_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B", "C"]);
        load_catalog(&mut h, &catalog);
        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[0].id,
                source: QueueSource::AllSongs,
            }));
        let before = engine_uris(&h.coordinator);
        drain(&mut h.receiver);

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[1].id,
                source: QueueSource::Favorites,
            }));

        assert_eq!(engine_uris(&h.coordinator), before);
        assert!(drain(&mut h.receiver).iter().any(|message| matches!(
            message,
            Message::Session(SessionMessage::Diagnostic(_))
        )));
    }

    #[test]
    fn test_favorites_queue_navigation_follows_favorite_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B", "C", "D"]);
        load_catalog(&mut h, &catalog);
        for track in [&catalog[1], &catalog[3]] {
            h.coordinator
                .handle_message(Message::Library(LibraryMessage::ToggleFavorite(track.id)));
        }

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[3].id,
                source: QueueSource::Favorites,
            }));
        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::Previous));

        assert_eq!(
            h.coordinator.bridge.state().selected_track,
            Some(catalog[1].clone())
        );
        assert_eq!(
            engine_uris(&h.coordinator),
            vec![catalog[1].locator.clone(), catalog[3].locator.clone()]
        );
    }

    #[test]
    fn test_session_restore_prepares_last_track_without_playing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = tracks(&["A", "B", "C"]);
        {
            let mut store = PreferenceStore::open(dir.path().join("session.json"));
            SessionSnapshot {
                last_track_id: Some(catalog[1].id),
                last_tab_index: 2,
                last_queue_source: QueueSource::Favorites,
            }
            .save(&mut store)
            .expect("save");
        }
        let mut h = harness(dir.path());
        load_catalog(&mut h, &catalog);

        let engine = h.coordinator.engine.as_ref().expect("engine");
        assert_eq!(engine.current_media_item_index(), Some(1));
        assert!(!engine.is_playing());

        let messages = drain(&mut h.receiver);
        let restored = messages.iter().find_map(|message| match message {
            Message::Session(SessionMessage::SessionRestored(snapshot)) => Some(snapshot.clone()),
            _ => None,
        });
        let restored = restored.expect("restored");
        assert_eq!(restored.last_tab_index, 2);
        assert_eq!(restored.last_queue_source, QueueSource::AllSongs);
        assert!(!messages.iter().any(|message| matches!(
            message,
            Message::Service(ServiceMessage::EngineAttached)
        )));
    }

    #[test]
    fn test_released_engine_skips_commands_until_next_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B"]);
        load_catalog(&mut h, &catalog);
        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[0].id,
                source: QueueSource::AllSongs,
            }));
        assert_eq!(h.engines_created.load(Ordering::SeqCst), 1);

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::ReleaseEngine));
        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::Next));
        h.coordinator
            .handle_message(Message::Engine(EngineEvent::IsPlayingChanged(true)));
        assert!(h.coordinator.engine.is_none());
        assert!(!h.coordinator.bridge.is_polling());

        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::PlayTrack {
                track_id: catalog[1].id,
                source: QueueSource::AllSongs,
            }));
        assert_eq!(h.engines_created.load(Ordering::SeqCst), 2);
        assert_eq!(engine_uris(&h.coordinator).len(), 2);
    }

    #[test]
    fn test_library_mutations_publish_new_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        let catalog = tracks(&["A", "B"]);
        load_catalog(&mut h, &catalog);
        drain(&mut h.receiver);

        h.coordinator
            .handle_message(Message::Library(LibraryMessage::CreatePlaylist(
                "Evening".to_string(),
            )));
        let playlist_id = h.coordinator.library.playlists()[0].id.clone();
        h.coordinator
            .handle_message(Message::Library(LibraryMessage::AddToPlaylist {
                playlist_id: playlist_id.clone(),
                track_id: catalog[1].id,
            }));

        let messages = drain(&mut h.receiver);
        let latest = messages.iter().rev().find_map(|message| match message {
            Message::Library(LibraryMessage::PlaylistsChanged(playlists)) => Some(playlists.clone()),
            _ => None,
        });
        let latest = latest.expect("playlists");
        assert_eq!(latest[0].songs, vec![catalog[1].locator.clone()]);

        h.coordinator
            .handle_message(Message::Library(LibraryMessage::DeletePlaylist(
                "missing".to_string(),
            )));
        assert!(drain(&mut h.receiver).iter().any(|message| matches!(
            message,
            Message::Session(SessionMessage::Diagnostic(_))
        )));
    }

    #[test]
    fn test_tab_selection_is_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = harness(dir.path());
        h.coordinator
            .handle_message(Message::Playback(PlaybackMessage::SelectTab(3)));
        let persisted =
            SessionSnapshot::load(&PreferenceStore::open(dir.path().join("session.json")));
        assert_eq!(persisted.last_tab_index, 3);
    }
}
