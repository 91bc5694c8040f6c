//! Background media session service.
//!
//! Publishes transport state to the system media session and keeps the
//! playback notification current. Commands from notification actions and from
//! session callbacks both arrive as `ServiceIntent`s and go through
//! `handle_intent`.
//!
//! Lifecycle: `Idle` until the engine is attached, `Bound` once the session
//! is active and the foreground notification is up, `Active` after the first
//! transport snapshot, `Stopped` after an explicit stop or task removal.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::notification::{
    build_notification, NotificationContent, NotificationPresenter, NotificationResources,
    NowPlaying,
};
use crate::protocol::{
    Message, PlaybackMessage, ServiceIntent, ServiceMessage, SessionMessage, TransportSnapshot,
};
use crate::rate_gate::{UpdateGate, UpdateKind};
use crate::ticker::PeriodicTicker;

#[derive(Debug, thiserror::Error)]
pub enum MediaSessionError {
    #[error("media session is not active")]
    Inactive,
    #[error("media session backend failed: {0}")]
    Backend(String),
}

/// Platform media session the service publishes to.
pub trait SystemMediaSession {
    fn activate(&mut self) -> Result<(), MediaSessionError>;
    fn publish_metadata(
        &mut self,
        now_playing: &NowPlaying,
        duration_ms: u64,
    ) -> Result<(), MediaSessionError>;
    fn publish_playback(&mut self, transport: &TransportSnapshot) -> Result<(), MediaSessionError>;
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Bound,
    Active,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct MediaSessionServiceConfig {
    pub notification_min_interval: Duration,
    pub session_min_interval: Duration,
    pub progress_refresh_interval: Duration,
    pub resources: NotificationResources,
}

pub struct MediaSessionService<S: SystemMediaSession> {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    session: S,
    presenter: Arc<dyn NotificationPresenter>,
    config: MediaSessionServiceConfig,
    state: ServiceState,
    now_playing: NowPlaying,
    transport: TransportSnapshot,
    notification_gate: UpdateGate,
    session_gate: UpdateGate,
    progress_ticker: Option<PeriodicTicker>,
    foreground: bool,
    /// Bumped on every stop. Workers holding an older value drop their post.
    post_epoch: Arc<Mutex<u64>>,
}

fn lock_epoch(post_epoch: &Mutex<u64>) -> MutexGuard<'_, u64> {
    match post_epoch.lock() {
        Ok(epoch) => epoch,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Posts on a short-lived worker thread, falling back to the static
/// notification when the full one cannot be built or shown.
fn post_notification(
    presenter: Arc<dyn NotificationPresenter>,
    post_epoch: Arc<Mutex<u64>>,
    built: Result<NotificationContent, crate::notification::NotificationError>,
    small_icon: String,
) {
    let epoch = *lock_epoch(&post_epoch);
    let spawn_result = thread::Builder::new()
        .name("notification-post".to_string())
        .spawn(move || {
            let current_epoch = lock_epoch(&post_epoch);
            if *current_epoch != epoch {
                debug!("MediaSessionService: dropping notification from a stopped session");
                return;
            }
            let posted = built.and_then(|content| presenter.post(&content));
            if let Err(err) = posted {
                warn!(
                    "MediaSessionService: notification failed, posting fallback: {}",
                    err
                );
                if let Err(err) = presenter.post(&NotificationContent::fallback(&small_icon)) {
                    error!("MediaSessionService: fallback notification failed: {}", err);
                }
            }
        });
    if let Err(err) = spawn_result {
        warn!("MediaSessionService: failed to spawn notification worker: {}", err);
    }
}

impl<S: SystemMediaSession> MediaSessionService<S> {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        session: S,
        presenter: Arc<dyn NotificationPresenter>,
        config: MediaSessionServiceConfig,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            session,
            presenter,
            notification_gate: UpdateGate::new(config.notification_min_interval),
            session_gate: UpdateGate::new(config.session_min_interval),
            config,
            state: ServiceState::Idle,
            now_playing: NowPlaying::default(),
            transport: TransportSnapshot::default(),
            progress_ticker: None,
            foreground: false,
            post_epoch: Arc::new(Mutex::new(0)),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    fn is_bound(&self) -> bool {
        matches!(self.state, ServiceState::Bound | ServiceState::Active)
    }

    fn bind(&mut self) {
        if self.is_bound() {
            return;
        }
        if let Err(err) = self.session.activate() {
            warn!("MediaSessionService: media session unavailable: {}", err);
        }
        self.state = ServiceState::Bound;
        self.foreground = true;
        info!("MediaSessionService: bound to engine");
        self.publish_session_metadata();
        self.publish_session_playback(UpdateKind::Immediate);
        self.refresh_notification(UpdateKind::Immediate);
        self.update_progress_ticker();
    }

    fn refresh_notification(&mut self, kind: UpdateKind) {
        if !self.foreground || !self.notification_gate.admit(kind) {
            return;
        }
        let built = build_notification(&self.now_playing, &self.transport, &self.config.resources);
        post_notification(
            Arc::clone(&self.presenter),
            Arc::clone(&self.post_epoch),
            built,
            self.config.resources.small_icon.clone(),
        );
    }

    fn publish_session_playback(&mut self, kind: UpdateKind) {
        if !self.session_gate.admit(kind) {
            return;
        }
        if let Err(err) = self.session.publish_playback(&self.transport) {
            debug!("MediaSessionService: playback state not published: {}", err);
        }
    }

    fn publish_session_metadata(&mut self) {
        if let Err(err) = self
            .session
            .publish_metadata(&self.now_playing, self.transport.duration_ms)
        {
            debug!("MediaSessionService: metadata not published: {}", err);
        }
    }

    fn update_progress_ticker(&mut self) {
        if self.transport.is_playing && self.is_bound() {
            if self.progress_ticker.is_none() {
                let bus_producer = self.bus_producer.clone();
                self.progress_ticker = PeriodicTicker::start(
                    "notification-progress",
                    self.config.progress_refresh_interval,
                    move || {
                        let _ = bus_producer.send(Message::Service(ServiceMessage::RefreshTick));
                    },
                );
            }
        } else {
            self.progress_ticker = None;
        }
    }

    /// Snapshots are mirrored in every state so a later bind starts from the
    /// current track and position.
    fn handle_transport(&mut self, transport: TransportSnapshot) {
        let playing_changed = self.transport.is_playing != transport.is_playing;
        let duration_changed = self.transport.duration_ms != transport.duration_ms;
        self.transport = transport;
        if !self.is_bound() {
            return;
        }
        self.state = ServiceState::Active;

        let kind = if playing_changed {
            UpdateKind::Immediate
        } else {
            UpdateKind::Throttled
        };
        self.publish_session_playback(kind);
        if duration_changed {
            self.publish_session_metadata();
        }
        self.refresh_notification(kind);
        self.update_progress_ticker();
    }

    fn handle_track_info(&mut self, title: String, artist: String) {
        self.now_playing = NowPlaying { title, artist };
        if !self.is_bound() {
            return;
        }
        self.state = ServiceState::Active;
        self.publish_session_metadata();
        self.refresh_notification(UpdateKind::Immediate);
    }

    /// Executes a command from a notification action or a session callback.
    pub fn handle_intent(&mut self, intent: ServiceIntent) {
        if !self.is_bound() {
            debug!("MediaSessionService: ignoring {:?} while {:?}", intent, self.state);
            return;
        }
        let _ = self
            .bus_producer
            .send(Message::Playback(intent.playback_message()));
        match intent {
            ServiceIntent::Play => self.transport.is_playing = true,
            ServiceIntent::Pause => self.transport.is_playing = false,
            ServiceIntent::Previous | ServiceIntent::Next => {}
        }
        self.publish_session_playback(UpdateKind::Immediate);
        self.refresh_notification(UpdateKind::Immediate);
        self.update_progress_ticker();
    }

    fn stop(&mut self, force_stop_playback: bool) {
        if self.state == ServiceState::Stopped {
            return;
        }
        if force_stop_playback {
            let _ = self
                .bus_producer
                .send(Message::Playback(PlaybackMessage::Stop));
        }
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::ReleaseEngine));
        self.progress_ticker = None;
        self.session.release();
        {
            let mut epoch = lock_epoch(&self.post_epoch);
            *epoch += 1;
            if self.foreground {
                self.presenter.dismiss();
            }
        }
        self.foreground = false;
        self.transport = TransportSnapshot::default();
        self.state = ServiceState::Stopped;
        info!("MediaSessionService: stopped");
        let _ = self
            .bus_producer
            .send(Message::Service(ServiceMessage::Stopped));
    }

    pub(crate) fn handle_message(&mut self, message: Message) {
        match message {
            Message::Service(ServiceMessage::EngineAttached) => self.bind(),
            Message::Service(ServiceMessage::Intent(intent)) => self.handle_intent(intent),
            Message::Service(ServiceMessage::RefreshTick) => {
                if self.is_bound() && self.transport.is_playing {
                    self.refresh_notification(UpdateKind::Throttled);
                }
            }
            Message::Service(ServiceMessage::TaskRemoved) => self.stop(true),
            Message::Service(ServiceMessage::Stop) => self.stop(false),
            Message::Session(SessionMessage::Transport(transport)) => {
                self.handle_transport(transport)
            }
            Message::Session(SessionMessage::TrackInfoChanged { title, artist }) => {
                self.handle_track_info(title, artist)
            }
            _ => {}
        }
    }

    /// Starts the blocking service loop.
    pub fn run(&mut self) {
        info!("MediaSessionService: started");
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Playback(PlaybackMessage::Shutdown)) => {
                    self.stop(false);
                    break;
                }
                Ok(message) => self.handle_message(message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("MediaSessionService: bus lagged by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::notification::NotificationError;

    #[derive(Debug, Default)]
    pub struct RecordingSession {
        pub activated: bool,
        pub released: bool,
        pub playback: Vec<TransportSnapshot>,
        pub metadata: Vec<NowPlaying>,
    }

    impl SystemMediaSession for RecordingSession {
        fn activate(&mut self) -> Result<(), MediaSessionError> {
            self.activated = true;
            Ok(())
        }

        fn publish_metadata(
            &mut self,
            now_playing: &NowPlaying,
            _duration_ms: u64,
        ) -> Result<(), MediaSessionError> {
            self.metadata.push(now_playing.clone());
            Ok(())
        }

        fn publish_playback(
            &mut self,
            transport: &TransportSnapshot,
        ) -> Result<(), MediaSessionError> {
            self.playback.push(*transport);
            Ok(())
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    /// Records posts and dismissals in the order the presenter saw them.
    #[derive(Default)]
    pub struct RecordingPresenter {
        pub posted: Mutex<Vec<NotificationContent>>,
        pub dismissed: Mutex<bool>,
        pub events: Mutex<Vec<&'static str>>,
        pub reject_full: bool,
        pub post_delay: Duration,
    }

    impl RecordingPresenter {
        pub fn posted(&self) -> Vec<NotificationContent> {
            self.posted.lock().expect("lock").clone()
        }

        pub fn events(&self) -> Vec<&'static str> {
            self.events.lock().expect("lock").clone()
        }
    }

    impl NotificationPresenter for RecordingPresenter {
        fn post(&self, content: &NotificationContent) -> Result<(), NotificationError> {
            thread::sleep(self.post_delay);
            if self.reject_full && !content.actions.is_empty() {
                return Err(NotificationError::Presenter("rejected".to_string()));
            }
            self.posted.lock().expect("lock").push(content.clone());
            self.events.lock().expect("lock").push("post");
            Ok(())
        }

        fn dismiss(&self) {
            *self.dismissed.lock().expect("lock") = true;
            self.events.lock().expect("lock").push("dismiss");
        }
    }

    pub fn config() -> MediaSessionServiceConfig {
        MediaSessionServiceConfig {
            notification_min_interval: Duration::from_secs(60),
            session_min_interval: Duration::from_secs(60),
            progress_refresh_interval: Duration::from_secs(60),
            resources: NotificationResources {
                small_icon: "media-playback-start".to_string(),
                large_icon: None,
            },
        }
    }

    pub fn wait_for_posts(
        presenter: &RecordingPresenter,
        count: usize,
    ) -> Vec<NotificationContent> {
        for _ in 0..100 {
            let posted = presenter.posted();
            if posted.len() >= count {
                return posted;
            }
            thread::sleep(Duration::from_millis(10));
        }
        presenter.posted()
    }
}
