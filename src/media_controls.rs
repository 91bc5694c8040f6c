//! OS media controls bridge (MPRIS/SMTC/Now Playing).
//!
//! Publishes the service's transport state through `souvlaki` and turns
//! media-key and session callbacks into `ServiceIntent`s on the bus, the same
//! path notification actions take.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig,
};
use tokio::sync::broadcast::Sender;

use crate::media_session_service::{MediaSessionError, SystemMediaSession};
use crate::notification::NowPlaying;
use crate::protocol::{Message, ServiceIntent, ServiceMessage, TransportSnapshot};

const MEDIA_CONTROLS_DISPLAY_NAME: &str = "Jamz";
const MEDIA_CONTROLS_DBUS_NAME: &str = "jamz";

#[derive(Debug, Clone, Copy, Default)]
struct ControlState {
    is_playing: bool,
}

/// `SystemMediaSession` backed by the platform media controls.
pub struct SouvlakiMediaSession {
    bus_producer: Sender<Message>,
    control_state: Arc<Mutex<ControlState>>,
    controls: Option<MediaControls>,
}

impl SouvlakiMediaSession {
    pub fn new(bus_producer: Sender<Message>) -> Self {
        Self {
            bus_producer,
            control_state: Arc::new(Mutex::new(ControlState::default())),
            controls: None,
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn create_controls(
        bus_producer: Sender<Message>,
        control_state: Arc<Mutex<ControlState>>,
    ) -> Result<MediaControls, MediaSessionError> {
        let mut controls = MediaControls::new(PlatformConfig {
            display_name: MEDIA_CONTROLS_DISPLAY_NAME,
            dbus_name: MEDIA_CONTROLS_DBUS_NAME,
            hwnd: None,
        })
        .map_err(|err| MediaSessionError::Backend(format!("{:?}", err)))?;

        controls
            .attach(move |event| {
                let snapshot = match control_state.lock() {
                    Ok(state) => *state,
                    Err(poisoned) => *poisoned.into_inner(),
                };
                if let Some(intent) = map_control_event(event, snapshot) {
                    let _ = bus_producer.send(Message::Service(ServiceMessage::Intent(intent)));
                }
            })
            .map_err(|err| MediaSessionError::Backend(format!("{:?}", err)))?;

        Ok(controls)
    }

    #[cfg(target_os = "windows")]
    fn create_controls(
        _bus_producer: Sender<Message>,
        _control_state: Arc<Mutex<ControlState>>,
    ) -> Result<MediaControls, MediaSessionError> {
        // Souvlaki requires an HWND on Windows and this process has no window.
        Err(MediaSessionError::Backend(
            "Windows media controls need a window handle".to_string(),
        ))
    }

    fn update_control_state(&self, is_playing: bool) {
        match self.control_state.lock() {
            Ok(mut state) => state.is_playing = is_playing,
            Err(poisoned) => poisoned.into_inner().is_playing = is_playing,
        }
    }

    fn controls_mut(&mut self) -> Result<&mut MediaControls, MediaSessionError> {
        self.controls.as_mut().ok_or(MediaSessionError::Inactive)
    }
}

fn map_control_event(event: MediaControlEvent, state: ControlState) -> Option<ServiceIntent> {
    match event {
        MediaControlEvent::Play => Some(ServiceIntent::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(ServiceIntent::Pause),
        MediaControlEvent::Toggle => {
            if state.is_playing {
                Some(ServiceIntent::Pause)
            } else {
                Some(ServiceIntent::Play)
            }
        }
        MediaControlEvent::Next => Some(ServiceIntent::Next),
        MediaControlEvent::Previous => Some(ServiceIntent::Previous),
        MediaControlEvent::SetPosition(_)
        | MediaControlEvent::SeekBy(_, _)
        | MediaControlEvent::Seek(_)
        | MediaControlEvent::SetVolume(_)
        | MediaControlEvent::OpenUri(_)
        | MediaControlEvent::Raise
        | MediaControlEvent::Quit => None,
    }
}

impl SystemMediaSession for SouvlakiMediaSession {
    fn activate(&mut self) -> Result<(), MediaSessionError> {
        if self.controls.is_some() {
            return Ok(());
        }
        let controls =
            Self::create_controls(self.bus_producer.clone(), Arc::clone(&self.control_state))?;
        debug!("SouvlakiMediaSession: media controls attached");
        self.controls = Some(controls);
        Ok(())
    }

    fn publish_metadata(
        &mut self,
        now_playing: &NowPlaying,
        duration_ms: u64,
    ) -> Result<(), MediaSessionError> {
        let duration = (duration_ms > 0).then(|| Duration::from_millis(duration_ms));
        self.controls_mut()?
            .set_metadata(MediaMetadata {
                title: Some(now_playing.title.as_str()),
                artist: Some(now_playing.artist.as_str()),
                album: None,
                cover_url: None,
                duration,
            })
            .map_err(|err| MediaSessionError::Backend(format!("{:?}", err)))
    }

    fn publish_playback(&mut self, transport: &TransportSnapshot) -> Result<(), MediaSessionError> {
        self.update_control_state(transport.is_playing);
        let progress = Some(MediaPosition(Duration::from_millis(transport.position_ms)));
        let playback = if transport.is_playing {
            MediaPlayback::Playing { progress }
        } else {
            MediaPlayback::Paused { progress }
        };
        self.controls_mut()?
            .set_playback(playback)
            .map_err(|err| MediaSessionError::Backend(format!("{:?}", err)))
    }

    fn release(&mut self) {
        let Some(mut controls) = self.controls.take() else {
            return;
        };
        if let Err(err) = controls.set_playback(MediaPlayback::Stopped) {
            warn!("SouvlakiMediaSession: failed to publish stop: {:?}", err);
        }
        if let Err(err) = controls.detach() {
            warn!("SouvlakiMediaSession: failed to detach: {:?}", err);
        }
    }
}
