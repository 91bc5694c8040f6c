//! Playback notification content and presenters.

use std::path::PathBuf;

use log::info;
use tokio::sync::broadcast::Sender;

use crate::protocol::{Message, ServiceIntent, ServiceMessage, TransportSnapshot};

pub const FALLBACK_TITLE: &str = "Jamz Music Player";
pub const FALLBACK_TEXT: &str = "Music playback";
pub const APP_NAME: &str = "jamz";

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification resource is missing: {0}")]
    MissingResource(String),
    #[error("notification could not be shown: {0}")]
    Presenter(String),
}

/// Title and artist of the track the service is announcing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
}

/// Icons configured for the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResources {
    pub small_icon: String,
    pub large_icon: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: &'static str,
    pub intent: ServiceIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationProgress {
    pub current_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub text: String,
    pub sub_text: String,
    pub small_icon: String,
    pub large_icon: Option<PathBuf>,
    pub progress: Option<NotificationProgress>,
    pub actions: Vec<NotificationAction>,
    /// Indices into `actions` shown in the compact view.
    pub compact_actions: Vec<usize>,
    pub ongoing: bool,
}

impl NotificationContent {
    /// Static notification used when the full one cannot be built or shown.
    pub fn fallback(small_icon: &str) -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            text: FALLBACK_TEXT.to_string(),
            sub_text: String::new(),
            small_icon: small_icon.to_string(),
            large_icon: None,
            progress: None,
            actions: Vec::new(),
            compact_actions: Vec::new(),
            ongoing: true,
        }
    }
}

/// `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1_000;
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// `elapsed / total`, or empty while the duration is unknown.
pub fn progress_sub_text(position_ms: u64, duration_ms: u64) -> String {
    if duration_ms == 0 {
        return String::new();
    }
    format!(
        "{} / {}",
        format_duration(position_ms.min(duration_ms)),
        format_duration(duration_ms)
    )
}

pub fn build_notification(
    now_playing: &NowPlaying,
    transport: &TransportSnapshot,
    resources: &NotificationResources,
) -> Result<NotificationContent, NotificationError> {
    if resources.small_icon.trim().is_empty() {
        return Err(NotificationError::MissingResource("small icon".to_string()));
    }
    if let Some(large_icon) = resources.large_icon.as_ref() {
        if !large_icon.is_file() {
            return Err(NotificationError::MissingResource(
                large_icon.display().to_string(),
            ));
        }
    }

    let play_pause = if transport.is_playing {
        NotificationAction {
            label: "Pause",
            intent: ServiceIntent::Pause,
        }
    } else {
        NotificationAction {
            label: "Play",
            intent: ServiceIntent::Play,
        }
    };
    let progress = (transport.duration_ms > 0).then_some(NotificationProgress {
        current_ms: transport.position_ms.min(transport.duration_ms),
        max_ms: transport.duration_ms,
    });

    Ok(NotificationContent {
        title: now_playing.title.clone(),
        text: now_playing.artist.clone(),
        sub_text: progress_sub_text(transport.position_ms, transport.duration_ms),
        small_icon: resources.small_icon.clone(),
        large_icon: resources.large_icon.clone(),
        progress,
        actions: vec![
            NotificationAction {
                label: "Previous",
                intent: ServiceIntent::Previous,
            },
            play_pause,
            NotificationAction {
                label: "Next",
                intent: ServiceIntent::Next,
            },
        ],
        compact_actions: vec![0, 1, 2],
        ongoing: true,
    })
}

/// Sends the intent behind a clicked notification action onto the bus.
/// Unknown ids, such as the close signal, are ignored.
pub fn forward_action(bus_producer: &Sender<Message>, action_id: &str) -> Option<ServiceIntent> {
    let intent = ServiceIntent::from_action_id(action_id)?;
    let _ = bus_producer.send(Message::Service(ServiceMessage::Intent(intent)));
    Some(intent)
}

/// Something that can put a notification in front of the user. Posts may
/// arrive from several worker threads.
pub trait NotificationPresenter: Send + Sync {
    fn post(&self, content: &NotificationContent) -> Result<(), NotificationError>;
    fn dismiss(&self);
}

/// Writes notifications to the log. Used when no desktop presenter exists.
#[derive(Debug, Default)]
pub struct LogNotificationPresenter;

impl NotificationPresenter for LogNotificationPresenter {
    fn post(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        info!(
            "Notification: {} - {} {}",
            content.title, content.text, content.sub_text
        );
        Ok(())
    }

    fn dismiss(&self) {
        info!("Notification: dismissed");
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
pub use desktop::DesktopNotificationPresenter;

#[cfg(all(unix, not(target_os = "macos")))]
mod desktop {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use log::{debug, warn};
    use notify_rust::{Hint, Notification, NotificationHandle, Timeout};
    use tokio::sync::broadcast::Sender;

    use super::{
        forward_action, NotificationContent, NotificationError, NotificationPresenter, APP_NAME,
    };
    use crate::protocol::Message;

    fn read_id(slot: &Mutex<Option<u32>>) -> Option<u32> {
        match slot.lock() {
            Ok(id) => *id,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn write_id(slot: &Mutex<Option<u32>>, next: Option<u32>) {
        match slot.lock() {
            Ok(mut id) => *id = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Freedesktop notification that is replaced in place on every post.
    /// Action clicks are forwarded to the bus as service intents.
    #[derive(Debug)]
    pub struct DesktopNotificationPresenter {
        bus_producer: Sender<Message>,
        notification_id: Mutex<Option<u32>>,
        /// Notification id the action listener is attached to.
        listening_id: Arc<Mutex<Option<u32>>>,
    }

    impl DesktopNotificationPresenter {
        pub fn new(bus_producer: Sender<Message>) -> Self {
            Self {
                bus_producer,
                notification_id: Mutex::new(None),
                listening_id: Arc::new(Mutex::new(None)),
            }
        }

        /// One listener per notification id. In-place updates keep the id, so
        /// the running listener keeps receiving their clicks.
        fn listen_for_actions(&self, handle: NotificationHandle) {
            let id = handle.id();
            if read_id(&self.listening_id) == Some(id) {
                return;
            }
            write_id(&self.listening_id, Some(id));

            let listening_id = Arc::clone(&self.listening_id);
            let bus_producer = self.bus_producer.clone();
            let spawn_result = thread::Builder::new()
                .name("notification-actions".to_string())
                .spawn(move || {
                    handle.wait_for_action(|action_id| {
                        if forward_action(&bus_producer, action_id).is_none() {
                            debug!("DesktopNotification: ignoring action {}", action_id);
                        }
                    });
                    if read_id(&listening_id) == Some(id) {
                        write_id(&listening_id, None);
                    }
                });
            if let Err(err) = spawn_result {
                warn!("DesktopNotification: failed to spawn action listener: {}", err);
                write_id(&self.listening_id, None);
            }
        }
    }

    impl NotificationPresenter for DesktopNotificationPresenter {
        fn post(&self, content: &NotificationContent) -> Result<(), NotificationError> {
            let mut body = content.text.clone();
            if !content.sub_text.is_empty() {
                body.push('\n');
                body.push_str(&content.sub_text);
            }

            let mut notification = Notification::new();
            notification
                .appname(APP_NAME)
                .summary(&content.title)
                .body(&body)
                .icon(&content.small_icon)
                .hint(Hint::Category("x-gnome.music".to_string()))
                .hint(Hint::Resident(content.ongoing))
                .timeout(Timeout::Never);
            if let Some(progress) = content.progress {
                let percent = (progress.current_ms * 100 / progress.max_ms.max(1)).min(100);
                notification.hint(Hint::CustomInt("value".to_string(), percent as i32));
            }
            for action in &content.actions {
                notification.action(action.intent.action_id(), action.label);
            }
            if let Some(id) = read_id(&self.notification_id) {
                notification.id(id);
            }

            let handle = notification
                .show()
                .map_err(|err| NotificationError::Presenter(err.to_string()))?;
            write_id(&self.notification_id, Some(handle.id()));
            if !content.actions.is_empty() {
                self.listen_for_actions(handle);
            }
            Ok(())
        }

        fn dismiss(&self) {
            let Some(id) = read_id(&self.notification_id) else {
                return;
            };
            write_id(&self.notification_id, None);
            if let Ok(handle) = Notification::new()
                .appname(APP_NAME)
                .summary("")
                .id(id)
                .show()
            {
                handle.close();
            }
        }
    }
}
