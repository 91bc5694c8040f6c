use std::{any::Any, path::PathBuf, sync::Arc, thread};

use log::{error, info};
use tokio::sync::broadcast;

use crate::{
    audio_engine::LocalAudioEngine,
    catalog::CatalogOptions,
    config::Config,
    library_manager::LibraryManager,
    media_controls::SouvlakiMediaSession,
    media_engine::MediaEngine,
    media_session_service::{MediaSessionService, MediaSessionServiceConfig},
    music_library::MusicLibrary,
    notification::{LogNotificationPresenter, NotificationPresenter, NotificationResources},
    playback_coordinator::{CoordinatorConfig, EngineFactory, PlaybackCoordinator},
    playlist_store::PlaylistStore,
    preferences::PreferenceStore,
    protocol::Message,
};

pub const SESSION_STORE_FILE: &str = "session.json";
pub const LIBRARY_STORE_FILE: &str = "library.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
pub const EQUALIZER_STORE_FILE: &str = "equalizer.json";

pub struct BackgroundServicesConfig {
    pub bus_sender: broadcast::Sender<Message>,
    pub config: Config,
    pub data_dir: PathBuf,
}

fn panic_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

/// Spawns a named manager thread that logs instead of unwinding silently.
fn spawn_manager<F>(name: &str, run: F) -> Option<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let thread_name = name.to_string();
    let spawn_result = thread::Builder::new().name(name.to_string()).spawn(move || {
        let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
        if let Err(payload) = run_result {
            error!(
                "{} thread terminated due to panic: {}",
                thread_name,
                panic_payload_to_string(payload.as_ref())
            );
        }
    });
    match spawn_result {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!("Failed to spawn {} thread: {}", name, err);
            None
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn notification_presenter(
    config: &Config,
    bus_sender: &broadcast::Sender<Message>,
) -> Arc<dyn NotificationPresenter> {
    if config.notifications.desktop_notifications {
        Arc::new(crate::notification::DesktopNotificationPresenter::new(
            bus_sender.clone(),
        ))
    } else {
        Arc::new(LogNotificationPresenter)
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn notification_presenter(
    _config: &Config,
    _bus_sender: &broadcast::Sender<Message>,
) -> Arc<dyn NotificationPresenter> {
    Arc::new(LogNotificationPresenter)
}

/// Starts the library manager, the media session service and the playback
/// coordinator. The returned handles finish after `PlaybackMessage::Shutdown`.
pub fn spawn_background_services(config: BackgroundServicesConfig) -> Vec<thread::JoinHandle<()>> {
    let BackgroundServicesConfig {
        bus_sender,
        config,
        data_dir,
    } = config;
    let mut handles = Vec::new();

    let library_manager_bus_receiver = bus_sender.subscribe();
    let library_manager_bus_sender = bus_sender.clone();
    let library_folders = config.library.folder_paths();
    let catalog_options = CatalogOptions {
        online_artwork: config.library.online_artwork,
    };
    handles.extend(spawn_manager("library-manager", move || {
        let mut library_manager = LibraryManager::new(
            library_manager_bus_receiver,
            library_manager_bus_sender,
            library_folders,
            catalog_options,
        );
        library_manager.run();
    }));

    let service_bus_receiver = bus_sender.subscribe();
    let service_bus_sender = bus_sender.clone();
    let presenter = notification_presenter(&config, &bus_sender);
    let service_config = MediaSessionServiceConfig {
        notification_min_interval: std::time::Duration::from_millis(
            config.notifications.min_update_interval_ms,
        ),
        session_min_interval: std::time::Duration::from_millis(
            config.notifications.session_min_update_interval_ms,
        ),
        progress_refresh_interval: std::time::Duration::from_millis(
            config.notifications.progress_refresh_interval_ms,
        ),
        resources: NotificationResources {
            small_icon: config.notifications.small_icon.clone(),
            large_icon: config.notifications.large_icon_path(),
        },
    };
    handles.extend(spawn_manager("media-session-service", move || {
        let session = SouvlakiMediaSession::new(service_bus_sender.clone());
        let mut service = MediaSessionService::new(
            service_bus_receiver,
            service_bus_sender,
            session,
            presenter,
            service_config,
        );
        service.run();
    }));

    let coordinator_bus_receiver = bus_sender.subscribe();
    let coordinator_bus_sender = bus_sender.clone();
    let engine_bus_sender = bus_sender.clone();
    let engine_factory: EngineFactory = Box::new(move || {
        LocalAudioEngine::spawn(engine_bus_sender.clone())
            .map(|engine| Box::new(engine) as Box<dyn MediaEngine>)
    });
    let coordinator_config = CoordinatorConfig {
        event_coalesce_interval: config.playback.event_coalesce_interval(),
        position_poll_interval: config.playback.position_poll_interval(),
    };
    handles.extend(spawn_manager("playback-coordinator", move || {
        let library = MusicLibrary::load(
            PreferenceStore::open(data_dir.join(LIBRARY_STORE_FILE)),
            PlaylistStore::new(data_dir.join(PLAYLISTS_FILE)),
        );
        let mut coordinator = PlaybackCoordinator::new(
            coordinator_bus_receiver,
            coordinator_bus_sender,
            engine_factory,
            library,
            PreferenceStore::open(data_dir.join(SESSION_STORE_FILE)),
            coordinator_config,
        );
        coordinator.run();
    }));

    info!("Background services started ({} threads)", handles.len());
    handles
}
