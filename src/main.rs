mod app_bootstrap;
mod audio_decoder;
mod audio_engine;
mod catalog;
mod config;
mod config_persistence;
mod console;
mod equalizer;
mod library_manager;
mod media_controls;
mod media_engine;
mod media_file_discovery;
mod media_session_service;
mod metadata_tags;
mod music_library;
mod notification;
mod playback_coordinator;
mod playlist_store;
mod preferences;
mod protocol;
mod queue_controller;
mod rate_gate;
mod session_bridge;
mod session_snapshot;
mod ticker;
mod track_uri;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use log::info;
use tokio::sync::broadcast;

use app_bootstrap::services::{
    spawn_background_services, BackgroundServicesConfig, EQUALIZER_STORE_FILE,
};
use config::Config;
use console::{spawn_view_updater, Console, ConsoleView};
use equalizer::{EqualizerController, FallbackEqualizer};
use preferences::PreferenceStore;
use protocol::{LibraryMessage, Message};

const DATA_DIR_NAME: &str = "jamz";

fn resolve_data_dir(config: &Config) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let configured = config.storage.data_dir.trim();
    if !configured.is_empty() {
        return Ok(PathBuf::from(configured));
    }
    let data_root = dirs::data_dir().ok_or("no data directory is available on this platform")?;
    Ok(data_root.join(DATA_DIR_NAME))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_file = config_persistence::default_config_file()?;
    let config = config_persistence::load_or_create_config(&config_file)?;

    let mut clog = colog::default_builder();
    clog.filter(None, config.logging.level_filter());
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let data_dir = resolve_data_dir(&config)?;
    std::fs::create_dir_all(&data_dir).map_err(|err| {
        format!(
            "Failed to create data directory {}: {}",
            data_dir.display(),
            err
        )
    })?;
    info!(
        "Using config {} and data directory {}",
        config_file.display(),
        data_dir.display()
    );

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    let view = Arc::new(Mutex::new(ConsoleView::default()));
    let view_handle = spawn_view_updater(bus_sender.subscribe(), Arc::clone(&view))?;
    let service_handles = spawn_background_services(BackgroundServicesConfig {
        bus_sender: bus_sender.clone(),
        config: config.clone(),
        data_dir: data_dir.clone(),
    });

    let equalizer = EqualizerController::load(
        FallbackEqualizer::default(),
        PreferenceStore::open(data_dir.join(EQUALIZER_STORE_FILE)),
    );
    let _ = bus_sender.send(Message::Library(LibraryMessage::RequestCatalog));

    let mut console = Console::new(bus_sender, view, equalizer, config, config_file);
    console.run(std::io::stdin().lock());

    for handle in service_handles {
        let _ = handle.join();
    }
    let _ = view_handle.join();
    info!("Shut down cleanly");
    Ok(())
}
