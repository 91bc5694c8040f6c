//! Catalog loading runtime component.
//!
//! Scans the configured library folders off the coordinator thread and
//! publishes the resulting catalog, plus on-demand folder listings.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::catalog::{list_folder, load_catalog, CatalogOptions};
use crate::protocol::{LibraryMessage, Message, PlaybackMessage, SessionMessage};

pub struct LibraryManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    library_folders: Vec<PathBuf>,
    options: CatalogOptions,
}

impl LibraryManager {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        library_folders: Vec<PathBuf>,
        options: CatalogOptions,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            library_folders,
            options,
        }
    }

    /// Publishes `CatalogLoadStarted`, then the catalog. A failed scan yields
    /// an empty catalog so the loading state always clears.
    fn load_catalog(&self) {
        let _ = self
            .bus_producer
            .send(Message::Library(LibraryMessage::CatalogLoadStarted));
        let tracks = match load_catalog(&self.library_folders, self.options) {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!("LibraryManager: catalog load failed: {}", err);
                let _ = self.bus_producer.send(Message::Session(SessionMessage::Diagnostic(
                    format!("Could not load the music library: {}", err),
                )));
                Vec::new()
            }
        };
        info!("LibraryManager: publishing {} tracks", tracks.len());
        let _ = self
            .bus_producer
            .send(Message::Library(LibraryMessage::CatalogLoaded(tracks)));
    }

    fn list_folder(&self, folder: &Path) {
        let entries = match list_folder(folder, self.options) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("LibraryManager: {}", err);
                let _ = self.bus_producer.send(Message::Session(SessionMessage::Diagnostic(
                    format!("Could not open {}", folder.display()),
                )));
                Vec::new()
            }
        };
        let _ = self
            .bus_producer
            .send(Message::Library(LibraryMessage::FolderListed {
                folder: folder.to_path_buf(),
                entries,
            }));
    }

    fn handle_message(&mut self, message: LibraryMessage) {
        match message {
            LibraryMessage::RequestCatalog => self.load_catalog(),
            LibraryMessage::ListFolder(folder) => self.list_folder(&folder),
            LibraryMessage::SetLibraryFolders(folders) => {
                debug!("LibraryManager: library folders are now {:?}", folders);
                self.library_folders = folders;
            }
            _ => {}
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Library(message)) => self.handle_message(message),
                Ok(Message::Playback(PlaybackMessage::Shutdown)) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("LibraryManager: bus lagged by {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("LibraryManager: stopped");
    }
}
