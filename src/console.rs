//! Line-oriented console front end.
//!
//! Commands typed on stdin become bus messages; a view thread keeps a copy
//! of the published state and prints what changed.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::catalog::{tracks_for_locators, FolderEntry, Track};
use crate::config::Config;
use crate::config_persistence::persist_config_file;
use crate::equalizer::{AudioEffects, EqualizerController};
use crate::notification::format_duration;
use crate::playlist_store::Playlist;
use crate::protocol::{
    LibraryMessage, Message, PlaybackMessage, ServiceMessage, SessionMessage,
};
use crate::queue_controller::QueueSource;
use crate::session_bridge::PlayerUiState;

const HELP_TEXT: &str = "\
commands:
  tracks | favs | playlists | status
  play <n> [all|fav|pl <playlist-id>]   start track n of a list
  play | pause | p | next | prev | stop | seek <seconds>
  tab <n>
  fav <n>                               toggle favorite for track n
  newpl <name> | renpl <id> <name> | delpl <id>
  addpl <id> <n> | rmpl <id> <n>
  ls <folder> | folder add <folder> | rescan
  eq | eq preset <name> | eq band <n> <0.0-1.0>
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    All,
    Favorites,
    Playlist(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EqualizerCommand {
    Show,
    Preset(String),
    Band { index: usize, level: f32 },
}

/// A parsed console line. Track numbers are zero-based here.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    ListTracks,
    ListFavorites,
    ListPlaylists,
    Status,
    PlayIndex {
        index: usize,
        selector: SourceSelector,
    },
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    Seek(u64),
    Tab(u32),
    ToggleFavorite(usize),
    CreatePlaylist(String),
    AddToPlaylist {
        playlist_id: String,
        index: usize,
    },
    RemoveFromPlaylist {
        playlist_id: String,
        index: usize,
    },
    RenamePlaylist {
        playlist_id: String,
        name: String,
    },
    DeletePlaylist(String),
    ListFolder(PathBuf),
    AddLibraryFolder(PathBuf),
    Rescan,
    Equalizer(EqualizerCommand),
    Help,
    Quit,
}

fn parse_track_number(token: Option<&str>) -> Result<usize, String> {
    let token = token.ok_or_else(|| "missing track number".to_string())?;
    match token.parse::<usize>() {
        Ok(number) if number > 0 => Ok(number - 1),
        _ => Err(format!("'{}' is not a track number", token)),
    }
}

fn required<'a>(token: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| format!("missing {}", what))
}

fn rest_of_line(line: &str, skip_words: usize) -> String {
    line.split_whitespace()
        .skip(skip_words)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err("empty command".to_string());
    };

    match command {
        "tracks" => Ok(ConsoleCommand::ListTracks),
        "favs" => Ok(ConsoleCommand::ListFavorites),
        "playlists" => Ok(ConsoleCommand::ListPlaylists),
        "status" => Ok(ConsoleCommand::Status),
        "play" => {
            let Some(number) = words.next() else {
                return Ok(ConsoleCommand::Play);
            };
            let index = parse_track_number(Some(number))?;
            let selector = match words.next() {
                None | Some("all") => SourceSelector::All,
                Some("fav") => SourceSelector::Favorites,
                Some("pl") => {
                    SourceSelector::Playlist(required(words.next(), "playlist id")?.to_string())
                }
                Some(other) => return Err(format!("unknown list '{}'", other)),
            };
            Ok(ConsoleCommand::PlayIndex { index, selector })
        }
        "pause" => Ok(ConsoleCommand::Pause),
        "p" | "toggle" => Ok(ConsoleCommand::TogglePlayPause),
        "next" => Ok(ConsoleCommand::Next),
        "prev" => Ok(ConsoleCommand::Previous),
        "stop" => Ok(ConsoleCommand::Stop),
        "seek" => {
            let seconds = required(words.next(), "seconds")?;
            seconds
                .parse::<u64>()
                .ok()
                .and_then(|seconds| seconds.checked_mul(1_000))
                .map(ConsoleCommand::Seek)
                .ok_or_else(|| format!("'{}' is not a number of seconds", seconds))
        }
        "tab" => {
            let tab = required(words.next(), "tab index")?;
            tab.parse::<u32>()
                .map(ConsoleCommand::Tab)
                .map_err(|_| format!("'{}' is not a tab index", tab))
        }
        "fav" => Ok(ConsoleCommand::ToggleFavorite(parse_track_number(words.next())?)),
        "newpl" => {
            let name = rest_of_line(line, 1);
            if name.is_empty() {
                return Err("missing playlist name".to_string());
            }
            Ok(ConsoleCommand::CreatePlaylist(name))
        }
        "addpl" | "rmpl" => {
            let playlist_id = required(words.next(), "playlist id")?.to_string();
            let index = parse_track_number(words.next())?;
            if command == "addpl" {
                Ok(ConsoleCommand::AddToPlaylist { playlist_id, index })
            } else {
                Ok(ConsoleCommand::RemoveFromPlaylist { playlist_id, index })
            }
        }
        "renpl" => {
            let playlist_id = required(words.next(), "playlist id")?.to_string();
            let name = rest_of_line(line, 2);
            if name.is_empty() {
                return Err("missing playlist name".to_string());
            }
            Ok(ConsoleCommand::RenamePlaylist { playlist_id, name })
        }
        "delpl" => Ok(ConsoleCommand::DeletePlaylist(
            required(words.next(), "playlist id")?.to_string(),
        )),
        "ls" => {
            let folder = rest_of_line(line, 1);
            if folder.is_empty() {
                return Err("missing folder".to_string());
            }
            Ok(ConsoleCommand::ListFolder(PathBuf::from(folder)))
        }
        "folder" => match words.next() {
            Some("add") => {
                let folder = rest_of_line(line, 2);
                if folder.is_empty() {
                    return Err("missing folder".to_string());
                }
                Ok(ConsoleCommand::AddLibraryFolder(PathBuf::from(folder)))
            }
            _ => Err("usage: folder add <folder>".to_string()),
        },
        "rescan" => Ok(ConsoleCommand::Rescan),
        "eq" => match words.next() {
            None => Ok(ConsoleCommand::Equalizer(EqualizerCommand::Show)),
            Some("preset") => {
                let name = rest_of_line(line, 2);
                if name.is_empty() {
                    return Err("missing preset name".to_string());
                }
                Ok(ConsoleCommand::Equalizer(EqualizerCommand::Preset(name)))
            }
            Some("band") => {
                let index = parse_track_number(words.next())?;
                let level = required(words.next(), "band level")?;
                let level = level
                    .parse::<f32>()
                    .map_err(|_| format!("'{}' is not a level", level))?;
                Ok(ConsoleCommand::Equalizer(EqualizerCommand::Band { index, level }))
            }
            Some(other) => Err(format!("unknown equalizer command '{}'", other)),
        },
        "help" | "?" => Ok(ConsoleCommand::Help),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        other => Err(format!("unknown command '{}'", other)),
    }
}

/// The console's copy of published state.
#[derive(Debug, Clone, Default)]
pub struct ConsoleView {
    pub catalog: Vec<Track>,
    pub favorites: Vec<String>,
    pub playlists: Vec<Playlist>,
    pub ui_state: PlayerUiState,
    pub loading: bool,
    pub tab_index: u32,
}

impl ConsoleView {
    pub fn tracks_for(&self, selector: &SourceSelector) -> Option<Vec<Track>> {
        match selector {
            SourceSelector::All => Some(self.catalog.clone()),
            SourceSelector::Favorites => Some(tracks_for_locators(&self.catalog, &self.favorites)),
            SourceSelector::Playlist(playlist_id) => self
                .playlists
                .iter()
                .find(|playlist| &playlist.id == playlist_id)
                .map(|playlist| tracks_for_locators(&self.catalog, &playlist.songs)),
        }
    }

    /// Applies a bus message and returns a line worth printing, if any.
    pub fn apply(&mut self, message: &Message) -> Option<String> {
        match message {
            Message::Library(LibraryMessage::CatalogLoadStarted) => {
                self.loading = true;
                Some("Loading music library...".to_string())
            }
            Message::Library(LibraryMessage::CatalogLoaded(tracks)) => {
                self.loading = false;
                self.catalog = tracks.clone();
                Some(format!("{} tracks in library", tracks.len()))
            }
            Message::Library(LibraryMessage::FavoritesChanged(favorites)) => {
                self.favorites = favorites.clone();
                None
            }
            Message::Library(LibraryMessage::PlaylistsChanged(playlists)) => {
                self.playlists = playlists.clone();
                None
            }
            Message::Library(LibraryMessage::FolderListed { folder, entries }) => {
                Some(render_folder_listing(folder, entries))
            }
            Message::Session(SessionMessage::UiStateChanged(state)) => {
                let previous = std::mem::replace(&mut self.ui_state, state.clone());
                if previous.is_playing == state.is_playing {
                    return None;
                }
                let line = if state.is_playing { "> playing" } else { "|| paused" };
                Some(line.to_string())
            }
            Message::Session(SessionMessage::TrackInfoChanged { title, artist }) => {
                Some(format!("Now playing: {} - {}", artist, title))
            }
            Message::Session(SessionMessage::SessionRestored(snapshot)) => {
                self.tab_index = snapshot.last_tab_index;
                Some(format!(
                    "Restored session (tab {}, {})",
                    snapshot.last_tab_index, snapshot.last_queue_source
                ))
            }
            Message::Session(SessionMessage::Diagnostic(text)) => Some(format!("! {}", text)),
            _ => None,
        }
    }

    pub fn status_line(&self) -> String {
        let Some(track) = self.ui_state.selected_track.as_ref() else {
            return "Nothing selected".to_string();
        };
        format!(
            "{} {} - {} [{} / {}]",
            if self.ui_state.is_playing { ">" } else { "||" },
            track.artist,
            track.title,
            format_duration(self.ui_state.current_position_ms),
            format_duration(self.ui_state.duration_ms)
        )
    }
}

fn render_folder_listing(folder: &Path, entries: &[FolderEntry]) -> String {
    let mut lines = vec![format!("{}:", folder.display())];
    for entry in entries {
        match entry {
            FolderEntry::Folder {
                name,
                music_file_count,
                ..
            } => lines.push(format!("  [{}] ({} songs)", name, music_file_count)),
            FolderEntry::Track(track) => {
                lines.push(format!("  {} - {}", track.artist, track.title))
            }
        }
    }
    lines.join("\n")
}

fn render_tracks(tracks: &[Track], favorites: &[String]) -> String {
    if tracks.is_empty() {
        return "(no tracks)".to_string();
    }
    tracks
        .iter()
        .enumerate()
        .map(|(index, track)| {
            let marker = if favorites.contains(&track.locator) { "*" } else { " " };
            format!(
                "{:>4}{} {} - {} ({})",
                index + 1,
                marker,
                track.artist,
                track.title,
                format_duration(track.duration_ms)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn lock_view(view: &Mutex<ConsoleView>) -> MutexGuard<'_, ConsoleView> {
    match view.lock() {
        Ok(view) => view,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mirrors bus state into `view` and prints notable changes.
pub fn spawn_view_updater(
    mut bus_consumer: Receiver<Message>,
    view: Arc<Mutex<ConsoleView>>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("console-view".to_string())
        .spawn(move || loop {
            match bus_consumer.blocking_recv() {
                Ok(Message::Playback(PlaybackMessage::Shutdown)) => break,
                Ok(message) => {
                    if let Some(line) = lock_view(&view).apply(&message) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Console: bus lagged by {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        })
}

pub struct Console<E: AudioEffects> {
    bus_producer: Sender<Message>,
    view: Arc<Mutex<ConsoleView>>,
    equalizer: EqualizerController<E>,
    config: Config,
    config_file: PathBuf,
}

impl<E: AudioEffects> Console<E> {
    pub fn new(
        bus_producer: Sender<Message>,
        view: Arc<Mutex<ConsoleView>>,
        equalizer: EqualizerController<E>,
        config: Config,
        config_file: PathBuf,
    ) -> Self {
        Self {
            bus_producer,
            view,
            equalizer,
            config,
            config_file,
        }
    }

    fn send(&self, message: Message) {
        let _ = self.bus_producer.send(message);
    }

    fn track_at(&self, selector: &SourceSelector, index: usize) -> Result<Track, String> {
        let view = lock_view(&self.view);
        let tracks = view
            .tracks_for(selector)
            .ok_or_else(|| "no such playlist".to_string())?;
        tracks
            .get(index)
            .cloned()
            .ok_or_else(|| format!("there is no track {}", index + 1))
    }

    fn render_playlists(&self) -> String {
        let view = lock_view(&self.view);
        if view.playlists.is_empty() {
            return "(no playlists)".to_string();
        }
        view.playlists
            .iter()
            .map(|playlist| {
                format!(
                    "  {}  {} ({} songs)",
                    playlist.id,
                    playlist.name,
                    playlist.songs.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_equalizer(&self) -> String {
        let mut lines = vec![format!("preset: {}", self.equalizer.selected_preset())];
        let levels = self.equalizer.levels_millibels();
        for (index, label) in self.equalizer.band_labels().iter().enumerate() {
            lines.push(format!(
                "  {:>2} {:>6} {:+} mB",
                index + 1,
                label,
                levels.get(index).copied().unwrap_or(0)
            ));
        }
        lines.push(format!("presets: {}", self.equalizer.preset_names().join(", ")));
        lines.join("\n")
    }

    fn add_library_folder(&mut self, folder: PathBuf) -> Result<String, String> {
        if !folder.is_dir() {
            return Err(format!("{} is not a folder", folder.display()));
        }
        let folder_text = folder.to_string_lossy().into_owned();
        if !self.config.library.folders.contains(&folder_text) {
            self.config.library.folders.push(folder_text);
            persist_config_file(&self.config, &self.config_file);
        }
        self.send(Message::Library(LibraryMessage::SetLibraryFolders(
            self.config.library.folder_paths(),
        )));
        self.send(Message::Library(LibraryMessage::RequestCatalog));
        Ok(format!("Added {}", folder.display()))
    }

    /// Executes one command. Returns `Ok(None)` to quit.
    pub fn execute(&mut self, command: ConsoleCommand) -> Result<Option<String>, String> {
        let output = match command {
            ConsoleCommand::ListTracks => {
                let view = lock_view(&self.view);
                if view.loading {
                    "Loading music library...".to_string()
                } else {
                    render_tracks(&view.catalog, &view.favorites)
                }
            }
            ConsoleCommand::ListFavorites => {
                let view = lock_view(&self.view);
                let favorites = view
                    .tracks_for(&SourceSelector::Favorites)
                    .unwrap_or_default();
                render_tracks(&favorites, &view.favorites)
            }
            ConsoleCommand::ListPlaylists => self.render_playlists(),
            ConsoleCommand::Status => lock_view(&self.view).status_line(),
            ConsoleCommand::PlayIndex { index, selector } => {
                let track = self.track_at(&selector, index)?;
                let source = match selector {
                    SourceSelector::All => QueueSource::AllSongs,
                    SourceSelector::Favorites => QueueSource::Favorites,
                    SourceSelector::Playlist(playlist_id) => QueueSource::Playlist(playlist_id),
                };
                self.send(Message::Playback(PlaybackMessage::PlayTrack {
                    track_id: track.id,
                    source,
                }));
                String::new()
            }
            ConsoleCommand::Play => self.playback(PlaybackMessage::Play),
            ConsoleCommand::Pause => self.playback(PlaybackMessage::Pause),
            ConsoleCommand::TogglePlayPause => self.playback(PlaybackMessage::TogglePlayPause),
            ConsoleCommand::Next => self.playback(PlaybackMessage::Next),
            ConsoleCommand::Previous => self.playback(PlaybackMessage::Previous),
            ConsoleCommand::Stop => self.playback(PlaybackMessage::Stop),
            ConsoleCommand::Seek(position_ms) => {
                self.playback(PlaybackMessage::SeekTo(position_ms))
            }
            ConsoleCommand::Tab(tab_index) => {
                lock_view(&self.view).tab_index = tab_index;
                self.playback(PlaybackMessage::SelectTab(tab_index))
            }
            ConsoleCommand::ToggleFavorite(index) => {
                let track = self.track_at(&SourceSelector::All, index)?;
                self.send(Message::Library(LibraryMessage::ToggleFavorite(track.id)));
                String::new()
            }
            ConsoleCommand::CreatePlaylist(name) => {
                self.send(Message::Library(LibraryMessage::CreatePlaylist(name)));
                String::new()
            }
            ConsoleCommand::AddToPlaylist { playlist_id, index } => {
                let track = self.track_at(&SourceSelector::All, index)?;
                self.send(Message::Library(LibraryMessage::AddToPlaylist {
                    playlist_id,
                    track_id: track.id,
                }));
                String::new()
            }
            ConsoleCommand::RemoveFromPlaylist { playlist_id, index } => {
                let track = self.track_at(&SourceSelector::Playlist(playlist_id.clone()), index)?;
                self.send(Message::Library(LibraryMessage::RemoveFromPlaylist {
                    playlist_id,
                    track_id: track.id,
                }));
                String::new()
            }
            ConsoleCommand::RenamePlaylist { playlist_id, name } => {
                self.send(Message::Library(LibraryMessage::RenamePlaylist {
                    playlist_id,
                    name,
                }));
                String::new()
            }
            ConsoleCommand::DeletePlaylist(playlist_id) => {
                self.send(Message::Library(LibraryMessage::DeletePlaylist(playlist_id)));
                String::new()
            }
            ConsoleCommand::ListFolder(folder) => {
                self.send(Message::Library(LibraryMessage::ListFolder(folder)));
                String::new()
            }
            ConsoleCommand::AddLibraryFolder(folder) => self.add_library_folder(folder)?,
            ConsoleCommand::Rescan => {
                self.send(Message::Library(LibraryMessage::RequestCatalog));
                String::new()
            }
            ConsoleCommand::Equalizer(EqualizerCommand::Show) => self.render_equalizer(),
            ConsoleCommand::Equalizer(EqualizerCommand::Preset(name)) => {
                self.equalizer
                    .select_preset(&name)
                    .map_err(|err| err.to_string())?;
                self.render_equalizer()
            }
            ConsoleCommand::Equalizer(EqualizerCommand::Band { index, level }) => {
                self.equalizer
                    .set_band(index, level)
                    .map_err(|err| err.to_string())?;
                let labels = self.equalizer.band_labels();
                format!(
                    "{} set to {:.2}",
                    labels.get(index).cloned().unwrap_or_default(),
                    level.clamp(0.0, 1.0)
                )
            }
            ConsoleCommand::Help => HELP_TEXT.to_string(),
            ConsoleCommand::Quit => {
                self.send(Message::Service(ServiceMessage::TaskRemoved));
                self.send(Message::Playback(PlaybackMessage::Shutdown));
                return Ok(None);
            }
        };
        Ok(Some(output))
    }

    fn playback(&self, message: PlaybackMessage) -> String {
        self.send(Message::Playback(message));
        String::new()
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead) {
        println!("jamz ready. Type 'help' for commands.");
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("Console: failed to read input: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let result = parse_command(&line).and_then(|command| self.execute(command));
            match result {
                Ok(Some(output)) => {
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                }
                Ok(None) => return,
                Err(err) => println!("! {}", err),
            }
        }
        debug!("Console: input closed");
        let _ = self.execute(ConsoleCommand::Quit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::tracks;
    use crate::equalizer::FallbackEqualizer;
    use crate::preferences::PreferenceStore;
    use tokio::sync::broadcast;

    #[test]
    fn test_parse_play_variants() {
        assert_eq!(parse_command("play"), Ok(ConsoleCommand::Play));
        assert_eq!(
            parse_command("play 3"),
            Ok(ConsoleCommand::PlayIndex {
                index: 2,
                selector: SourceSelector::All
            })
        );
        assert_eq!(
            parse_command("play 1 pl 1700000000000"),
            Ok(ConsoleCommand::PlayIndex {
                index: 0,
                selector: SourceSelector::Playlist("1700000000000".to_string())
            })
        );
        assert!(parse_command("play 0").is_err());
        assert!(parse_command("play 2 albums").is_err());
    }

    #[test]
    fn test_parse_multi_word_arguments() {
        assert_eq!(
            parse_command("newpl Late   night drive"),
            Ok(ConsoleCommand::CreatePlaylist("Late night drive".to_string()))
        );
        assert_eq!(
            parse_command("renpl 42 Morning run"),
            Ok(ConsoleCommand::RenamePlaylist {
                playlist_id: "42".to_string(),
                name: "Morning run".to_string()
            })
        );
        assert_eq!(
            parse_command("eq preset Heavy Metal"),
            Ok(ConsoleCommand::Equalizer(EqualizerCommand::Preset(
                "Heavy Metal".to_string()
            )))
        );
        assert_eq!(
            parse_command("seek 90"),
            Ok(ConsoleCommand::Seek(90_000))
        );
        assert!(parse_command("seek 18446744073709551615").is_err());
        assert!(parse_command("seek -5").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn test_view_resolves_lists_and_tracks_loading() {
        let catalog = tracks(&["A", "B", "C"]);
        let mut view = ConsoleView::default();
        assert!(view.apply(&Message::Library(LibraryMessage::CatalogLoadStarted)).is_some());
        assert!(view.loading);
        view.apply(&Message::Library(LibraryMessage::CatalogLoaded(catalog.clone())));
        assert!(!view.loading);
        view.apply(&Message::Library(LibraryMessage::FavoritesChanged(vec![
            catalog[2].locator.clone(),
            catalog[0].locator.clone(),
        ])));

        let favorites = view.tracks_for(&SourceSelector::Favorites).expect("favorites");
        assert_eq!(favorites, vec![catalog[2].clone(), catalog[0].clone()]);
        assert_eq!(view.tracks_for(&SourceSelector::Playlist("x".to_string())), None);
    }

    #[test]
    fn test_play_command_sends_track_id_for_selected_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (sender, mut receiver) = broadcast::channel(16);
        let catalog = tracks(&["A", "B", "C"]);
        let view = Arc::new(Mutex::new(ConsoleView {
            catalog: catalog.clone(),
            favorites: vec![catalog[1].locator.clone()],
            ..ConsoleView::default()
        }));
        let equalizer = EqualizerController::load(
            FallbackEqualizer::default(),
            PreferenceStore::open(dir.path().join("equalizer.json")),
        );
        let mut console = Console::new(
            sender,
            view,
            equalizer,
            Config::default(),
            dir.path().join("config.toml"),
        );

        console
            .execute(ConsoleCommand::PlayIndex {
                index: 0,
                selector: SourceSelector::Favorites,
            })
            .expect("play");
        match receiver.try_recv() {
            Ok(Message::Playback(PlaybackMessage::PlayTrack { track_id, source })) => {
                assert_eq!(track_id, catalog[1].id);
                assert_eq!(source, QueueSource::Favorites);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(console
            .execute(ConsoleCommand::PlayIndex {
                index: 5,
                selector: SourceSelector::All,
            })
            .is_err());
        assert_eq!(console.execute(ConsoleCommand::Quit), Ok(None));
        assert!(matches!(
            receiver.try_recv(),
            Ok(Message::Service(ServiceMessage::TaskRemoved))
        ));
    }
}
