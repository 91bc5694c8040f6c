use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
};

use log::debug;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "aac", "m4a"];

pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Walks `folder_path` recursively. Only a failure to read the root itself is
/// reported; unreadable nested entries are skipped.
pub fn collect_audio_files_from_folder(folder_path: &Path) -> io::Result<Vec<PathBuf>> {
    let root_entries = std::fs::read_dir(folder_path)?;
    let mut pending_directories = Vec::new();
    let mut tracks = Vec::new();
    let mut current = Some((folder_path.to_path_buf(), root_entries));

    while let Some((directory, entries)) = current.take() {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Failed to read a directory entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            if is_hidden(&path) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending_directories.push(path);
                continue;
            }

            if file_type.is_file() && is_supported_audio_file(&path) {
                tracks.push(path);
            }
        }

        while let Some(directory) = pending_directories.pop() {
            match std::fs::read_dir(&directory) {
                Ok(entries) => {
                    current = Some((directory, entries));
                    break;
                }
                Err(err) => {
                    debug!("Failed to read directory {}: {}", directory.display(), err);
                }
            }
        }
    }

    tracks.sort_unstable();
    Ok(tracks)
}

/// Collects the audio files of every library folder without duplicates.
/// Fails only when none of the folders could be read.
pub fn collect_audio_files_from_library_folders(folders: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    let mut tracks = BTreeSet::new();
    let mut last_error = None;
    let mut readable_folders = 0usize;
    for folder in folders {
        match collect_audio_files_from_folder(folder) {
            Ok(found) => {
                readable_folders += 1;
                tracks.extend(found);
            }
            Err(err) => {
                debug!("Failed to scan library folder {}: {}", folder.display(), err);
                last_error = Some(err);
            }
        }
    }
    match last_error {
        Some(err) if readable_folders == 0 => Err(err),
        _ => Ok(tracks.into_iter().collect()),
    }
}

pub fn count_audio_files_in_folder(folder_path: &Path) -> usize {
    collect_audio_files_from_folder(folder_path)
        .map(|tracks| tracks.len())
        .unwrap_or(0)
}

/// Direct children of `folder_path`: sub-folders and playable files, both
/// sorted by path.
pub fn list_folder_children(folder_path: &Path) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder_path)? {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => folders.push(path),
            Ok(file_type) if file_type.is_file() && is_supported_audio_file(&path) => {
                files.push(path)
            }
            Ok(_) => {}
            Err(err) => debug!("Failed to inspect {}: {}", path.display(), err),
        }
    }
    folders.sort_unstable();
    files.sort_unstable();
    Ok((folders, files))
}
