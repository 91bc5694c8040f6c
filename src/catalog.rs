//! Track catalog: the immutable list of playable tracks found in the
//! configured library folders.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::media_file_discovery::{
    collect_audio_files_from_library_folders, count_audio_files_in_folder, list_folder_children,
};
use crate::metadata_tags::{read_track_tags, resolve_track_metadata};
use crate::track_uri::{artwork_search_url, encode_track_locator};

/// A playable track. Immutable once built; the catalog is replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub locator: String,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    pub online_artwork: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to scan library folders: {0}")]
    Scan(#[from] std::io::Error),
    #[error("failed to list folder {folder}: {source}")]
    ListFolder {
        folder: PathBuf,
        source: std::io::Error,
    },
}

/// One row of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEntry {
    Folder {
        path: PathBuf,
        name: String,
        music_file_count: usize,
    },
    Track(Track),
}

/// Stable id derived from the file path, so ids survive catalog reloads.
/// Kept within `i64` range so it can be stored as a JSON integer.
pub fn track_id_for_path(path: &Path) -> u64 {
    let digest = md5::compute(path.to_string_lossy().as_bytes());
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(id_bytes) & i64::MAX as u64
}

pub fn track_from_path(path: &Path, options: CatalogOptions) -> Track {
    let metadata = resolve_track_metadata(path, read_track_tags(path));
    let artwork_url = options
        .online_artwork
        .then(|| artwork_search_url(&metadata.artist, &metadata.title));
    Track {
        id: track_id_for_path(path),
        title: metadata.title,
        artist: metadata.artist,
        duration_ms: metadata.duration_ms,
        locator: encode_track_locator(path),
        artwork_url,
    }
}

/// Orders tracks by title, case-insensitively.
pub fn sort_by_title(tracks: &mut [Track]) {
    tracks.sort_by(|left, right| {
        left.title
            .to_lowercase()
            .cmp(&right.title.to_lowercase())
            .then_with(|| left.locator.cmp(&right.locator))
    });
}

/// Scans the library folders and builds the catalog.
pub fn load_catalog(
    folders: &[PathBuf],
    options: CatalogOptions,
) -> Result<Vec<Track>, CatalogError> {
    let paths = collect_audio_files_from_library_folders(folders)?;
    let mut tracks: Vec<Track> = paths
        .iter()
        .map(|path| track_from_path(path, options))
        .collect();
    sort_by_title(&mut tracks);
    info!(
        "Catalog: loaded {} tracks from {} folders",
        tracks.len(),
        folders.len()
    );
    Ok(tracks)
}

/// Lists a folder for browsing: sub-folders with their recursive music-file
/// counts, then the playable files directly inside it.
pub fn list_folder(folder: &Path, options: CatalogOptions) -> Result<Vec<FolderEntry>, CatalogError> {
    let (folders, files) = list_folder_children(folder).map_err(|source| CatalogError::ListFolder {
        folder: folder.to_path_buf(),
        source,
    })?;
    debug!(
        "Catalog: {} has {} folders and {} files",
        folder.display(),
        folders.len(),
        files.len()
    );

    let mut entries: Vec<FolderEntry> = folders
        .into_iter()
        .map(|path| FolderEntry::Folder {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            music_file_count: count_audio_files_in_folder(&path),
            path,
        })
        .collect();
    entries.extend(
        files
            .iter()
            .map(|path| FolderEntry::Track(track_from_path(path, options))),
    );
    Ok(entries)
}

pub fn find_track_by_id(tracks: &[Track], track_id: u64) -> Option<&Track> {
    tracks.iter().find(|track| track.id == track_id)
}

pub fn find_track_by_locator<'a>(tracks: &'a [Track], locator: &str) -> Option<&'a Track> {
    tracks.iter().find(|track| track.locator == locator)
}

/// Maps stored locators to catalog tracks, preserving the locator order and
/// skipping locators that are no longer in the catalog.
pub fn tracks_for_locators(catalog: &[Track], locators: &[String]) -> Vec<Track> {
    locators
        .iter()
        .filter_map(|locator| find_track_by_locator(catalog, locator).cloned())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Track;

    /// Builds an in-memory track with a locator derived from its title.
    pub fn track(id: u64, title: &str) -> Track {
        Track {
            id,
            title: title.to_string(),
            artist: "Test Artist".to_string(),
            duration_ms: 180_000,
            locator: format!("file:///music/{}.mp3", title),
            artwork_url: None,
        }
    }

    pub fn tracks(titles: &[&str]) -> Vec<Track> {
        titles
            .iter()
            .enumerate()
            .map(|(index, title)| track(index as u64 + 1, title))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::tracks;
    use super::*;
    use std::fs;

    #[test]
    fn test_track_ids_are_stable_per_path() {
        let first = track_id_for_path(Path::new("/music/a.mp3"));
        assert_eq!(first, track_id_for_path(Path::new("/music/a.mp3")));
        assert_ne!(first, track_id_for_path(Path::new("/music/b.mp3")));
        assert!(first <= i64::MAX as u64);
    }

    #[test]
    fn test_catalog_is_sorted_by_title_and_uses_file_name_fallbacks() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("zeta.mp3"), b"").expect("write");
        fs::write(dir.path().join("Alpha Band - beta.flac"), b"").expect("write");

        let catalog = load_catalog(&[dir.path().to_path_buf()], CatalogOptions::default())
            .expect("catalog");
        let titles: Vec<&str> = catalog.iter().map(|track| track.title.as_str()).collect();
        assert_eq!(titles, vec!["beta", "zeta"]);
        assert_eq!(catalog[0].artist, "Alpha Band");
        assert_eq!(catalog[1].artist, "Unknown Artist");
        assert!(catalog.iter().all(|track| track.artwork_url.is_none()));
        assert!(catalog[1].locator.starts_with("file://"));
    }

    #[test]
    fn test_online_artwork_builds_search_url() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Band - Song.mp3");
        fs::write(&path, b"").expect("write");
        let track = track_from_path(
            &path,
            CatalogOptions {
                online_artwork: true,
            },
        );
        assert_eq!(
            track.artwork_url.as_deref(),
            Some("https://itunes.apple.com/search?term=Band+Song&entity=song&limit=1")
        );
    }

    #[test]
    fn test_unreadable_library_reports_scan_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_catalog(&[dir.path().join("gone")], CatalogOptions::default());
        assert!(matches!(result, Err(CatalogError::Scan(_))));
    }

    #[test]
    fn test_folder_listing_counts_music_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("Album/Disc 2")).expect("mkdir");
        fs::write(dir.path().join("Album/01.mp3"), b"").expect("write");
        fs::write(dir.path().join("Album/Disc 2/01.mp3"), b"").expect("write");
        fs::write(dir.path().join("loose.wav"), b"").expect("write");

        let entries = list_folder(dir.path(), CatalogOptions::default()).expect("listing");
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            FolderEntry::Folder {
                name,
                music_file_count,
                ..
            } => {
                assert_eq!(name, "Album");
                assert_eq!(*music_file_count, 2);
            }
            other => panic!("expected folder entry, got {:?}", other),
        }
        assert!(matches!(&entries[1], FolderEntry::Track(track) if track.title == "loose"));
    }

    #[test]
    fn test_locators_map_to_tracks_in_stored_order() {
        let catalog = tracks(&["A", "B", "C"]);
        let locators = vec![
            catalog[2].locator.clone(),
            "file:///music/removed.mp3".to_string(),
            catalog[0].locator.clone(),
        ];
        let resolved = tracks_for_locators(&catalog, &locators);
        let titles: Vec<&str> = resolved.iter().map(|track| track.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A"]);
    }
}
