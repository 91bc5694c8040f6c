//! Track locator helpers.
//!
//! Tracks are identified on the bus and in persisted state by a `file://`
//! locator string, so favorites and playlists survive catalog reloads.

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";
const ARTWORK_SEARCH_ENDPOINT: &str = "https://itunes.apple.com/search";

/// Encodes a filesystem path as a percent-encoded `file://` locator.
pub fn encode_track_locator(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded_segments: Vec<String> = raw
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    let joined = encoded_segments.join("/");
    if joined.starts_with('/') {
        format!("{}{}", FILE_SCHEME, joined)
    } else {
        format!("{}/{}", FILE_SCHEME, joined)
    }
}

/// Returns true if the locator uses the local file scheme.
pub fn is_local_track_locator(locator: &str) -> bool {
    locator.starts_with(FILE_SCHEME)
}

/// Parses a `file://` locator back into a filesystem path.
pub fn parse_track_locator(locator: &str) -> Option<PathBuf> {
    let rest = locator.strip_prefix(FILE_SCHEME)?;
    if rest.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(rest).ok()?;
    Some(PathBuf::from(decoded.as_ref()))
}

/// Builds the remote artwork search URL for a track.
pub fn artwork_search_url(artist: &str, title: &str) -> String {
    let term = format!("{} {}", artist.trim(), title.trim());
    let encoded_term = urlencoding::encode(term.trim()).replace("%20", "+");
    format!(
        "{}?term={}&entity=song&limit=1",
        ARTWORK_SEARCH_ENDPOINT, encoded_term
    )
}

#[cfg(test)]
mod tests {
    use super::{
        artwork_search_url, encode_track_locator, is_local_track_locator, parse_track_locator,
    };
    use std::path::{Path, PathBuf};

    #[test]
    fn test_locator_escapes_spaces_and_decodes_back() {
        let path = Path::new("/music/Daft Punk/One More Time.mp3");
        let locator = encode_track_locator(path);
        assert_eq!(locator, "file:///music/Daft%20Punk/One%20More%20Time.mp3");
        assert_eq!(parse_track_locator(&locator), Some(path.to_path_buf()));
    }

    #[test]
    fn test_non_file_locators_are_rejected() {
        assert!(!is_local_track_locator("content://media/external/audio/1"));
        assert_eq!(parse_track_locator("https://example.com/a.mp3"), None);
        assert_eq!(parse_track_locator("file://"), None);
        assert_eq!(
            parse_track_locator("file:///tmp/a%23b.flac"),
            Some(PathBuf::from("/tmp/a#b.flac"))
        );
    }

    #[test]
    fn test_artwork_search_url_joins_artist_and_title() {
        assert_eq!(
            artwork_search_url("Daft Punk", "Aerodynamic"),
            "https://itunes.apple.com/search?term=Daft+Punk+Aerodynamic&entity=song&limit=1"
        );
    }
}
