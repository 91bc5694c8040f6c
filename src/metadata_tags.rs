//! Tag readers backed by `lofty`, with file-name fallbacks.

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::Tag;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
const ARTIST_TITLE_SEPARATOR: &str = " - ";

/// Raw values read from file tags and audio properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

/// Display metadata after fallbacks have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrackMetadata {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    primary_tag
        .into_iter()
        .chain(tags.iter())
        .filter_map(|tag| extractor(tag))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Reads title, artist and duration from a media file.
pub fn read_track_tags(path: &Path) -> Option<TrackTags> {
    let tagged_file = read_from_path(path).ok()?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let title = first_non_empty_value(primary_tag, tags, |tag| {
        tag.title().map(|value| value.into_owned())
    });
    let artist = first_non_empty_value(primary_tag, tags, |tag| {
        tag.artist().map(|value| value.into_owned())
    });
    let duration_ms = tagged_file.properties().duration().as_millis() as u64;

    Some(TrackTags {
        title,
        artist,
        duration_ms,
    })
}

/// Splits a file stem of the form `Artist - Title`.
pub fn parse_artist_title_from_stem(stem: &str) -> Option<(String, String)> {
    let (artist, title) = stem.split_once(ARTIST_TITLE_SEPARATOR)?;
    let artist = artist.trim();
    let title = title.trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist.to_string(), title.to_string()))
}

/// Applies the fallback chain: tags, then an `Artist - Title` stem, then the
/// bare stem with an unknown artist.
pub fn resolve_track_metadata(path: &Path, tags: Option<TrackTags>) -> ResolvedTrackMetadata {
    let tags = tags.unwrap_or_default();
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::trim)
        .unwrap_or_default();
    let parsed = parse_artist_title_from_stem(stem);

    let title = if !tags.title.is_empty() {
        tags.title
    } else if let Some((_, title)) = parsed.as_ref() {
        title.clone()
    } else {
        stem.to_string()
    };
    let artist = if !tags.artist.is_empty() {
        tags.artist
    } else if let Some((artist, _)) = parsed {
        artist
    } else {
        UNKNOWN_ARTIST.to_string()
    };

    ResolvedTrackMetadata {
        title,
        artist,
        duration_ms: tags.duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artist_title_from_stem() {
        assert_eq!(
            parse_artist_title_from_stem("Daft Punk - Aerodynamic"),
            Some(("Daft Punk".to_string(), "Aerodynamic".to_string()))
        );
        assert_eq!(parse_artist_title_from_stem("Aerodynamic"), None);
        assert_eq!(parse_artist_title_from_stem(" - Aerodynamic"), None);
    }

    #[test]
    fn test_tags_take_precedence_over_file_name() {
        let resolved = resolve_track_metadata(
            Path::new("/m/Someone - Something.mp3"),
            Some(TrackTags {
                title: "Real Title".to_string(),
                artist: String::new(),
                duration_ms: 1_000,
            }),
        );
        assert_eq!(resolved.title, "Real Title");
        assert_eq!(resolved.artist, "Someone");
        assert_eq!(resolved.duration_ms, 1_000);
    }

    #[test]
    fn test_untagged_file_falls_back_to_stem_and_unknown_artist() {
        let resolved = resolve_track_metadata(Path::new("/m/track01.ogg"), None);
        assert_eq!(resolved.title, "track01");
        assert_eq!(resolved.artist, UNKNOWN_ARTIST);
        assert_eq!(resolved.duration_ms, 0);
    }

    #[test]
    fn test_unreadable_file_has_no_tags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.flac");
        std::fs::write(&path, b"not audio").expect("write");
        assert_eq!(read_track_tags(&path), None);
    }
}
