//! Persistent application configuration model and defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library folders and catalog options.
    pub library: LibraryConfig,
    #[serde(default)]
    /// UI-state bridge timing.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// Notification and media session publishing.
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_folders")]
    pub folders: Vec<String>,
    /// Attach an artwork search URL to each track.
    #[serde(default)]
    pub online_artwork: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_event_coalesce_interval_ms")]
    pub event_coalesce_interval_ms: u64,
    #[serde(default = "default_position_poll_interval_ms")]
    pub position_poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_min_update_interval_ms")]
    pub min_update_interval_ms: u64,
    #[serde(default = "default_session_min_update_interval_ms")]
    pub session_min_update_interval_ms: u64,
    #[serde(default = "default_progress_refresh_interval_ms")]
    pub progress_refresh_interval_ms: u64,
    #[serde(default = "default_true")]
    pub desktop_notifications: bool,
    #[serde(default = "default_small_icon")]
    pub small_icon: String,
    /// Optional image file shown as the large icon.
    #[serde(default)]
    pub large_icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StorageConfig {
    /// Overrides the platform data directory when non-empty.
    #[serde(default)]
    pub data_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            folders: default_library_folders(),
            online_artwork: false,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            event_coalesce_interval_ms: default_event_coalesce_interval_ms(),
            position_poll_interval_ms: default_position_poll_interval_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            min_update_interval_ms: default_min_update_interval_ms(),
            session_min_update_interval_ms: default_session_min_update_interval_ms(),
            progress_refresh_interval_ms: default_progress_refresh_interval_ms(),
            desktop_notifications: true,
            small_icon: default_small_icon(),
            large_icon: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_library_folders() -> Vec<String> {
    dirs::audio_dir()
        .map(|path| vec![path.to_string_lossy().into_owned()])
        .unwrap_or_default()
}

fn default_event_coalesce_interval_ms() -> u64 {
    100
}

fn default_position_poll_interval_ms() -> u64 {
    200
}

fn default_min_update_interval_ms() -> u64 {
    500
}

fn default_session_min_update_interval_ms() -> u64 {
    300
}

fn default_progress_refresh_interval_ms() -> u64 {
    1_000
}

fn default_small_icon() -> String {
    "media-playback-start".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LibraryConfig {
    pub fn folder_paths(&self) -> Vec<PathBuf> {
        self.folders.iter().map(PathBuf::from).collect()
    }
}

impl PlaybackConfig {
    pub fn event_coalesce_interval(&self) -> Duration {
        Duration::from_millis(self.event_coalesce_interval_ms)
    }

    pub fn position_poll_interval(&self) -> Duration {
        Duration::from_millis(self.position_poll_interval_ms)
    }
}

impl NotificationConfig {
    pub fn large_icon_path(&self) -> Option<PathBuf> {
        let trimmed = self.large_icon.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

impl LoggingConfig {
    /// Unknown levels fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level
            .trim()
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}

/// Clamps timing values into workable ranges and drops blank folders.
pub fn sanitize_config(config: Config) -> Config {
    let mut folders: Vec<String> = Vec::new();
    for folder in config.library.folders {
        let folder = folder.trim().to_string();
        if !folder.is_empty() && !folders.contains(&folder) {
            folders.push(folder);
        }
    }

    Config {
        library: LibraryConfig {
            folders,
            online_artwork: config.library.online_artwork,
        },
        playback: PlaybackConfig {
            event_coalesce_interval_ms: config.playback.event_coalesce_interval_ms.min(5_000),
            position_poll_interval_ms: config.playback.position_poll_interval_ms.clamp(50, 5_000),
        },
        notifications: NotificationConfig {
            min_update_interval_ms: config.notifications.min_update_interval_ms.min(10_000),
            session_min_update_interval_ms: config
                .notifications
                .session_min_update_interval_ms
                .min(10_000),
            progress_refresh_interval_ms: config
                .notifications
                .progress_refresh_interval_ms
                .clamp(250, 60_000),
            small_icon: if config.notifications.small_icon.trim().is_empty() {
                default_small_icon()
            } else {
                config.notifications.small_icon
            },
            ..config.notifications
        },
        storage: config.storage,
        logging: config.logging,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_expected_timings() {
        let config = Config::default();
        assert_eq!(config.playback.event_coalesce_interval_ms, 100);
        assert_eq!(config.playback.position_poll_interval_ms, 200);
        assert_eq!(config.notifications.min_update_interval_ms, 500);
        assert_eq!(config.notifications.session_min_update_interval_ms, 300);
        assert_eq!(config.notifications.progress_refresh_interval_ms, 1_000);
        assert!(config.notifications.desktop_notifications);
        assert!(!config.library.online_artwork);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_partial_config_fills_missing_sections_with_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [library]
            folders = ["/srv/music"]

            [playback]
            position_poll_interval_ms = 250
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(parsed.library.folders, vec!["/srv/music".to_string()]);
        assert_eq!(parsed.playback.position_poll_interval_ms, 250);
        assert_eq!(parsed.playback.event_coalesce_interval_ms, 100);
        assert_eq!(parsed.notifications, NotificationConfig::default());
    }

    #[test]
    fn test_system_config_template_matches_default_values() {
        let parsed: Config = toml::from_str(include_str!("../config/config.system.toml"))
            .expect("system config template should parse");
        let defaults = Config::default();

        assert_eq!(parsed.library.online_artwork, defaults.library.online_artwork);
        assert_eq!(parsed.playback, defaults.playback);
        assert_eq!(parsed.notifications, defaults.notifications);
        assert_eq!(parsed.storage, defaults.storage);
        assert_eq!(parsed.logging, defaults.logging);
    }

    #[test]
    fn test_sanitize_config_clamps_intervals_and_dedupes_folders() {
        let input = Config {
            library: LibraryConfig {
                folders: vec![
                    " /music ".to_string(),
                    "/music".to_string(),
                    "".to_string(),
                ],
                online_artwork: true,
            },
            playback: PlaybackConfig {
                event_coalesce_interval_ms: 60_000,
                position_poll_interval_ms: 1,
            },
            notifications: NotificationConfig {
                progress_refresh_interval_ms: 0,
                small_icon: "  ".to_string(),
                ..NotificationConfig::default()
            },
            ..Config::default()
        };

        let sanitized = sanitize_config(input);
        assert_eq!(sanitized.library.folders, vec!["/music".to_string()]);
        assert_eq!(sanitized.playback.event_coalesce_interval_ms, 5_000);
        assert_eq!(sanitized.playback.position_poll_interval_ms, 50);
        assert_eq!(sanitized.notifications.progress_refresh_interval_ms, 250);
        assert_eq!(sanitized.notifications.small_icon, "media-playback-start");
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        let logging = LoggingConfig {
            level: "DEBUG".to_string(),
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
    }
}
