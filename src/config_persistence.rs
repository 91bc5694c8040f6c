//! Loading and comment-preserving persistence of `config.toml`.

use std::path::{Path, PathBuf};

use log::{info, warn};
use toml_edit::{value, Array, DocumentMut, Item, Table};

use crate::config::{sanitize_config, Config};

pub const CONFIG_DIR_NAME: &str = "jamz";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration directory is available on this platform")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn system_config_template_text() -> &'static str {
    include_str!("../config/config.system.toml")
}

pub fn default_config_file() -> Result<PathBuf, ConfigError> {
    let config_root = dirs::config_dir()
        .ok_or(ConfigError::NoConfigDir)?
        .join(CONFIG_DIR_NAME);
    Ok(config_root.join(CONFIG_FILE_NAME))
}

/// Reads `config_file`, writing the commented template first if it does not
/// exist. Unparseable files fall back to defaults.
pub fn load_or_create_config(config_file: &Path) -> Result<Config, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: config_file.to_path_buf(),
        source,
    };
    if let Some(config_root) = config_file.parent() {
        std::fs::create_dir_all(config_root).map_err(io_error)?;
    }
    if !config_file.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        std::fs::write(config_file, system_config_template_text()).map_err(io_error)?;
    }

    let config_content = std::fs::read_to_string(config_file).map_err(io_error)?;
    let config = toml::from_str::<Config>(&config_content).unwrap_or_else(|err| {
        warn!(
            "Config file {} is invalid ({}). Using defaults.",
            config_file.display(),
            err
        );
        Config::default()
    });
    Ok(sanitize_config(config))
}

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn set_table_scalar_if_changed<T, F>(
    table: &mut Table,
    key: &str,
    previous_value: T,
    next_value: T,
    to_item: F,
) where
    T: PartialEq,
    F: FnOnce(T) -> Item,
{
    if table.contains_key(key) && previous_value == next_value {
        return;
    }
    set_table_value_preserving_decor(table, key, to_item(next_value));
}

fn section_table<'a>(document: &'a mut DocumentMut, key: &str) -> &'a mut Table {
    let root = document.as_table_mut();
    let should_replace = !matches!(root.get(key), Some(item) if item.is_table());
    if should_replace {
        root.insert(key, Item::Table(Table::new()));
    }
    match root.get_mut(key).and_then(Item::as_table_mut) {
        Some(table) => table,
        None => unreachable!("section {} was inserted as a table", key),
    }
}

fn u64_item(next: u64) -> Item {
    value(i64::try_from(next).unwrap_or(i64::MAX))
}

fn write_config_to_document(document: &mut DocumentMut, previous: &Config, config: &Config) {
    {
        let library = section_table(document, "library");
        set_table_scalar_if_changed(
            library,
            "folders",
            &previous.library.folders,
            &config.library.folders,
            |folders| value(folders.iter().map(String::as_str).collect::<Array>()),
        );
        set_table_scalar_if_changed(
            library,
            "online_artwork",
            previous.library.online_artwork,
            config.library.online_artwork,
            value,
        );
    }
    {
        let playback = section_table(document, "playback");
        set_table_scalar_if_changed(
            playback,
            "event_coalesce_interval_ms",
            previous.playback.event_coalesce_interval_ms,
            config.playback.event_coalesce_interval_ms,
            u64_item,
        );
        set_table_scalar_if_changed(
            playback,
            "position_poll_interval_ms",
            previous.playback.position_poll_interval_ms,
            config.playback.position_poll_interval_ms,
            u64_item,
        );
    }
    {
        let notifications = section_table(document, "notifications");
        let (before, after) = (&previous.notifications, &config.notifications);
        set_table_scalar_if_changed(
            notifications,
            "min_update_interval_ms",
            before.min_update_interval_ms,
            after.min_update_interval_ms,
            u64_item,
        );
        set_table_scalar_if_changed(
            notifications,
            "session_min_update_interval_ms",
            before.session_min_update_interval_ms,
            after.session_min_update_interval_ms,
            u64_item,
        );
        set_table_scalar_if_changed(
            notifications,
            "progress_refresh_interval_ms",
            before.progress_refresh_interval_ms,
            after.progress_refresh_interval_ms,
            u64_item,
        );
        set_table_scalar_if_changed(
            notifications,
            "desktop_notifications",
            before.desktop_notifications,
            after.desktop_notifications,
            value,
        );
        set_table_scalar_if_changed(
            notifications,
            "small_icon",
            before.small_icon.as_str(),
            after.small_icon.as_str(),
            value,
        );
        set_table_scalar_if_changed(
            notifications,
            "large_icon",
            before.large_icon.as_str(),
            after.large_icon.as_str(),
            value,
        );
    }
    {
        let storage = section_table(document, "storage");
        set_table_scalar_if_changed(
            storage,
            "data_dir",
            previous.storage.data_dir.as_str(),
            config.storage.data_dir.as_str(),
            value,
        );
    }
    {
        let logging = section_table(document, "logging");
        set_table_scalar_if_changed(
            logging,
            "level",
            previous.logging.level.as_str(),
            config.logging.level.as_str(),
            value,
        );
    }
}

pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let previous = toml::from_str::<Config>(existing_text)
        .map_err(|err| format!("failed to parse existing config as Config: {}", err))?;
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    write_config_to_document(&mut document, &previous, config);
    Ok(document.to_string())
}

pub fn persist_config_file(config: &Config, path: &Path) {
    let existing_text = std::fs::read_to_string(path).ok();
    let config_text = if let Some(existing_text) = existing_text {
        match serialize_config_with_preserved_comments(&existing_text, config) {
            Ok(updated_text) => Some(updated_text),
            Err(err) => {
                warn!(
                    "Failed to preserve config comments for {} ({}). Falling back to plain serialization.",
                    path.display(),
                    err
                );
                toml::to_string(config).ok()
            }
        }
    } else {
        toml::to_string(config).ok()
    };

    let Some(config_text) = config_text else {
        log::error!("Failed to serialize config for {}", path.display());
        return;
    };

    if let Err(err) = std::fs::write(path, config_text) {
        log::error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_keep_comments_and_untouched_keys() {
        let existing = system_config_template_text();
        let mut config: Config = toml::from_str(existing).expect("template parses");
        config.library.folders = vec!["/srv/music".to_string()];
        config.playback.position_poll_interval_ms = 400;

        let updated =
            serialize_config_with_preserved_comments(existing, &config).expect("serialized");
        assert!(updated.contains("# Position refresh while playing."));
        assert!(updated.contains("position_poll_interval_ms = 400"));
        assert!(updated.contains("event_coalesce_interval_ms = 100"));

        let reparsed: Config = toml::from_str(&updated).expect("reparsed");
        assert_eq!(reparsed.library.folders, vec!["/srv/music".to_string()]);
    }

    #[test]
    fn test_missing_sections_are_added() {
        let config = Config::default();
        let updated =
            serialize_config_with_preserved_comments("", &config).expect("serialized");
        let reparsed: Config = toml::from_str(&updated).expect("reparsed");
        assert_eq!(reparsed.playback, config.playback);
        assert_eq!(reparsed.notifications, config.notifications);
    }

    #[test]
    fn test_load_or_create_writes_template_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_file = dir.path().join("jamz").join(CONFIG_FILE_NAME);

        let config = load_or_create_config(&config_file).expect("config");
        assert_eq!(config.playback.position_poll_interval_ms, 200);
        assert_eq!(
            std::fs::read_to_string(&config_file).expect("read"),
            system_config_template_text()
        );

        std::fs::write(&config_file, "not [valid toml").expect("write");
        let config = load_or_create_config(&config_file).expect("config");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_persist_round_trips_folder_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_file = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_file, system_config_template_text()).expect("write");

        let mut config = load_or_create_config(&config_file).expect("config");
        config.library.folders.push("/mnt/extra".to_string());
        persist_config_file(&config, &config_file);

        let reloaded = load_or_create_config(&config_file).expect("config");
        assert!(reloaded.library.folders.contains(&"/mnt/extra".to_string()));
    }
}
