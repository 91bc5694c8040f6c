//! Equalizer settings model.
//!
//! Band levels are kept normalized to `0.0..=1.0` across the effect's level
//! range. DSP belongs to whatever implements `AudioEffects`; the fallback
//! profile only records what would be applied.

use log::{debug, info, warn};

use crate::preferences::{PersistenceError, PreferenceStore};

pub const SELECTED_PRESET_KEY: &str = "selected_preset";
pub const CUSTOM_BANDS_KEY: &str = "custom_bands";
pub const DEFAULT_PRESET: &str = "Normal";
pub const CUSTOM_PRESET: &str = "Custom";

const FALLBACK_FREQUENCIES_HZ: [u32; 10] = [32, 64, 125, 250, 500, 1_000, 2_000, 4_000, 8_000, 16_000];
const FALLBACK_LEVEL_RANGE_MB: (i32, i32) = (-1_500, 1_500);
const FALLBACK_PRESETS: [&str; 10] = [
    "Normal",
    "Classical",
    "Dance",
    "Folk",
    "Heavy Metal",
    "Hip Hop",
    "Jazz",
    "Pop",
    "Rock",
    "Custom",
];

#[derive(Debug, thiserror::Error)]
pub enum EqualizerError {
    #[error("unknown preset {0}")]
    UnknownPreset(String),
    #[error("band {index} is out of range for {count} bands")]
    BandOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// An audio effect chain that exposes a graphic equalizer.
pub trait AudioEffects {
    fn center_frequencies_hz(&self) -> Vec<u32>;
    /// Inclusive band level range in millibels.
    fn level_range_millibels(&self) -> (i32, i32);
    fn preset_names(&self) -> Vec<String>;
    /// Normalized levels of a built-in preset, or `None` if unknown.
    fn preset_levels(&self, preset: &str) -> Option<Vec<f32>>;
    fn apply_levels(&mut self, levels_millibels: &[i32]);

    fn band_count(&self) -> usize {
        self.center_frequencies_hz().len()
    }
}

/// Ten-band profile used when no platform equalizer is attached.
#[derive(Debug, Default)]
pub struct FallbackEqualizer {
    applied_millibels: Vec<i32>,
}

impl FallbackEqualizer {
    pub fn applied_millibels(&self) -> &[i32] {
        &self.applied_millibels
    }
}

impl AudioEffects for FallbackEqualizer {
    fn center_frequencies_hz(&self) -> Vec<u32> {
        FALLBACK_FREQUENCIES_HZ.to_vec()
    }

    fn level_range_millibels(&self) -> (i32, i32) {
        FALLBACK_LEVEL_RANGE_MB
    }

    fn preset_names(&self) -> Vec<String> {
        FALLBACK_PRESETS.iter().map(|name| name.to_string()).collect()
    }

    fn preset_levels(&self, preset: &str) -> Option<Vec<f32>> {
        let levels: [f32; 10] = match preset {
            "Normal" | "Custom" => [0.5; 10],
            "Classical" => [0.4, 0.4, 0.4, 0.4, 0.5, 0.5, 0.4, 0.3, 0.3, 0.2],
            "Dance" => [0.7, 0.8, 0.85, 0.75, 0.6, 0.4, 0.4, 0.5, 0.7, 0.8],
            "Folk" => [0.8, 0.5, 0.5, 0.7, 0.7, 0.6, 0.5, 0.4, 0.4, 0.4],
            "Heavy Metal" => [0.9, 0.8, 0.5, 0.7, 0.2, 0.5, 0.8, 0.9, 0.8, 0.5],
            "Hip Hop" => [0.9, 0.95, 0.8, 0.6, 0.4, 0.4, 0.5, 0.7, 0.8, 0.8],
            "Jazz" => [0.9, 0.8, 0.6, 0.7, 0.4, 0.4, 0.5, 0.6, 0.8, 0.8],
            "Pop" => [0.4, 0.5, 0.5, 0.6, 0.9, 0.8, 0.6, 0.5, 0.4, 0.4],
            "Rock" => [1.0, 0.9, 0.8, 0.5, 0.4, 0.4, 0.5, 0.8, 0.9, 0.9],
            _ => return None,
        };
        Some(levels.to_vec())
    }

    fn apply_levels(&mut self, levels_millibels: &[i32]) {
        debug!("FallbackEqualizer: no DSP attached, recording {:?}", levels_millibels);
        self.applied_millibels = levels_millibels.to_vec();
    }
}

/// `"{f}Hz"` below 1 kHz, `"{f/1000}kHz"` from there up.
pub fn frequency_label(frequency_hz: u32) -> String {
    if frequency_hz < 1_000 {
        format!("{}Hz", frequency_hz)
    } else {
        format!("{}kHz", frequency_hz / 1_000)
    }
}

fn to_millibels(level: f32, (min, max): (i32, i32)) -> i32 {
    let span = (max - min) as f32;
    min + (level.clamp(0.0, 1.0) * span).round() as i32
}

pub struct EqualizerController<E: AudioEffects> {
    effects: E,
    store: PreferenceStore,
    selected_preset: String,
    levels: Vec<f32>,
}

impl<E: AudioEffects> EqualizerController<E> {
    /// Restores the saved preset. Saved custom levels are only used when
    /// their count matches the effect's band count.
    pub fn load(effects: E, store: PreferenceStore) -> Self {
        let band_count = effects.band_count();
        let saved_preset = store
            .get_string(SELECTED_PRESET_KEY)
            .unwrap_or(DEFAULT_PRESET)
            .to_string();
        let selected_preset = if saved_preset == CUSTOM_PRESET
            || effects.preset_levels(&saved_preset).is_some()
        {
            saved_preset
        } else {
            warn!("EqualizerController: unknown saved preset {}", saved_preset);
            DEFAULT_PRESET.to_string()
        };

        let custom_levels = (selected_preset == CUSTOM_PRESET)
            .then(|| store.get_string(CUSTOM_BANDS_KEY))
            .flatten()
            .and_then(|encoded| serde_json::from_str::<Vec<f32>>(encoded).ok())
            .filter(|levels| levels.len() == band_count);
        let levels = custom_levels
            .or_else(|| effects.preset_levels(&selected_preset))
            .filter(|levels| levels.len() == band_count)
            .unwrap_or_else(|| vec![0.5; band_count]);

        let mut controller = Self {
            effects,
            store,
            selected_preset,
            levels,
        };
        controller.apply();
        controller
    }

    pub fn selected_preset(&self) -> &str {
        &self.selected_preset
    }

    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    pub fn preset_names(&self) -> Vec<String> {
        self.effects.preset_names()
    }

    pub fn band_labels(&self) -> Vec<String> {
        self.effects
            .center_frequencies_hz()
            .into_iter()
            .map(frequency_label)
            .collect()
    }

    pub fn levels_millibels(&self) -> Vec<i32> {
        let range = self.effects.level_range_millibels();
        self.levels
            .iter()
            .map(|level| to_millibels(*level, range))
            .collect()
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    /// Switching to `Custom` keeps the current levels.
    pub fn select_preset(&mut self, preset: &str) -> Result<(), EqualizerError> {
        if preset != CUSTOM_PRESET {
            let levels = self
                .effects
                .preset_levels(preset)
                .ok_or_else(|| EqualizerError::UnknownPreset(preset.to_string()))?;
            self.levels = levels;
        }
        self.selected_preset = preset.to_string();
        self.persist()?;
        self.apply();
        info!("EqualizerController: preset {}", preset);
        Ok(())
    }

    /// Moving a band turns the selection into `Custom`.
    pub fn set_band(&mut self, index: usize, level: f32) -> Result<(), EqualizerError> {
        let count = self.levels.len();
        let Some(slot) = self.levels.get_mut(index) else {
            return Err(EqualizerError::BandOutOfRange { index, count });
        };
        *slot = level.clamp(0.0, 1.0);
        self.selected_preset = CUSTOM_PRESET.to_string();
        self.persist()?;
        self.apply();
        Ok(())
    }

    fn persist(&mut self) -> Result<(), PersistenceError> {
        self.store
            .put_string(SELECTED_PRESET_KEY, self.selected_preset.clone());
        if self.selected_preset == CUSTOM_PRESET {
            let encoded = serde_json::to_string(&self.levels).map_err(|source| {
                PersistenceError::Serialize {
                    path: self.store.path().to_path_buf(),
                    source,
                }
            })?;
            self.store.put_string(CUSTOM_BANDS_KEY, encoded);
        }
        self.store.commit()
    }

    fn apply(&mut self) {
        let levels = self.levels_millibels();
        self.effects.apply_levels(&levels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn open(dir: &Path) -> EqualizerController<FallbackEqualizer> {
        EqualizerController::load(
            FallbackEqualizer::default(),
            PreferenceStore::open(dir.join("equalizer.json")),
        )
    }

    #[test]
    fn test_defaults_to_flat_normal_preset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = open(dir.path());
        assert_eq!(controller.selected_preset(), DEFAULT_PRESET);
        assert_eq!(controller.levels_millibels(), vec![0; 10]);
        assert_eq!(controller.effects().applied_millibels(), &[0; 10]);
    }

    #[test]
    fn test_band_labels_switch_to_kilohertz() {
        let dir = tempfile::tempdir().expect("tempdir");
        let labels = open(dir.path()).band_labels();
        assert_eq!(labels[0], "32Hz");
        assert_eq!(labels[4], "500Hz");
        assert_eq!(labels[5], "1kHz");
        assert_eq!(labels[9], "16kHz");
    }

    #[test]
    fn test_preset_selection_persists_and_applies_levels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = open(dir.path());
        controller.select_preset("Rock").expect("select");
        assert_eq!(controller.levels_millibels()[0], 1_500);
        assert_eq!(controller.effects().applied_millibels()[0], 1_500);

        let reloaded = open(dir.path());
        assert_eq!(reloaded.selected_preset(), "Rock");
        assert_eq!(reloaded.levels()[0], 1.0);
        assert!(matches!(
            controller.select_preset("Polka"),
            Err(EqualizerError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_band_edit_becomes_custom_and_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = open(dir.path());
        controller.select_preset("Jazz").expect("select");
        controller.set_band(2, 1.7).expect("set band");
        assert_eq!(controller.selected_preset(), CUSTOM_PRESET);
        assert_eq!(controller.levels()[2], 1.0);

        let reloaded = open(dir.path());
        assert_eq!(reloaded.selected_preset(), CUSTOM_PRESET);
        assert_eq!(reloaded.levels()[0], 0.9);
        assert_eq!(reloaded.levels()[2], 1.0);
        assert!(matches!(
            controller.set_band(10, 0.5),
            Err(EqualizerError::BandOutOfRange { index: 10, count: 10 })
        ));
    }

    #[test]
    fn test_custom_levels_with_wrong_band_count_fall_back_to_flat() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = PreferenceStore::open(dir.path().join("equalizer.json"));
        store.put_string(SELECTED_PRESET_KEY, CUSTOM_PRESET);
        store.put_string(CUSTOM_BANDS_KEY, "[0.1,0.2,0.3]");
        store.commit().expect("commit");

        let controller = open(dir.path());
        assert_eq!(controller.selected_preset(), CUSTOM_PRESET);
        assert_eq!(controller.levels(), &[0.5; 10]);
    }
}
