// Session configuration
//
// `SessionConfig` is the immutable per-session value read from a RON file (or
// defaults). `MeasureTiming` is its validated windowing subset handed to the
// sequencer. `MetronomeSettings` is the live, thread-safe snapshot that the
// metronome re-reads at schedule time and at fire time.

use crate::audio::timing::Millis;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Which event source backs the session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    Hardware,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_beats_per_measure")]
    pub beats_per_measure: u32,
    #[serde(default = "SessionConfig::default_beats_per_minute")]
    pub beats_per_minute: u32,
    #[serde(default = "SessionConfig::default_measures_to_keep")]
    pub measures_to_keep: usize,
    #[serde(default = "SessionConfig::default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "SessionConfig::default_true")]
    pub metronome_on: bool,
    #[serde(default = "SessionConfig::default_true")]
    pub metronome_bell: bool,
    #[serde(default = "SessionConfig::default_metronome_volume")]
    pub metronome_volume: f32,
    #[serde(default)]
    pub source: SourceKind,
    /// Name of the MIDI input port to use; the first port when absent
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default = "SessionConfig::default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl SessionConfig {
    fn default_beats_per_measure() -> u32 {
        4
    }
    fn default_beats_per_minute() -> u32 {
        100
    }
    fn default_measures_to_keep() -> usize {
        12
    }
    fn default_update_interval_ms() -> u64 {
        20
    }
    fn default_true() -> bool {
        true
    }
    fn default_metronome_volume() -> f32 {
        0.5
    }
    fn default_event_queue_capacity() -> usize {
        512
    }

    /// `<config dir>/midi_measures/config.ron`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("midi_measures").join("config.ron"))
    }

    /// Read and validate a RON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = ron::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing()?;
        if self.update_interval_ms == 0 {
            return Err(ConfigError::InvalidUpdateInterval);
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if !(0.0..=1.0).contains(&self.metronome_volume) {
            return Err(ConfigError::InvalidVolume(self.metronome_volume));
        }
        Ok(())
    }

    /// Validated measure windowing derived from tempo and meter
    pub fn timing(&self) -> Result<MeasureTiming, ConfigError> {
        MeasureTiming::new(
            self.beats_per_measure,
            self.beats_per_minute,
            self.measures_to_keep,
        )
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            beats_per_measure: Self::default_beats_per_measure(),
            beats_per_minute: Self::default_beats_per_minute(),
            measures_to_keep: Self::default_measures_to_keep(),
            update_interval_ms: Self::default_update_interval_ms(),
            metronome_on: true,
            metronome_bell: true,
            metronome_volume: Self::default_metronome_volume(),
            source: SourceKind::default(),
            device_name: None,
            event_queue_capacity: Self::default_event_queue_capacity(),
        }
    }
}

/// Upper bound on beats per measure
pub const MAX_BEATS_PER_MEASURE: u32 = 64;
/// Upper bound on the length of one measure
pub const MAX_MEASURE_DURATION_MS: Millis = 3_600_000;

/// Fixed windowing parameters for a session. Constructing one is the only
/// place invalid tempo/meter values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureTiming {
    duration_ms: Millis,
    beats_per_measure: u32,
    measures_to_keep: usize,
}

impl MeasureTiming {
    /// `duration = beats_per_measure * 60000 / beats_per_minute` milliseconds
    pub fn new(
        beats_per_measure: u32,
        beats_per_minute: u32,
        measures_to_keep: usize,
    ) -> Result<Self, ConfigError> {
        if beats_per_minute == 0 {
            return Err(ConfigError::InvalidBeatsPerMinute(beats_per_minute));
        }
        let duration_ms = beats_per_measure as Millis * 60_000 / beats_per_minute as Millis;
        Self::from_duration(duration_ms, beats_per_measure, measures_to_keep)
    }

    pub fn from_duration(
        duration_ms: Millis,
        beats_per_measure: u32,
        measures_to_keep: usize,
    ) -> Result<Self, ConfigError> {
        if beats_per_measure == 0 || beats_per_measure > MAX_BEATS_PER_MEASURE {
            return Err(ConfigError::InvalidBeatsPerMeasure(beats_per_measure));
        }
        if duration_ms <= 0 || duration_ms > MAX_MEASURE_DURATION_MS {
            return Err(ConfigError::InvalidDuration(duration_ms));
        }
        if measures_to_keep == 0 {
            return Err(ConfigError::InvalidRetention(measures_to_keep));
        }
        Ok(Self {
            duration_ms,
            beats_per_measure,
            measures_to_keep,
        })
    }

    pub fn duration_ms(&self) -> Millis {
        self.duration_ms
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    pub fn measures_to_keep(&self) -> usize {
        self.measures_to_keep
    }
}

/// Live metronome switches and volumes, shared between the poller and the
/// metronome worker. Clones share state.
#[derive(Debug, Clone)]
pub struct MetronomeSettings {
    inner: Arc<SettingsInner>,
}

#[derive(Debug)]
struct SettingsInner {
    metronome_on: AtomicBool,
    bell_on: AtomicBool,
    // f32 stored as bits
    tick_volume: AtomicU32,
    bell_volume: AtomicU32,
}

impl MetronomeSettings {
    pub fn new(metronome_on: bool, bell_on: bool, tick_volume: f32, bell_volume: f32) -> Self {
        Self {
            inner: Arc::new(SettingsInner {
                metronome_on: AtomicBool::new(metronome_on),
                bell_on: AtomicBool::new(bell_on),
                tick_volume: AtomicU32::new(tick_volume.clamp(0.0, 1.0).to_bits()),
                bell_volume: AtomicU32::new(bell_volume.clamp(0.0, 1.0).to_bits()),
            }),
        }
    }

    /// Tick plays at the full metronome volume, the bell at half of it
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.metronome_on,
            config.metronome_bell,
            config.metronome_volume,
            0.5 * config.metronome_volume,
        )
    }

    pub fn metronome_on(&self) -> bool {
        self.inner.metronome_on.load(Ordering::Acquire)
    }

    pub fn set_metronome_on(&self, on: bool) {
        self.inner.metronome_on.store(on, Ordering::Release);
    }

    pub fn bell_on(&self) -> bool {
        self.inner.bell_on.load(Ordering::Acquire)
    }

    pub fn set_bell_on(&self, on: bool) {
        self.inner.bell_on.store(on, Ordering::Release);
    }

    pub fn tick_volume(&self) -> f32 {
        f32::from_bits(self.inner.tick_volume.load(Ordering::Relaxed))
    }

    pub fn set_tick_volume(&self, volume: f32) {
        self.inner
            .tick_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn bell_volume(&self) -> f32 {
        f32::from_bits(self.inner.bell_volume.load(Ordering::Relaxed))
    }

    pub fn set_bell_volume(&self, volume: f32) {
        self.inner
            .bell_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
