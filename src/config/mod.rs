// Host configuration - validated once at the boundary
// Everything past this point assumes clamped tempo and grid dimensions

pub mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::pattern::Pattern;
use crate::sequencer::scheduler::SchedulerConfig;
use crate::sequencer::timeline::{Subdivision, Tempo, TempoRange};

/// Inclusive bounds for one grid dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRange {
    pub min: usize,
    pub max: usize,
}

impl DimensionRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: usize) -> usize {
        value.clamp(self.min, self.max)
    }
}

/// Metronome configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    pub tempo_range: TempoRange,
    pub width_range: DimensionRange,
    pub height_range: DimensionRange,
    /// Lookahead window in seconds
    pub schedule_ahead_seconds: f64,
    /// Scheduler wake-up period in milliseconds
    pub poll_interval_ms: u64,
    pub default_tempo: f64,
    pub default_width: usize,
    pub default_height: usize,
    pub default_subdivision: Subdivision,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo_range: TempoRange::default(),
            width_range: DimensionRange::new(1, 16),
            height_range: DimensionRange::new(1, 8),
            schedule_ahead_seconds: SchedulerConfig::DEFAULT_SCHEDULE_AHEAD_SECONDS,
            poll_interval_ms: SchedulerConfig::DEFAULT_POLL_INTERVAL_MS,
            default_tempo: Tempo::DEFAULT_BPM,
            default_width: 4,
            default_height: 2,
            default_subdivision: Subdivision::Quarter,
        }
    }
}

impl MetronomeConfig {
    /// Config file name inside the user config directory
    pub const FILE_NAME: &'static str = "config.ron";

    /// `<config_dir>/beatgrid/config.ron`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("beatgrid").join(Self::FILE_NAME))
    }

    /// Parse and validate a RON document
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    /// Load `path`, or the default location when `None`
    ///
    /// A missing default file is not an error: defaults are used. An explicit
    /// path must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_ron()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check ranges, defaults and scheduler timing
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tempo = self.tempo_range;
        if !(tempo.min.is_finite() && tempo.max.is_finite()) || tempo.min <= 0.0 || tempo.min > tempo.max
        {
            return Err(ConfigError::InvalidRange {
                name: "tempo",
                min: tempo.min,
                max: tempo.max,
            });
        }

        for (name, range) in [("width", self.width_range), ("height", self.height_range)] {
            if range.min == 0 || range.min > range.max {
                return Err(ConfigError::InvalidRange {
                    name,
                    min: range.min as f64,
                    max: range.max as f64,
                });
            }
        }

        if !tempo.contains(self.default_tempo) {
            return Err(ConfigError::DefaultOutOfRange {
                name: "tempo",
                value: self.default_tempo,
                min: tempo.min,
                max: tempo.max,
            });
        }

        for (name, value, range) in [
            ("width", self.default_width, self.width_range),
            ("height", self.default_height, self.height_range),
        ] {
            if range.clamp(value) != value {
                return Err(ConfigError::DefaultOutOfRange {
                    name,
                    value: value as f64,
                    min: range.min as f64,
                    max: range.max as f64,
                });
            }
        }

        // The poll interval must be shorter than the window or it starves
        let window_ms = self.schedule_ahead_seconds * 1000.0;
        if !window_ms.is_finite() || self.poll_interval_ms == 0 || self.poll_interval_ms as f64 >= window_ms {
            return Err(ConfigError::StarvedWindow {
                schedule_ahead_seconds: self.schedule_ahead_seconds,
                poll_interval_ms: self.poll_interval_ms,
            });
        }

        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(
            self.schedule_ahead_seconds,
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn clamp_tempo(&self, bpm: f64) -> Tempo {
        self.tempo_range.clamp(bpm)
    }

    pub fn clamp_dimensions(&self, width: usize, height: usize) -> (usize, usize) {
        (self.width_range.clamp(width), self.height_range.clamp(height))
    }

    /// Empty grid at the default size, tempo and subdivision
    pub fn initial_arrangement(&self) -> Arrangement {
        let (width, height) = self.clamp_dimensions(self.default_width, self.default_height);
        Arrangement::new(
            Pattern::new(width, height),
            self.clamp_tempo(self.default_tempo),
            self.default_subdivision,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MetronomeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
    }

    #[test]
    fn test_initial_arrangement() {
        let arrangement = MetronomeConfig::default().initial_arrangement();
        assert_eq!(arrangement.pattern.width(), 4);
        assert_eq!(arrangement.pattern.height(), 2);
        assert_eq!(arrangement.tempo.bpm(), 120.0);
        assert_eq!(arrangement.subdivision, Subdivision::Quarter);
    }

    #[test]
    fn test_clamp_dimensions() {
        let config = MetronomeConfig::default();
        assert_eq!(config.clamp_dimensions(0, 0), (1, 1));
        assert_eq!(config.clamp_dimensions(20, 9), (16, 8));
        assert_eq!(config.clamp_dimensions(12, 3), (12, 3));
    }

    #[test]
    fn test_poll_interval_must_fit_window() {
        let config = MetronomeConfig {
            schedule_ahead_seconds: 0.02,
            poll_interval_ms: 25,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StarvedWindow { .. })
        ));

        let zero = MetronomeConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let inverted = MetronomeConfig {
            tempo_range: TempoRange::new(200.0, 100.0),
            default_tempo: 150.0,
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidRange { name: "tempo", .. })
        ));

        let zero_width = MetronomeConfig {
            width_range: DimensionRange::new(0, 4),
            ..Default::default()
        };
        assert!(matches!(
            zero_width.validate(),
            Err(ConfigError::InvalidRange { name: "width", .. })
        ));

        let bad_default = MetronomeConfig {
            default_height: 12,
            ..Default::default()
        };
        assert!(matches!(
            bad_default.validate(),
            Err(ConfigError::DefaultOutOfRange { name: "height", .. })
        ));
    }

    #[test]
    fn test_ron_roundtrip_and_partial_documents() {
        let config = MetronomeConfig {
            default_tempo: 90.0,
            default_subdivision: Subdivision::Triplet,
            ..Default::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(MetronomeConfig::from_ron(&text).unwrap(), config);

        // Missing fields fall back to defaults
        let partial = MetronomeConfig::from_ron("(poll_interval_ms: 10)").unwrap();
        assert_eq!(partial.poll_interval_ms, 10);
        assert_eq!(partial.default_width, 4);
    }

    #[test]
    fn test_ron_parse_error() {
        assert!(matches!(
            MetronomeConfig::from_ron("(default_tempo: \"fast\")"),
            Err(ConfigError::Parse(_))
        ));
    }
}
