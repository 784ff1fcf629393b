// Arrangement - The musical state read by the scheduler on every tick
// Pattern + tempo + subdivision, plus the snapshot record used to restore them

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::MetronomeConfig;
use crate::sequencer::pattern::{BeatState, Pattern};
use crate::sequencer::timeline::{Subdivision, Tempo};

/// Everything the scheduler needs to compute triggers
#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub pattern: Pattern,
    pub tempo: Tempo,
    pub subdivision: Subdivision,
}

impl Arrangement {
    pub fn new(pattern: Pattern, tempo: Tempo, subdivision: Subdivision) -> Self {
        Self {
            pattern,
            tempo,
            subdivision,
        }
    }

    /// Capture the current state as a persistable record
    pub fn snapshot(&self) -> PatternSnapshot {
        PatternSnapshot {
            width: self.pattern.width(),
            height: self.pattern.height(),
            subdivision: self.subdivision,
            tempo: self.tempo.bpm(),
            cells: self.pattern.cells().to_vec(),
        }
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new(Pattern::default(), Tempo::default(), Subdivision::default())
    }
}

/// Snapshot error types
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted pattern record
///
/// Storage (naming, listing, deleting presets) belongs to the caller; this
/// type only defines the record and how it is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSnapshot {
    pub width: usize,
    pub height: usize,
    pub subdivision: Subdivision,
    pub tempo: f64,
    pub cells: Vec<BeatState>,
}

impl PatternSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the arrangement this record describes
    ///
    /// Dimensions and tempo are clamped to the configured limits and the cell
    /// list is padded or truncated to `width * height`, so any record yields
    /// a playable arrangement.
    pub fn restore(&self, config: &MetronomeConfig) -> Arrangement {
        let (width, height) = config.clamp_dimensions(self.width, self.height);
        let tempo = config.clamp_tempo(self.tempo);

        if self.cells.len() != width * height {
            tracing::warn!(
                cells = self.cells.len(),
                width,
                height,
                "snapshot cell count does not match grid, fitting"
            );
        }

        let pattern = Pattern::from_cells(width, height, self.cells.clone());
        Arrangement::new(pattern, tempo, self.subdivision)
    }
}
