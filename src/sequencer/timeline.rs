// Timeline - Tempo and subdivision representation
// Converts BPM and subdivision factors into beat and pulse durations in seconds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Default tempo used by a fresh metronome
    pub const DEFAULT_BPM: f64 = 120.0;

    /// Creates a new tempo
    /// BPM must be finite and strictly positive; range clamping happens at the boundary
    /// (see `TempoRange::clamp`)
    pub fn new(bpm: f64) -> Self {
        assert!(
            bpm.is_finite() && bpm > 0.0,
            "BPM must be finite and positive"
        );
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat (one grid step) in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one sub-pulse in seconds at the given subdivision
    pub fn pulse_duration_seconds(&self, subdivision: Subdivision) -> f64 {
        60.0 / self.bpm / subdivision.pulses() as f64
    }
}

/// Rejected BPM value (zero, negative or not finite)
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("invalid tempo {0} BPM (must be finite and positive)")]
pub struct InvalidTempo(pub f64);

impl TryFrom<f64> for Tempo {
    type Error = InvalidTempo;

    fn try_from(bpm: f64) -> Result<Self, Self::Error> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Self { bpm })
        } else {
            Err(InvalidTempo(bpm))
        }
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BPM)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Inclusive BPM range accepted by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

impl TempoRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a raw BPM value into the range
    /// Non-finite input falls back to the lower bound
    pub fn clamp(&self, bpm: f64) -> Tempo {
        if bpm.is_nan() {
            return Tempo::new(self.min);
        }
        Tempo::new(bpm.clamp(self.min, self.max))
    }

    pub fn contains(&self, bpm: f64) -> bool {
        (self.min..=self.max).contains(&bpm)
    }

    /// Shift a tempo by `delta` BPM, staying inside the range
    /// (the +/- tempo buttons)
    pub fn nudge(&self, tempo: Tempo, delta: f64) -> Tempo {
        self.clamp(tempo.bpm() + delta)
    }
}

impl Default for TempoRange {
    fn default() -> Self {
        Self::new(40.0, 280.0)
    }
}

/// Number of equal sub-pulses per beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Subdivision {
    /// No subdivision, one pulse per beat
    #[default]
    Quarter = 1,
    Eighth = 2,
    Triplet = 3,
    Sixteenth = 4,
}

impl Subdivision {
    /// Every supported subdivision, in UI order
    pub const ALL: [Subdivision; 4] = [
        Subdivision::Quarter,
        Subdivision::Eighth,
        Subdivision::Triplet,
        Subdivision::Sixteenth,
    ];

    /// Pulses per beat (1..=4)
    pub fn pulses(self) -> u32 {
        self as u32
    }

    pub fn from_pulses(pulses: u32) -> Option<Self> {
        match pulses {
            1 => Some(Subdivision::Quarter),
            2 => Some(Subdivision::Eighth),
            3 => Some(Subdivision::Triplet),
            4 => Some(Subdivision::Sixteenth),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subdivision::Quarter => "Quarter",
            Subdivision::Eighth => "Eighth",
            Subdivision::Triplet => "Triplet",
            Subdivision::Sixteenth => "16th",
        }
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejected subdivision value
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported subdivision {0} (expected 1, 2, 3 or 4)")]
pub struct InvalidSubdivision(pub u8);

impl TryFrom<u8> for Subdivision {
    type Error = InvalidSubdivision;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Subdivision::from_pulses(value as u32).ok_or(InvalidSubdivision(value))
    }
}

impl From<Subdivision> for u8 {
    fn from(subdivision: Subdivision) -> Self {
        subdivision as u8
    }
}

/// Unrecognized subdivision name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subdivision '{0}' (expected 1-4, quarter, eighth, triplet or 16th)")]
pub struct ParseSubdivisionError(pub String);

impl FromStr for Subdivision {
    type Err = ParseSubdivisionError;

    /// Accepts the pulse count or the label, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        if let Ok(pulses) = text.parse::<u32>() {
            return Subdivision::from_pulses(pulses).ok_or(ParseSubdivisionError(s.to_string()));
        }
        match text.as_str() {
            "quarter" => Ok(Subdivision::Quarter),
            "eighth" => Ok(Subdivision::Eighth),
            "triplet" => Ok(Subdivision::Triplet),
            "16th" | "sixteenth" => Ok(Subdivision::Sixteenth),
            _ => Err(ParseSubdivisionError(s.to_string())),
        }
    }
}
