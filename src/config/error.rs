// Configuration error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize RON: {0}")]
    Serialize(#[from] ron::Error),

    #[error("invalid range for {name}: [{min}, {max}]")]
    InvalidRange {
        name: &'static str,
        min: f64,
        max: f64,
    },

    #[error("default {name} {value} outside [{min}, {max}]")]
    DefaultOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error(
        "poll interval {poll_interval_ms}ms must be positive and shorter than the {schedule_ahead_seconds}s lookahead window"
    )]
    StarvedWindow {
        schedule_ahead_seconds: f64,
        poll_interval_ms: u64,
    },
}
