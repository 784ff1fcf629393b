// beatgrid - Grid metronome with a lookahead beat scheduler
// Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod host;
pub mod messaging;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::clock::{AudioClock, Clock, ManualClock, SystemClock};
pub use audio::engine::{AudioError, ClickEngine, ClickSink};
pub use config::{ConfigError, MetronomeConfig};
pub use host::{HostError, HostHandle, Metronome, SharedPlayhead};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use messaging::command::Command;
pub use messaging::notification::{HostEvent, Notification};
pub use sequencer::{
    Arrangement, BeatState, Intensity, LookaheadScheduler, Pattern, PatternSnapshot,
    RecordingSink, SchedulerConfig, SchedulerCursor, SinkError, SnapshotError, Subdivision, Tempo,
    TempoRange, TickReport, Transport, TransportState, TriggerEvent, TriggerKind, TriggerSink,
};
