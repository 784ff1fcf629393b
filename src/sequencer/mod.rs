// Sequencer module
// Pattern grid, tempo, lookahead scheduling and the trigger contract

pub mod arrangement;
pub mod pattern;
pub mod scheduler;
pub mod timeline;
pub mod transport;
pub mod trigger;

pub use arrangement::{Arrangement, PatternSnapshot, SnapshotError};
pub use pattern::{BeatState, Intensity, Pattern, PatternParseError};
pub use scheduler::{LookaheadScheduler, SchedulerConfig, SchedulerCursor, TickReport};
pub use timeline::{InvalidSubdivision, InvalidTempo, ParseSubdivisionError, Subdivision, Tempo, TempoRange};
pub use transport::{ArmedTick, TickToken, Transport, TransportState};
pub use trigger::{RecordingSink, SinkError, TriggerEvent, TriggerKind, TriggerSink};
