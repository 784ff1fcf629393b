// Host - Scheduler thread, command handling and the shared playhead

pub mod driver;
pub mod playhead;

pub use driver::{HostError, HostHandle, Metronome, spawn};
pub use playhead::SharedPlayhead;
