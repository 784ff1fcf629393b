// Commands - Control thread → scheduler thread
// Applied between scheduler passes so a pass never sees a half-applied edit

use crate::sequencer::arrangement::PatternSnapshot;
use crate::sequencer::pattern::BeatState;
use crate::sequencer::timeline::Subdivision;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    /// Play/pause button
    TogglePlay,
    /// Absolute tempo, clamped to the configured range
    SetTempo(f64),
    /// Relative tempo change (the +/- buttons)
    NudgeTempo(f64),
    SetSubdivision(Subdivision),
    ToggleCell(usize),
    SetCell {
        index: usize,
        state: BeatState,
    },
    /// Resize to the given dimensions, clamped to the configured ranges
    Resize {
        width: usize,
        height: usize,
    },
    AddRow,
    RemoveRow,
    AddColumn,
    RemoveColumn,
    Clear,
    /// Apply a saved pattern, tempo and subdivision in one step
    Restore(PatternSnapshot),
    Quit,
}
