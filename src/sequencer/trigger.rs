// Trigger - Events handed from the scheduler to the sound backend
// The sink renders each event at its absolute audio-clock time

use crate::sequencer::pattern::{BeatState, Intensity};

/// Where a trigger sits inside its step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// The step's main pulse, carrying the cell state
    Primary,
    /// Extra pulse `index` (1-based) inside a subdivided step
    Subdivision { index: u32 },
}

/// One scheduled trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    /// Absolute audio-clock time in seconds (usually slightly in the future)
    pub time: f64,
    pub state: BeatState,
    /// Pattern step that produced the event
    pub step: usize,
    pub kind: TriggerKind,
}

impl TriggerEvent {
    pub fn primary(time: f64, state: BeatState, step: usize) -> Self {
        Self {
            time,
            state,
            step,
            kind: TriggerKind::Primary,
        }
    }

    /// Subdivision pulses always sound at Normal intensity
    pub fn subdivision(time: f64, step: usize, index: u32) -> Self {
        Self {
            time,
            state: BeatState::Normal,
            step,
            kind: TriggerKind::Subdivision { index },
        }
    }

    pub fn intensity(&self) -> Option<Intensity> {
        self.state.intensity()
    }

    pub fn is_audible(&self) -> bool {
        !self.state.is_empty()
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.kind, TriggerKind::Primary)
    }
}

/// Sink failures; none of them stop the scheduler
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("trigger sink unavailable (audio backend not running)")]
    Unavailable,

    #[error("trigger queue full, dropped event at {time:.3}s")]
    QueueFull { time: f64 },
}

/// Consumer of scheduled triggers
///
/// Implementations must not block: the scheduler calls `trigger` for a whole
/// lookahead window in one go. Events whose state is Empty are delivered too
/// and must render nothing.
pub trait TriggerSink {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError>;
}

impl<S: TriggerSink + ?Sized> TriggerSink for &mut S {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        (**self).trigger(event)
    }
}

impl<S: TriggerSink + ?Sized> TriggerSink for Box<S> {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        (**self).trigger(event)
    }
}

/// A sink that has not been created yet is unavailable
impl<S: TriggerSink> TriggerSink for Option<S> {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        match self {
            Some(sink) => sink.trigger(event),
            None => Err(SinkError::Unavailable),
        }
    }
}

/// Sink that stores every event it receives
///
/// Used by tests and by the CLI dry-run mode.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<TriggerEvent>,
    unavailable: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose backend is down: every call fails with `Unavailable`
    pub fn unavailable() -> Self {
        Self {
            events: Vec::new(),
            unavailable: true,
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.unavailable = !available;
    }

    /// Every event received, including silent ones
    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    /// Events that produce sound, as (time, intensity) pairs
    pub fn audible(&self) -> Vec<(f64, Intensity)> {
        self.events
            .iter()
            .filter_map(|event| event.intensity().map(|i| (event.time, i)))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl TriggerSink for RecordingSink {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        if self.unavailable {
            return Err(SinkError::Unavailable);
        }
        self.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdivision_events_are_normal() {
        let event = TriggerEvent::subdivision(1.25, 2, 1);
        assert_eq!(event.intensity(), Some(Intensity::Normal));
        assert!(!event.is_primary());
    }

    #[test]
    fn test_recording_sink_filters_silence() {
        let mut sink = RecordingSink::new();
        sink.trigger(TriggerEvent::primary(0.0, BeatState::Accent, 0))
            .unwrap();
        sink.trigger(TriggerEvent::primary(0.5, BeatState::Empty, 1))
            .unwrap();

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.audible(), vec![(0.0, Intensity::Accent)]);
    }

    #[test]
    fn test_unavailable_sinks() {
        let event = TriggerEvent::primary(0.0, BeatState::Normal, 0);

        let mut down = RecordingSink::unavailable();
        assert_eq!(down.trigger(event), Err(SinkError::Unavailable));
        assert!(down.events().is_empty());

        let mut missing: Option<RecordingSink> = None;
        assert_eq!(missing.trigger(event), Err(SinkError::Unavailable));

        down.set_available(true);
        assert!(down.trigger(event).is_ok());
    }
}
