// Scheduler - Lookahead beat scheduling
//
// The host wakes the scheduler every `poll_interval`, which is imprecise.
// Instead of playing sounds "now", each wake-up computes absolute trigger
// times for every step that starts inside the lookahead window and hands them
// to the sink, which renders them sample-accurately. Step times are derived by
// adding beat durations to the previous step time, never from the wake-up
// time, so timer jitter does not accumulate.

use std::time::Duration;

use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::trigger::{TriggerEvent, TriggerSink};

/// Fixed scheduler timing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// How far past "now" steps are pre-scheduled, in seconds
    pub schedule_ahead_seconds: f64,
    /// How often the host re-enters the scheduler
    pub poll_interval: Duration,
}

impl SchedulerConfig {
    pub const DEFAULT_SCHEDULE_AHEAD_SECONDS: f64 = 0.1;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 25;

    pub fn new(schedule_ahead_seconds: f64, poll_interval: Duration) -> Self {
        Self {
            schedule_ahead_seconds,
            poll_interval,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_SCHEDULE_AHEAD_SECONDS,
            Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
        )
    }
}

/// Mutable scheduling position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SchedulerCursor {
    /// Step that will be scheduled next
    pub current_step: usize,
    /// Audio-clock time (seconds) of the next step's primary pulse
    pub next_note_time: f64,
}

impl SchedulerCursor {
    /// Cursor at step 0 with the given time origin
    pub fn at(origin: f64) -> Self {
        Self {
            current_step: 0,
            next_note_time: origin,
        }
    }
}

/// Summary of one scheduler pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub steps_scheduled: usize,
    pub events_emitted: usize,
    /// Events the sink refused (backend unavailable or queue full)
    pub events_dropped: usize,
    /// Most recently scheduled step, for the playhead
    pub last_step: Option<usize>,
    pub next_note_time: f64,
}

/// The lookahead loop
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    config: SchedulerConfig,
}

impl LookaheadScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedule every step whose start time falls before `now + schedule_ahead`
    ///
    /// Runs to completion without yielding. Pattern, tempo and subdivision are
    /// read fresh for every step, so edits take effect from the next step on.
    pub fn run(
        &self,
        cursor: &mut SchedulerCursor,
        now: f64,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
    ) -> TickReport {
        let horizon = now + self.config.schedule_ahead_seconds;
        let mut report = TickReport::default();

        while cursor.next_note_time < horizon {
            let step = Self::schedule_one_step(cursor, arrangement, sink, &mut report);
            report.steps_scheduled += 1;
            report.last_step = Some(step);
        }

        report.next_note_time = cursor.next_note_time;
        report
    }

    /// Emit the triggers of the cursor's step and advance the cursor by one beat
    ///
    /// Returns the step that was scheduled. The index always advances, even
    /// over Empty steps, so the cadence stays locked to the grid.
    pub fn schedule_one_step(
        cursor: &mut SchedulerCursor,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
        report: &mut TickReport,
    ) -> usize {
        let pattern = &arrangement.pattern;
        let len = pattern.len();

        // Pattern may have shrunk since the last tick
        let step = if cursor.current_step >= len {
            0
        } else {
            cursor.current_step
        };

        let beat = pattern.get(step).unwrap_or_default();
        let start = cursor.next_note_time;

        emit(sink, TriggerEvent::primary(start, beat, step), report);

        let pulses = arrangement.subdivision.pulses();
        if pulses > 1 && !beat.is_empty() {
            let pulse = arrangement.tempo.pulse_duration_seconds(arrangement.subdivision);
            for index in 1..pulses {
                let time = start + index as f64 * pulse;
                emit(sink, TriggerEvent::subdivision(time, step, index), report);
            }
        }

        cursor.next_note_time += arrangement.tempo.beat_duration_seconds();
        cursor.current_step = (step + 1) % len;

        step
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn emit(sink: &mut dyn TriggerSink, event: TriggerEvent, report: &mut TickReport) {
    match sink.trigger(event) {
        Ok(()) => report.events_emitted += 1,
        Err(err) => {
            report.events_dropped += 1;
            tracing::trace!(time = event.time, step = event.step, %err, "trigger dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::pattern::{BeatState, Intensity, Pattern};
    use crate::sequencer::timeline::{Subdivision, Tempo};
    use crate::sequencer::trigger::{RecordingSink, TriggerKind};

    fn arrangement(pattern: &str, bpm: f64, subdivision: Subdivision) -> Arrangement {
        Arrangement::new(pattern.parse().unwrap(), Tempo::new(bpm), subdivision)
    }

    #[test]
    fn test_single_step_within_window() {
        let scheduler = LookaheadScheduler::default();
        let arrangement = arrangement("A.x.", 120.0, Subdivision::Quarter);
        let mut cursor = SchedulerCursor::at(0.0);
        let mut sink = RecordingSink::new();

        let report = scheduler.run(&mut cursor, 0.0, &arrangement, &mut sink);

        // Only step 0 starts before 0.1s
        assert_eq!(report.steps_scheduled, 1);
        assert_eq!(report.last_step, Some(0));
        assert_eq!(cursor.current_step, 1);
        assert_eq!(cursor.next_note_time, 0.5);
        assert_eq!(sink.audible(), vec![(0.0, Intensity::Accent)]);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let scheduler =
            LookaheadScheduler::new(SchedulerConfig::new(0.25, Duration::from_millis(25)));
        let arrangement = arrangement("xxxx", 120.0, Subdivision::Quarter);
        let mut cursor = SchedulerCursor::at(0.0);
        let mut sink = RecordingSink::new();

        // Horizon is exactly 0.5: the step at 0.5 must wait for the next pass
        scheduler.run(&mut cursor, 0.25, &arrangement, &mut sink);
        assert_eq!(sink.events().len(), 1);

        scheduler.run(&mut cursor, 0.26, &arrangement, &mut sink);
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.events()[1].time, 0.5);
    }

    #[test]
    fn test_empty_steps_still_emitted_and_advanced() {
        let mut cursor = SchedulerCursor::at(0.0);
        let arrangement = arrangement("....", 60.0, Subdivision::Sixteenth);
        let mut sink = RecordingSink::new();
        let mut report = TickReport::default();

        let step = LookaheadScheduler::schedule_one_step(
            &mut cursor,
            &arrangement,
            &mut sink,
            &mut report,
        );

        assert_eq!(step, 0);
        assert_eq!(cursor.current_step, 1);
        // Primary only, no subdivisions for silent steps
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].state, BeatState::Empty);
        assert!(sink.audible().is_empty());
    }

    #[test]
    fn test_triplet_offsets() {
        let mut cursor = SchedulerCursor::at(2.0);
        let arrangement = arrangement("A", 60.0, Subdivision::Triplet);
        let mut sink = RecordingSink::new();
        let mut report = TickReport::default();

        LookaheadScheduler::schedule_one_step(&mut cursor, &arrangement, &mut sink, &mut report);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, TriggerKind::Primary);
        assert_eq!(events[0].state, BeatState::Accent);
        assert_eq!(events[1].kind, TriggerKind::Subdivision { index: 1 });
        assert_eq!(events[1].state, BeatState::Normal);
        assert!((events[1].time - (2.0 + 1.0 / 3.0)).abs() < 1e-12);
        assert!((events[2].time - (2.0 + 2.0 / 3.0)).abs() < 1e-12);
        assert_eq!(cursor.next_note_time, 3.0);
        assert_eq!(report.events_emitted, 3);
    }

    #[test]
    fn test_step_reset_after_shrink() {
        let mut cursor = SchedulerCursor {
            current_step: 7,
            next_note_time: 1.0,
        };
        let arrangement = arrangement("xA", 120.0, Subdivision::Quarter);
        let mut sink = RecordingSink::new();
        let mut report = TickReport::default();

        let step = LookaheadScheduler::schedule_one_step(
            &mut cursor,
            &arrangement,
            &mut sink,
            &mut report,
        );

        assert_eq!(step, 0);
        assert_eq!(cursor.current_step, 1);
        assert_eq!(sink.events()[0].state, BeatState::Normal);
    }

    #[test]
    fn test_unavailable_sink_keeps_advancing() {
        let scheduler = LookaheadScheduler::default();
        let arrangement = arrangement("AxAx", 240.0, Subdivision::Eighth);
        let mut cursor = SchedulerCursor::at(0.0);
        let mut sink = RecordingSink::unavailable();

        let report = scheduler.run(&mut cursor, 1.0, &arrangement, &mut sink);

        // 0.25s per beat, horizon 1.1s -> steps at 0, .25, .5, .75, 1.0
        assert_eq!(report.steps_scheduled, 5);
        assert_eq!(report.events_emitted, 0);
        assert_eq!(report.events_dropped, 10);
        assert_eq!(cursor.current_step, 1);
        assert_eq!(cursor.next_note_time, 1.25);
    }

    #[test]
    fn test_tempo_change_applies_to_next_step() {
        let scheduler = LookaheadScheduler::default();
        let mut arrangement = arrangement("xxxx", 120.0, Subdivision::Quarter);
        let mut cursor = SchedulerCursor::at(0.0);
        let mut sink = RecordingSink::new();

        scheduler.run(&mut cursor, 0.0, &arrangement, &mut sink);
        assert_eq!(cursor.next_note_time, 0.5);

        // Already scheduled time stays; the following step uses the new tempo
        arrangement.tempo = Tempo::new(60.0);
        scheduler.run(&mut cursor, 0.45, &arrangement, &mut sink);
        assert_eq!(sink.events()[1].time, 0.5);
        assert_eq!(cursor.next_note_time, 1.5);
    }

    #[test]
    fn test_pattern_default_is_silent() {
        let scheduler = LookaheadScheduler::default();
        let arrangement = Arrangement::new(Pattern::default(), Tempo::default(), Subdivision::Quarter);
        let mut cursor = SchedulerCursor::at(0.0);
        let mut sink = RecordingSink::new();

        scheduler.run(&mut cursor, 4.0, &arrangement, &mut sink);
        assert_eq!(sink.events().len(), 9);
        assert!(sink.audible().is_empty());
    }
}
