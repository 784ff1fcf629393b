// Transport - Play/stop state machine driving the lookahead scheduler
// Owns the scheduler cursor and the generation counter used to cancel armed ticks

use std::time::Duration;

use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::scheduler::{LookaheadScheduler, SchedulerConfig, SchedulerCursor, TickReport};
use crate::sequencer::trigger::TriggerSink;

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }
}

/// Identifies one armed re-invocation of the scheduler
///
/// Only the most recently issued token is accepted by `Transport::fire`;
/// stopping or re-arming invalidates every earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    generation: u64,
}

/// Request to call `Transport::fire` with `token` after `delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTick {
    pub token: TickToken,
    pub delay: Duration,
}

/// Transport controller
///
/// The host owns the actual timer: every method that runs the scheduler
/// returns the next `ArmedTick` to wait for, or `None` when nothing should be
/// re-armed.
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    cursor: SchedulerCursor,
    scheduler: LookaheadScheduler,
    generation: u64,
    sounding_step: usize,
    last_report: TickReport,
}

impl Transport {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            state: TransportState::Stopped,
            cursor: SchedulerCursor::default(),
            scheduler: LookaheadScheduler::new(config),
            generation: 0,
            sounding_step: 0,
            last_report: TickReport::default(),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn cursor(&self) -> &SchedulerCursor {
        &self.cursor
    }

    /// Step most recently handed to the sink (playhead position)
    pub fn current_step(&self) -> usize {
        self.sounding_step
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    pub fn scheduler_config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    /// Start playback at audio-clock time `now`
    ///
    /// Resets to step 0 and schedules the first window immediately.
    /// Starting while already playing is a no-op and returns `None`.
    pub fn start(
        &mut self,
        now: f64,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
    ) -> Option<ArmedTick> {
        if self.state.is_playing() {
            tracing::debug!("start ignored, transport already playing");
            return None;
        }

        self.cursor = SchedulerCursor::at(now);
        self.sounding_step = 0;
        self.state = TransportState::Playing;

        tracing::info!(
            origin = now,
            bpm = arrangement.tempo.bpm(),
            subdivision = arrangement.subdivision.pulses(),
            steps = arrangement.pattern.len(),
            "transport started"
        );

        self.run_loop(now, arrangement, sink)
    }

    /// Stop playback and cancel the pending tick
    ///
    /// Triggers already handed to the sink are left to play out.
    /// Returns false if the transport was not playing.
    pub fn stop(&mut self) -> bool {
        if self.state.is_stopped() {
            return false;
        }

        self.generation = self.generation.wrapping_add(1);
        self.state = TransportState::Stopped;
        self.cursor.current_step = 0;
        self.sounding_step = 0;

        tracing::info!("transport stopped");
        true
    }

    /// Play/pause button: stop if playing, start otherwise
    pub fn toggle(
        &mut self,
        now: f64,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
    ) -> Option<ArmedTick> {
        if self.state.is_playing() {
            self.stop();
            None
        } else {
            self.start(now, arrangement, sink)
        }
    }

    /// Timer callback: re-enter the scheduler if `token` is still current
    ///
    /// Stale tokens (armed before a stop, or superseded by a newer arm) are
    /// ignored, so a late callback can never schedule after `stop`.
    pub fn fire(
        &mut self,
        token: TickToken,
        now: f64,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
    ) -> Option<ArmedTick> {
        if !self.is_current(token) {
            tracing::trace!("stale tick ignored");
            return None;
        }
        self.run_loop(now, arrangement, sink)
    }

    pub fn is_current(&self, token: TickToken) -> bool {
        self.state.is_playing() && token.generation == self.generation
    }

    fn run_loop(
        &mut self,
        now: f64,
        arrangement: &Arrangement,
        sink: &mut dyn TriggerSink,
    ) -> Option<ArmedTick> {
        let report = self.scheduler.run(&mut self.cursor, now, arrangement, sink);

        if let Some(step) = report.last_step {
            self.sounding_step = step;
        }
        if report.steps_scheduled > 1 {
            // More than one step per wake-up means the timer fired late
            tracing::debug!(
                steps = report.steps_scheduled,
                now,
                "scheduler caught up"
            );
        }
        if report.events_dropped > 0 {
            tracing::debug!(dropped = report.events_dropped, "sink refused triggers");
        }
        self.last_report = report;

        if !self.state.is_playing() {
            return None;
        }

        self.generation = self.generation.wrapping_add(1);
        Some(ArmedTick {
            token: TickToken {
                generation: self.generation,
            },
            delay: self.scheduler.config().poll_interval,
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
