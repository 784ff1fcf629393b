// Host driver - Owns transport, arrangement and sink on the scheduler thread
//
// `Metronome` is the single-threaded core: it applies commands between
// scheduler passes and fires the armed tick once the clock reaches its
// deadline. `spawn` wraps it in a thread fed by lock-free queues.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ringbuf::traits::{Consumer, Producer};
use thiserror::Error;

use crate::audio::clock::Clock;
use crate::config::MetronomeConfig;
use crate::host::playhead::SharedPlayhead;
use crate::messaging::channels::{
    CommandConsumer, CommandProducer, NotificationConsumer, NotificationProducer,
    create_command_channel, create_notification_channel,
};
use crate::messaging::command::Command;
use crate::messaging::notification::{HostEvent, Notification, NotificationCategory};
use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::transport::{ArmedTick, TickToken, Transport, TransportState};
use crate::sequencer::trigger::TriggerSink;

/// Host thread errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("command queue full")]
    CommandQueueFull,

    #[error("scheduler thread panicked")]
    ThreadPanicked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingTick {
    token: TickToken,
    /// Clock time at which the tick is due
    due: f64,
}

/// Scheduler-thread state
pub struct Metronome<S: TriggerSink> {
    config: MetronomeConfig,
    arrangement: Arrangement,
    transport: Transport,
    sink: S,
    pending: Option<PendingTick>,
    /// Send `StepChanged` on the next pass even if the step is unchanged
    announce_step: bool,
    playhead: Arc<SharedPlayhead>,
    notifications: NotificationProducer,
}

impl<S: TriggerSink> Metronome<S> {
    pub fn new(
        config: MetronomeConfig,
        arrangement: Arrangement,
        sink: S,
        playhead: Arc<SharedPlayhead>,
        notifications: NotificationProducer,
    ) -> Self {
        playhead.set_tempo(arrangement.tempo.bpm());
        Self {
            transport: Transport::new(config.scheduler_config()),
            config,
            arrangement,
            sink,
            pending: None,
            announce_step: false,
            playhead,
            notifications,
        }
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Clock time of the armed tick, if any
    pub fn next_deadline(&self) -> Option<f64> {
        self.pending.map(|tick| tick.due)
    }

    /// Apply one command at clock time `now`
    ///
    /// Returns false once `Quit` has been handled.
    pub fn handle(&mut self, command: Command, now: f64) -> bool {
        match command {
            Command::Start => self.start(now),
            Command::Stop => self.stop(),
            Command::TogglePlay => {
                let was_playing = self.transport.state().is_playing();
                let armed = self
                    .transport
                    .toggle(now, &self.arrangement, &mut self.sink);
                if was_playing {
                    self.stopped();
                } else {
                    self.started(armed, now);
                }
            }
            Command::SetTempo(bpm) => {
                let tempo = self.config.clamp_tempo(bpm);
                self.set_tempo(tempo.bpm());
            }
            Command::NudgeTempo(delta) => {
                let tempo = self
                    .config
                    .tempo_range
                    .nudge(self.arrangement.tempo, delta);
                self.set_tempo(tempo.bpm());
            }
            Command::SetSubdivision(subdivision) => {
                self.arrangement.subdivision = subdivision;
                self.notify_info(
                    NotificationCategory::Pattern,
                    HostEvent::SubdivisionChanged(subdivision),
                );
            }
            Command::ToggleCell(index) => {
                if self.arrangement.pattern.toggle_cell(index) {
                    self.notify_info(NotificationCategory::Pattern, HostEvent::PatternEdited);
                }
            }
            Command::SetCell { index, state } => {
                if self.arrangement.pattern.set_cell(index, state) {
                    self.notify_info(NotificationCategory::Pattern, HostEvent::PatternEdited);
                }
            }
            Command::Resize { width, height } => self.resize(width, height),
            Command::AddRow => {
                let (width, height) = self.dimensions();
                self.resize(width, height + 1);
            }
            Command::RemoveRow => {
                let (width, height) = self.dimensions();
                self.resize(width, height.saturating_sub(1));
            }
            Command::AddColumn => {
                let (width, height) = self.dimensions();
                self.resize(width + 1, height);
            }
            Command::RemoveColumn => {
                let (width, height) = self.dimensions();
                self.resize(width.saturating_sub(1), height);
            }
            Command::Clear => {
                self.arrangement.pattern.clear();
                self.notify_info(NotificationCategory::Pattern, HostEvent::PatternEdited);
            }
            Command::Restore(snapshot) => {
                self.arrangement = snapshot.restore(&self.config);
                self.playhead.set_tempo(self.arrangement.tempo.bpm());
                tracing::info!(
                    width = self.arrangement.pattern.width(),
                    height = self.arrangement.pattern.height(),
                    bpm = self.arrangement.tempo.bpm(),
                    "snapshot restored"
                );
                self.notify_info(NotificationCategory::Pattern, HostEvent::Restored);
            }
            Command::Quit => {
                self.stop();
                return false;
            }
        }
        true
    }

    /// Fire the armed tick if it is due at clock time `now`
    pub fn service(&mut self, now: f64) {
        let Some(tick) = self.pending else {
            return;
        };
        if now < tick.due {
            return;
        }

        let armed = self
            .transport
            .fire(tick.token, now, &self.arrangement, &mut self.sink);
        self.arm(armed, now);
        self.publish_pass();
    }

    fn start(&mut self, now: f64) {
        let armed = self
            .transport
            .start(now, &self.arrangement, &mut self.sink);
        self.started(armed, now);
    }

    fn stop(&mut self) {
        if self.transport.stop() {
            self.stopped();
        }
    }

    /// Publish a start; `None` means the transport was already playing
    fn started(&mut self, armed: Option<ArmedTick>, now: f64) {
        if armed.is_none() {
            return;
        }

        self.arm(armed, now);
        // Notify before publishing state so readers of the playhead see the notification
        self.notify_info(
            NotificationCategory::Transport,
            HostEvent::TransportChanged(TransportState::Playing),
        );
        self.playhead.set_state(TransportState::Playing);
        self.announce_step = true;
        self.publish_pass();
    }

    fn stopped(&mut self) {
        self.pending = None;
        self.notify_info(
            NotificationCategory::Transport,
            HostEvent::TransportChanged(TransportState::Stopped),
        );
        self.playhead.set_step(0);
        self.playhead.set_state(TransportState::Stopped);
    }

    fn set_tempo(&mut self, bpm: f64) {
        let tempo = self.config.clamp_tempo(bpm);
        if tempo == self.arrangement.tempo {
            return;
        }
        self.arrangement.tempo = tempo;
        self.playhead.set_tempo(tempo.bpm());
        tracing::debug!(bpm = tempo.bpm(), "tempo changed");
        self.notify_info(NotificationCategory::Pattern, HostEvent::TempoChanged(tempo));
    }

    fn dimensions(&self) -> (usize, usize) {
        (
            self.arrangement.pattern.width(),
            self.arrangement.pattern.height(),
        )
    }

    fn resize(&mut self, width: usize, height: usize) {
        let (width, height) = self.config.clamp_dimensions(width, height);
        let pattern = &mut self.arrangement.pattern;
        if pattern.width() == width && pattern.height() == height {
            return;
        }
        pattern.resize(width, height);
        tracing::debug!(width, height, "pattern resized");
        self.notify_info(
            NotificationCategory::Pattern,
            HostEvent::PatternResized { width, height },
        );
    }

    fn arm(&mut self, armed: Option<ArmedTick>, now: f64) {
        self.pending = armed.map(|armed| PendingTick {
            token: armed.token,
            due: now + armed.delay.as_secs_f64(),
        });
    }

    /// Publish the playhead and dropped-trigger count of the last pass
    fn publish_pass(&mut self) {
        let report = *self.transport.last_report();
        let step = self.transport.current_step();

        // The first pass after a start always reports its step
        if report.last_step.is_some() && (self.announce_step || self.playhead.step() != step) {
            self.announce_step = false;
            self.playhead.set_step(step);
            self.notify_info(NotificationCategory::Transport, HostEvent::StepChanged(step));
        }

        if report.events_dropped > 0 {
            let notification = Notification::warning(
                NotificationCategory::Audio,
                HostEvent::TriggersDropped(report.events_dropped),
            );
            self.push_notification(notification);
        }
    }

    fn notify_info(&mut self, category: NotificationCategory, event: HostEvent) {
        self.push_notification(Notification::info(category, event));
    }

    fn push_notification(&mut self, notification: Notification) {
        if self.notifications.try_push(notification).is_err() {
            tracing::trace!("notification queue full, dropping");
        }
    }
}

/// Control-side handle to a running scheduler thread
pub struct HostHandle<S> {
    commands: CommandProducer,
    notifications: NotificationConsumer,
    playhead: Arc<SharedPlayhead>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<S>>,
}

impl<S> HostHandle<S> {
    pub fn send(&mut self, command: Command) -> Result<(), HostError> {
        self.commands
            .try_push(command)
            .map_err(|_| HostError::CommandQueueFull)
    }

    /// Drain every pending notification
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        self.notifications.pop_iter().collect()
    }

    pub fn playhead(&self) -> &Arc<SharedPlayhead> {
        &self.playhead
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the thread and hand back the sink
    pub fn shutdown(mut self) -> Result<S, HostError> {
        self.running.store(false, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| HostError::ThreadPanicked),
            None => Err(HostError::ThreadPanicked),
        }
    }
}

impl<S> Drop for HostHandle<S> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Queue sizes and command latency of the scheduler thread
pub const COMMAND_QUEUE_CAPACITY: usize = 64;
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 256;
/// Longest sleep between command checks
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Run a `Metronome` on its own thread
///
/// The thread sleeps until the armed tick is due or `COMMAND_POLL_INTERVAL`
/// elapses, whichever comes first, and exits on `Command::Quit` or
/// `HostHandle::shutdown`.
pub fn spawn<S, C>(
    config: MetronomeConfig,
    arrangement: Arrangement,
    sink: S,
    clock: C,
) -> Result<HostHandle<S>, HostError>
where
    S: TriggerSink + Send + 'static,
    C: Clock + 'static,
{
    let (command_tx, command_rx) = create_command_channel(COMMAND_QUEUE_CAPACITY);
    let (notification_tx, notification_rx) =
        create_notification_channel(NOTIFICATION_QUEUE_CAPACITY);
    let playhead = SharedPlayhead::new();
    let running = Arc::new(AtomicBool::new(true));

    let metronome = Metronome::new(
        config,
        arrangement,
        sink,
        Arc::clone(&playhead),
        notification_tx,
    );
    let thread_running = Arc::clone(&running);

    let thread = thread::Builder::new()
        .name("beatgrid-scheduler".to_string())
        .spawn(move || run_host(metronome, command_rx, clock, thread_running))?;

    Ok(HostHandle {
        commands: command_tx,
        notifications: notification_rx,
        playhead,
        running,
        thread: Some(thread),
    })
}

fn run_host<S, C>(
    mut metronome: Metronome<S>,
    mut commands: CommandConsumer,
    clock: C,
    running: Arc<AtomicBool>,
) -> S
where
    S: TriggerSink,
    C: Clock,
{
    tracing::debug!("scheduler thread started");

    'outer: while running.load(Ordering::Acquire) {
        while let Some(command) = commands.try_pop() {
            tracing::trace!(?command, "command");
            if !metronome.handle(command, clock.now()) {
                break 'outer;
            }
        }

        metronome.service(clock.now());

        let wait = match metronome.next_deadline() {
            Some(due) => Duration::from_secs_f64((due - clock.now()).max(0.0)),
            None => COMMAND_POLL_INTERVAL,
        };
        thread::sleep(wait.min(COMMAND_POLL_INTERVAL));
    }

    metronome.handle(Command::Stop, clock.now());
    tracing::debug!("scheduler thread exiting");
    metronome.into_sink()
}
