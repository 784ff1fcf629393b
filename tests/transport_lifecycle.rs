//! Transport lifecycle and host thread tests
//!
//! Restart semantics, stale timer callbacks, live edits between passes and
//! the scheduler thread driven by a manual clock.

use std::thread;
use std::time::{Duration, Instant};

use beatgrid::host;
use beatgrid::{
    Arrangement, BeatState, Command, HostEvent, Intensity, ManualClock, MetronomeConfig,
    RecordingSink, Subdivision, Tempo, Transport, TransportState,
};

fn arrangement(pattern: &str) -> Arrangement {
    Arrangement::new(pattern.parse().unwrap(), Tempo::new(120.0), Subdivision::Quarter)
}

/// Poll `condition` for up to two seconds
fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_restart_resets_step_and_origin() {
    let arrangement = arrangement("A.x.");
    let mut transport = Transport::default();
    let mut sink = RecordingSink::new();

    // Play into the middle of the bar
    let mut armed = transport.start(0.0, &arrangement, &mut sink);
    let mut now = 0.0;
    while now < 0.95 {
        now += 0.025;
        if let Some(tick) = armed {
            armed = transport.fire(tick.token, now, &arrangement, &mut sink);
        }
    }
    assert_eq!(transport.current_step(), 2);

    transport.stop();
    sink.clear();

    let restart = 7.25;
    transport.start(restart, &arrangement, &mut sink);

    assert_eq!(sink.events()[0].step, 0);
    assert_eq!(sink.events()[0].time, restart);
    assert_eq!(sink.audible(), vec![(restart, Intensity::Accent)]);
    assert_eq!(transport.cursor().next_note_time, restart + 0.5);
}

#[test]
fn test_stale_tick_after_restart_is_ignored() {
    let arrangement = arrangement("xxxx");
    let mut transport = Transport::default();
    let mut sink = RecordingSink::new();

    let first_run = transport.start(0.0, &arrangement, &mut sink).unwrap();
    transport.stop();
    let second_run = transport.start(10.0, &arrangement, &mut sink).unwrap();
    let count = sink.events().len();

    // A timer from the first run fires late: nothing may be scheduled
    assert!(transport
        .fire(first_run.token, 10.6, &arrangement, &mut sink)
        .is_none());
    assert_eq!(sink.events().len(), count);

    // The live timer still works
    assert!(transport
        .fire(second_run.token, 10.45, &arrangement, &mut sink)
        .is_some());
    assert_eq!(sink.events().len(), count + 1);
}

#[test]
fn test_stop_keeps_already_scheduled_triggers() {
    let arrangement = arrangement("xxxx");
    let mut transport = Transport::default();
    let mut sink = RecordingSink::new();

    let armed = transport.start(0.0, &arrangement, &mut sink).unwrap();
    transport.fire(armed.token, 0.42, &arrangement, &mut sink);
    transport.stop();

    // The step at 0.5 was handed to the sink before stop and is not retracted
    assert_eq!(sink.events().len(), 2);
    assert_eq!(sink.events()[1].time, 0.5);
    assert_eq!(transport.state(), TransportState::Stopped);
}

#[test]
fn test_pattern_edit_between_passes() {
    let mut arrangement = arrangement("xxxx");
    let mut transport = Transport::default();
    let mut sink = RecordingSink::new();

    let armed = transport.start(0.0, &arrangement, &mut sink).unwrap();
    arrangement.pattern.set_cell(1, BeatState::Accent);
    transport.fire(armed.token, 0.45, &arrangement, &mut sink);

    assert_eq!(
        sink.audible(),
        vec![(0.0, Intensity::Normal), (0.5, Intensity::Accent)]
    );
}

#[test]
fn test_shrink_while_playing_wraps_to_zero() {
    let mut arrangement = arrangement("xxxx/xxxx");
    let mut transport = Transport::default();
    let mut sink = RecordingSink::new();

    let mut armed = transport.start(0.0, &arrangement, &mut sink);
    let mut now = 0.0;
    while transport.cursor().current_step < 6 {
        now += 0.025;
        armed = transport.fire(armed.unwrap().token, now, &arrangement, &mut sink);
    }

    arrangement.pattern.resize(2, 1);
    sink.clear();
    while sink.events().len() < 3 {
        now += 0.025;
        armed = transport.fire(armed.unwrap().token, now, &arrangement, &mut sink);
    }

    let steps: Vec<usize> = sink.events().iter().map(|event| event.step).collect();
    assert_eq!(steps, vec![0, 1, 0]);
}

#[test]
fn test_host_thread_plays_and_stops() {
    let config = MetronomeConfig::default();
    let clock = ManualClock::new(0.0);
    let mut handle =
        host::spawn(config, arrangement("A.x."), RecordingSink::new(), clock.clone()).unwrap();

    handle.send(Command::Start).unwrap();
    assert!(wait_for(|| handle.playhead().state().is_playing()));

    // Advance the clock one poll interval at a time and let the thread catch up
    for _ in 0..40 {
        clock.advance(0.025);
        thread::sleep(Duration::from_millis(3));
    }
    assert!(wait_for(|| handle.playhead().step() == 2));

    handle.send(Command::Stop).unwrap();
    assert!(wait_for(|| handle.playhead().state().is_stopped()));

    let events: Vec<HostEvent> = handle
        .poll_notifications()
        .into_iter()
        .map(|notification| notification.event)
        .collect();
    assert!(events.contains(&HostEvent::TransportChanged(TransportState::Playing)));
    assert!(events.contains(&HostEvent::TransportChanged(TransportState::Stopped)));

    let sink = handle.shutdown().unwrap();
    let audible = sink.audible();
    assert_eq!(audible[0], (0.0, Intensity::Accent));
    assert_eq!(audible[1], (1.0, Intensity::Normal));
}

#[test]
fn test_host_thread_quit_command() {
    let clock = ManualClock::new(0.0);
    let mut handle = host::spawn(
        MetronomeConfig::default(),
        arrangement("x"),
        RecordingSink::new(),
        clock,
    )
    .unwrap();

    handle.send(Command::Quit).unwrap();
    assert!(wait_for(|| !handle.is_running()));
    assert!(handle.shutdown().is_ok());
}
