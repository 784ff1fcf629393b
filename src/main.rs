// beatgrid - Command-line metronome
//
// Plays a beat grid through the default (or named) output device until
// Ctrl+C or `--duration` elapses. `--dry-run` prints triggers instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use beatgrid::audio::device::AudioDeviceManager;
use beatgrid::host::{self, HostHandle};
use beatgrid::messaging::notification::{HostEvent, NotificationLevel};
use beatgrid::{
    Arrangement, ClickEngine, Clock, Command, MetronomeConfig, Pattern, PatternSnapshot,
    SinkError, Subdivision, SystemClock, TriggerEvent, TriggerSink,
};

/// How often the control loop drains notifications
const UI_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser, Debug)]
#[command(name = "beatgrid")]
#[command(author, version, about = "Grid metronome with a lookahead beat scheduler", long_about = None)]
struct Args {
    /// Pattern rows separated by '/', e.g. "A.x./x.x." (A accent, x normal, . empty)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Tempo in BPM (clamped to the configured range)
    #[arg(short, long)]
    tempo: Option<f64>,

    /// Pulses per beat: 1-4 or quarter, eighth, triplet, 16th
    #[arg(short, long)]
    subdivision: Option<Subdivision>,

    /// Grid width (overrides the pattern's width)
    #[arg(long)]
    width: Option<usize>,

    /// Grid height (overrides the pattern's height)
    #[arg(long)]
    height: Option<usize>,

    /// Load pattern, tempo and subdivision from a JSON snapshot
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write the resulting arrangement to a JSON snapshot before playing
    #[arg(long)]
    save_snapshot: Option<PathBuf>,

    /// Config file (RON). Defaults to <config dir>/beatgrid/config.ron
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name
    #[arg(long)]
    device: Option<String>,

    /// Click volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Print triggers instead of opening an audio device
    #[arg(long)]
    dry_run: bool,
}

/// Sink for `--dry-run`: prints audible triggers as they are scheduled
struct PrintSink;

impl TriggerSink for PrintSink {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        if let Some(intensity) = event.intensity() {
            println!(
                "{:>9.3}s  step {:>3}  {:?}{}",
                event.time,
                event.step + 1,
                intensity,
                if event.is_primary() { "" } else { "  (sub)" }
            );
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if args.list_devices {
        for device in AudioDeviceManager::new().list_output_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device.name, marker);
        }
        return Ok(());
    }

    let config = MetronomeConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    let arrangement = build_arrangement(&args, &config)?;

    if let Some(path) = &args.save_snapshot {
        arrangement
            .snapshot()
            .save(path)
            .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
        tracing::info!(path = %path.display(), "snapshot saved");
    }

    println!(
        "{}  {}  {}x{}  {}",
        arrangement.tempo,
        arrangement.subdivision,
        arrangement.pattern.width(),
        arrangement.pattern.height(),
        arrangement.pattern
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if args.dry_run {
        let handle = host::spawn(config, arrangement, PrintSink, SystemClock::new())?;
        play(handle, &running, args.duration, None)?;
        return Ok(());
    }

    let (mut engine, sink) = ClickEngine::open(args.device.as_deref())?;
    if let Some(volume) = args.volume {
        engine.set_volume(volume);
    }
    println!(
        "output: {} @ {} Hz, volume {:.2}",
        engine.device_name(),
        engine.sample_rate(),
        engine.volume()
    );
    let clock = sink.clock().clone();
    tracing::debug!(start = clock.now(), "audio clock running");

    let handle = host::spawn(config, arrangement, sink, clock)?;
    let result = play(handle, &running, args.duration, Some(&engine));
    engine.close();
    result
}

/// Resolve the arrangement from snapshot, config defaults and CLI overrides
fn build_arrangement(args: &Args, config: &MetronomeConfig) -> anyhow::Result<Arrangement> {
    let mut arrangement = match &args.snapshot {
        Some(path) => PatternSnapshot::load(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?
            .restore(config),
        None => config.initial_arrangement(),
    };

    if let Some(text) = &args.pattern {
        let pattern: Pattern = text.parse().context("invalid --pattern")?;
        let (width, height) = config.clamp_dimensions(pattern.width(), pattern.height());
        arrangement.pattern = Pattern::from_cells(width, height, pattern.cells().to_vec());
    }

    if args.width.is_some() || args.height.is_some() {
        let (width, height) = config.clamp_dimensions(
            args.width.unwrap_or(arrangement.pattern.width()),
            args.height.unwrap_or(arrangement.pattern.height()),
        );
        arrangement.pattern.resize(width, height);
    }

    if let Some(bpm) = args.tempo {
        arrangement.tempo = config.clamp_tempo(bpm);
    }
    if let Some(subdivision) = args.subdivision {
        arrangement.subdivision = subdivision;
    }

    Ok(arrangement)
}

/// Start playback and run the control loop until interrupted
fn play<S>(
    mut handle: HostHandle<S>,
    running: &AtomicBool,
    duration: Option<f64>,
    engine: Option<&ClickEngine>,
) -> anyhow::Result<()>
where
    S: TriggerSink + Send + 'static,
{
    handle.send(Command::Start)?;
    let deadline = duration
        .and_then(|seconds| Duration::try_from_secs_f64(seconds.max(0.0)).ok())
        .map(|length| Instant::now() + length);

    let mut dropped_clicks = 0;

    while running.load(Ordering::SeqCst) && handle.is_running() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        for notification in handle.poll_notifications() {
            match (notification.level, notification.event) {
                (_, HostEvent::StepChanged(step)) => tracing::debug!(step = step + 1, "playhead"),
                (NotificationLevel::Warning, _) => {
                    tracing::warn!(category = ?notification.category, "{}", notification.message())
                }
                (NotificationLevel::Info, _) => tracing::info!("{}", notification.message()),
            }
        }

        if let Some(engine) = engine {
            let total = engine.dropped_clicks();
            if total > dropped_clicks {
                tracing::warn!(count = total - dropped_clicks, "click renderer full, clicks dropped");
                dropped_clicks = total;
            }
        }

        thread::sleep(UI_POLL_INTERVAL);
    }

    handle.shutdown()?;
    Ok(())
}
