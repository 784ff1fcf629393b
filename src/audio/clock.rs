// Audio clock - Monotonic "now" in seconds for the scheduler
// The cpal callback advances the frame counter; the scheduler thread reads it

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of the current audio-clock time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Frame-counting clock shared with the audio callback
#[derive(Debug, Clone)]
pub struct AudioClock {
    /// Frames rendered so far (incremented by the audio callback)
    frame_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frame_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Current frame position (called from the scheduler thread)
    pub fn current_frame(&self) -> u64 {
        self.frame_position.load(Ordering::Acquire)
    }

    /// Advance frame position (called from the audio callback)
    pub fn advance(&self, frames: usize) {
        self.frame_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    /// Convert an absolute clock time to a frame position, rounding to nearest
    ///
    /// Negative times map to frame 0.
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}

impl Clock for AudioClock {
    fn now(&self) -> f64 {
        self.frames_to_seconds(self.current_frame())
    }
}

/// Wall-clock time since construction
///
/// Used when no audio device is open (dry runs).
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock driven by hand, for tests and offline rendering
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
