// Shared playhead - Lock-free view of transport state for other threads

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::sequencer::transport::TransportState;

/// Written by the scheduler thread, read by anyone
#[derive(Debug)]
pub struct SharedPlayhead {
    playing: AtomicBool,
    step: AtomicUsize,
    /// Tempo in BPM, stored as f64 bits
    tempo_bits: AtomicU64,
}

impl SharedPlayhead {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else {
            TransportState::Stopped
        }
    }

    pub fn set_state(&self, state: TransportState) {
        self.playing.store(state.is_playing(), Ordering::Release);
    }

    /// Currently sounding step
    pub fn step(&self) -> usize {
        self.step.load(Ordering::Relaxed)
    }

    pub fn set_step(&self, step: usize) {
        self.step.store(step, Ordering::Relaxed);
    }

    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Relaxed))
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.tempo_bits.store(bpm.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedPlayhead {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            step: AtomicUsize::new(0),
            tempo_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }
}
