// Click - Pre-generated click sounds and the sample-accurate renderer
// Runs inside the audio callback: no allocation after construction

use std::collections::VecDeque;
use std::f32::consts::PI;

use crate::sequencer::pattern::Intensity;

/// A click to start at an absolute frame on the audio clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledClick {
    pub frame: u64,
    pub intensity: Intensity,
}

/// Click sound bank
///
/// Accent clicks are a higher, louder sine burst than normal clicks. Both
/// decay exponentially to near silence over the click duration.
#[derive(Debug, Clone)]
pub struct ClickSound {
    accent_samples: Vec<f32>,
    normal_samples: Vec<f32>,
}

impl ClickSound {
    const CLICK_DURATION_MS: f32 = 50.0;
    const ACCENT_FREQUENCY: f32 = 880.0;
    const ACCENT_GAIN: f32 = 1.0;
    const NORMAL_FREQUENCY: f32 = 440.0;
    const NORMAL_GAIN: f32 = 0.8;
    /// Envelope level reached at the end of the click
    const DECAY_FLOOR: f32 = 0.001;

    pub fn new(sample_rate: f32) -> Self {
        let click_samples = ((Self::CLICK_DURATION_MS / 1000.0) * sample_rate) as usize;

        Self {
            accent_samples: Self::generate_click(
                sample_rate,
                click_samples,
                Self::ACCENT_FREQUENCY,
                Self::ACCENT_GAIN,
            ),
            normal_samples: Self::generate_click(
                sample_rate,
                click_samples,
                Self::NORMAL_FREQUENCY,
                Self::NORMAL_GAIN,
            ),
        }
    }

    fn generate_click(sample_rate: f32, num_samples: usize, frequency: f32, gain: f32) -> Vec<f32> {
        let phase_increment = 2.0 * PI * frequency / sample_rate;
        // gain * (floor / gain)^t ramps exponentially from gain to floor
        let ratio = Self::DECAY_FLOOR / gain;

        (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = gain * ratio.powf(t);
                (i as f32 * phase_increment).sin() * envelope
            })
            .collect()
    }

    pub fn samples(&self, intensity: Intensity) -> &[f32] {
        match intensity {
            Intensity::Accent => &self.accent_samples,
            Intensity::Normal => &self.normal_samples,
        }
    }

    /// Click length in frames
    pub fn click_duration(&self) -> usize {
        self.accent_samples.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickVoice {
    intensity: Intensity,
    position: usize,
}

/// Mixes scheduled clicks into the output, one frame at a time
///
/// Clicks are started on the exact frame they were scheduled for. A click
/// whose frame has already passed starts on the next rendered frame.
#[derive(Debug, Clone)]
pub struct ClickRenderer {
    sound: ClickSound,
    /// Sorted by frame, earliest first
    pending: VecDeque<ScheduledClick>,
    voices: Vec<ClickVoice>,
    frame: u64,
    volume: f32,
}

impl ClickRenderer {
    /// Capacity of the pending queue
    pub const MAX_PENDING: usize = 256;
    /// Overlapping clicks; the oldest is stolen when full
    pub const MAX_VOICES: usize = 16;

    pub fn new(sample_rate: f32) -> Self {
        Self {
            sound: ClickSound::new(sample_rate),
            pending: VecDeque::with_capacity(Self::MAX_PENDING),
            voices: Vec::with_capacity(Self::MAX_VOICES),
            frame: 0,
            volume: 1.0,
        }
    }

    /// Queue a click. Returns false if the pending queue is full.
    pub fn schedule(&mut self, click: ScheduledClick) -> bool {
        if self.pending.len() >= Self::MAX_PENDING {
            return false;
        }
        let index = self.pending.partition_point(|queued| queued.frame <= click.frame);
        self.pending.insert(index, click);
        true
    }

    /// Render one mono frame and advance the frame counter
    pub fn next_sample(&mut self) -> f32 {
        while let Some(click) = self.pending.front() {
            if click.frame > self.frame {
                break;
            }
            let intensity = click.intensity;
            self.pending.pop_front();
            self.start_voice(intensity);
        }

        let mut output = 0.0;
        for voice in self.voices.iter_mut() {
            let samples = self.sound.samples(voice.intensity);
            if let Some(sample) = samples.get(voice.position) {
                output += sample;
            }
            voice.position += 1;
        }
        let duration = self.sound.click_duration();
        self.voices.retain(|voice| voice.position < duration);

        self.frame += 1;
        output * self.volume
    }

    /// Render a block of mono frames
    pub fn process_buffer(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.next_sample();
        }
    }

    fn start_voice(&mut self, intensity: Intensity) {
        if self.voices.len() >= Self::MAX_VOICES {
            self.voices.remove(0);
        }
        self.voices.push(ClickVoice {
            intensity,
            position: 0,
        });
    }

    /// Next frame to be rendered
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}
