// Click engine - cpal output stream rendering scheduled clicks
//
// The scheduler thread converts trigger times to frames on the shared
// `AudioClock` and pushes `ScheduledClick`s through a lock-free queue. The
// audio callback drains the queue into a `ClickRenderer`, renders mono f32
// and converts to the device sample format (F32, I16 or U16) per frame.
//
// The cpal `Stream` is not `Send` on every platform, so the engine stays on
// the thread that opened it; only the `ClickSink` moves to the scheduler.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use thiserror::Error;

use crate::audio::click::{ClickRenderer, ScheduledClick};
use crate::audio::clock::AudioClock;
use crate::audio::device::AudioDeviceManager;
use crate::messaging::channels::{ClickConsumer, ClickProducer, create_click_channel};
use crate::sequencer::trigger::{SinkError, TriggerEvent, TriggerSink};

/// Audio backend errors
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("audio output device '{0}' not found")]
    DeviceNotFound(String),

    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format: {0:?} (supported: F32, I16, U16)")]
    UnsupportedFormat(SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Trigger sink feeding the click engine
///
/// Empty triggers are accepted and render nothing. Once the engine is closed
/// or the stream reports an error, every trigger fails with `Unavailable`.
pub struct ClickSink {
    producer: ClickProducer,
    clock: AudioClock,
    available: Arc<AtomicBool>,
}

impl ClickSink {
    pub fn new(producer: ClickProducer, clock: AudioClock, available: Arc<AtomicBool>) -> Self {
        Self {
            producer,
            clock,
            available,
        }
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl TriggerSink for ClickSink {
    fn trigger(&mut self, event: TriggerEvent) -> Result<(), SinkError> {
        if !self.is_available() {
            return Err(SinkError::Unavailable);
        }

        let Some(intensity) = event.intensity() else {
            return Ok(());
        };

        let click = ScheduledClick {
            frame: self.clock.seconds_to_frames(event.time),
            intensity,
        };

        self.producer.try_push(click).map_err(|_| {
            tracing::warn!(time = event.time, "click queue full, trigger dropped");
            SinkError::QueueFull { time: event.time }
        })
    }
}

/// Open cpal output stream playing scheduled clicks
pub struct ClickEngine {
    stream: Option<Stream>,
    device_name: String,
    sample_rate: f32,
    available: Arc<AtomicBool>,
    volume: Arc<AtomicU32>,
    /// Clicks the callback could not fit into the renderer
    dropped: Arc<AtomicUsize>,
}

impl ClickEngine {
    /// Capacity of the scheduler → callback queue
    pub const QUEUE_CAPACITY: usize = 256;

    /// Open `device_name` (or the default output) and start the stream
    ///
    /// Returns the engine, which must stay on the calling thread, and the
    /// sink to hand to the scheduler.
    pub fn open(device_name: Option<&str>) -> Result<(Self, ClickSink), AudioError> {
        let device = AudioDeviceManager::new().output_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        tracing::debug!(device = %name, ?sample_format, sample_rate, channels, "opening output stream");

        let clock = AudioClock::new(sample_rate);
        let available = Arc::new(AtomicBool::new(false));
        let volume = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let dropped = Arc::new(AtomicUsize::new(0));
        let (producer, consumer) = create_click_channel(Self::QUEUE_CAPACITY);
        let renderer = ClickRenderer::new(sample_rate);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                channels,
                consumer,
                renderer,
                clock.clone(),
                Arc::clone(&volume),
                Arc::clone(&available),
                Arc::clone(&dropped),
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                channels,
                consumer,
                renderer,
                clock.clone(),
                Arc::clone(&volume),
                Arc::clone(&available),
                Arc::clone(&dropped),
            ),
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config,
                channels,
                consumer,
                renderer,
                clock.clone(),
                Arc::clone(&volume),
                Arc::clone(&available),
                Arc::clone(&dropped),
            ),
            other => return Err(AudioError::UnsupportedFormat(other)),
        }?;

        stream.play()?;
        available.store(true, Ordering::Release);

        tracing::info!(device = %name, sample_rate, channels, "click engine started");

        let sink = ClickSink::new(producer, clock, Arc::clone(&available));
        let engine = Self {
            stream: Some(stream),
            device_name: name,
            sample_rate,
            available,
            volume,
            dropped,
        };

        Ok((engine, sink))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Total clicks lost because the renderer's pending queue was full
    pub fn dropped_clicks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Release the audio device
    ///
    /// Sinks created by this engine report `Unavailable` afterwards. Calling
    /// it twice is harmless.
    pub fn close(&mut self) {
        self.available.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!(%err, "pausing stream before close failed");
            }
            drop(stream);
            tracing::info!(device = %self.device_name, "click engine closed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        mut consumer: ClickConsumer,
        mut renderer: ClickRenderer,
        clock: AudioClock,
        volume: Arc<AtomicU32>,
        available: Arc<AtomicBool>,
        dropped: Arc<AtomicUsize>,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // Realtime: no allocation, no locks, no logging
                drain_clicks(&mut consumer, &mut renderer, &dropped);

                renderer.set_volume(f32::from_bits(volume.load(Ordering::Relaxed)));

                for frame in data.chunks_mut(channels) {
                    let sample = renderer.next_sample();
                    write_mono_to_interleaved_frame(sample, frame);
                }

                clock.advance(data.len() / channels);
            },
            move |err| {
                tracing::error!(%err, "audio stream error");
                available.store(false, Ordering::Release);
            },
            None,
        )?;

        Ok(stream)
    }
}

impl Drop for ClickEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Move queued clicks into the renderer, counting those it has no room for
fn drain_clicks(consumer: &mut ClickConsumer, renderer: &mut ClickRenderer, dropped: &AtomicUsize) {
    while let Some(click) = consumer.try_pop() {
        if !renderer.schedule(click) {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Write one mono sample to every channel of an interleaved frame
#[inline]
fn write_mono_to_interleaved_frame<T>(sample: f32, frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for channel_sample in frame.iter_mut() {
        *channel_sample = T::from_sample(sample);
    }
}
