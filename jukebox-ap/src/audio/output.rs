//! Audio output devices
//!
//! The engine owns exactly one [`AudioOutput`] and is its only writer.
//! `open` always tears the previous device down before building a new one,
//! so two device handles never coexist.

use crate::config::OutputKind;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use jukebox_common::time::samples_to_duration;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Seconds of audio the cpal ring can hold
const RING_SECONDS: usize = 2;

/// Output device contract used by the playback engine
pub trait AudioOutput: Send {
    /// Prepare the device for the given format, replacing any open device
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<()>;

    /// Queue interleaved samples for playback
    fn push(&mut self, samples: &[f32]) -> Result<()>;

    /// Start or resume playback of queued samples
    fn start(&mut self) -> Result<()>;

    /// Pause playback; queued samples are kept
    fn stop(&mut self);

    /// Discard samples queued but not yet played
    fn clear(&mut self);

    /// Release the device; blocks until it is fully torn down
    fn close(&mut self);

    /// Audio queued but not yet played
    fn backlog(&self) -> Duration;
}

/// Build the output selected in configuration
pub fn create_output(kind: OutputKind) -> Box<dyn AudioOutput> {
    match kind {
        OutputKind::Cpal => Box::new(CpalOutput::new()),
        OutputKind::Null => Box::new(NullOutput::new()),
    }
}

enum Control {
    Play,
    Pause,
    Shutdown,
}

struct DeviceThread {
    control: std_mpsc::Sender<Control>,
    handle: JoinHandle<()>,
    producer: HeapProd<f32>,
    /// Samples the callback skips before playing anything else
    discard: Arc<AtomicUsize>,
    sample_rate: u32,
    channels: u16,
}

/// System audio device via cpal
///
/// `cpal::Stream` is not `Send`, so each opened device lives on its own OS
/// thread. Samples reach the device callback through a lock-free ring.
pub struct CpalOutput {
    device: Option<DeviceThread>,
    error_flag: Arc<AtomicBool>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            device: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn_device(&self, sample_rate: u32, channels: u16) -> Result<DeviceThread> {
        let capacity = sample_rate as usize * channels as usize * RING_SECONDS;
        let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1)).split();
        let (control_tx, control_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let error_flag = Arc::clone(&self.error_flag);
        let discard = Arc::new(AtomicUsize::new(0));
        let skipper = Skipper(Arc::clone(&discard));

        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match build_stream(sample_rate, channels, consumer, skipper, error_flag) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_device(stream, control_rx);
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(DeviceThread {
                control: control_tx,
                handle,
                producer,
                discard,
                sample_rate,
                channels,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::AudioOutput("Output thread exited during setup".to_string()))
            }
        }
    }

    fn send(&self, control: Control) -> Result<()> {
        match &self.device {
            Some(device) => device
                .control
                .send(control)
                .map_err(|_| Error::AudioOutput("Output thread is gone".to_string())),
            None => Err(Error::AudioOutput("No output device open".to_string())),
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        self.close();
        self.error_flag.store(false, Ordering::SeqCst);
        self.device = Some(self.spawn_device(sample_rate, channels)?);
        info!("Audio output opened: {} Hz, {} channels", sample_rate, channels);
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) -> Result<()> {
        if self.error_flag.load(Ordering::SeqCst) {
            return Err(Error::AudioOutput("Audio stream reported an error".to_string()));
        }
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| Error::AudioOutput("No output device open".to_string()))?;

        let pushed = device.producer.push_slice(samples);
        if pushed < samples.len() {
            warn!(
                "Audio ring full, dropped {} samples",
                samples.len() - pushed
            );
        }
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.send(Control::Play)
    }

    fn stop(&mut self) {
        if self.device.is_some() {
            let _ = self.send(Control::Pause);
        }
    }

    fn clear(&mut self) {
        if let Some(device) = &self.device {
            device
                .discard
                .store(device.producer.occupied_len(), Ordering::SeqCst);
        }
    }

    fn close(&mut self) {
        if let Some(device) = self.device.take() {
            let _ = device.control.send(Control::Shutdown);
            if device.handle.join().is_err() {
                error!("Audio output thread panicked");
            }
            debug!("Audio output closed");
        }
    }

    fn backlog(&self) -> Duration {
        match &self.device {
            Some(device) => samples_to_duration(
                device
                    .producer
                    .occupied_len()
                    .saturating_sub(device.discard.load(Ordering::SeqCst)) as u64,
                device.sample_rate,
                device.channels,
            ),
            None => Duration::ZERO,
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Device thread body: own the stream until told to shut down
fn run_device(stream: Stream, control: std_mpsc::Receiver<Control>) {
    while let Ok(message) = control.recv() {
        let result = match message {
            Control::Play => stream.play().map_err(|e| e.to_string()),
            Control::Pause => stream.pause().map_err(|e| e.to_string()),
            Control::Shutdown => break,
        };
        if let Err(e) = result {
            error!("Audio stream control failed: {}", e);
        }
    }
    drop(stream);
}

fn build_stream(
    sample_rate: u32,
    channels: u16,
    consumer: HeapCons<f32>,
    skipper: Skipper,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let sample_format = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?
        .sample_format();

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    debug!(
        "Building stream on {}: {} Hz, {} channels, {:?}",
        name, sample_rate, channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream_f32(&device, &config, consumer, skipper, error_flag)?,
        SampleFormat::I16 => build_stream_i16(&device, &config, consumer, skipper, error_flag)?,
        SampleFormat::U16 => build_stream_u16(&device, &config, consumer, skipper, error_flag)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };
    Ok(stream)
}

/// Callback side of [`AudioOutput::clear`]
struct Skipper(Arc<AtomicUsize>);

impl Skipper {
    fn apply(&self, consumer: &mut HeapCons<f32>) {
        let count = self.0.swap(0, Ordering::SeqCst);
        if count > 0 {
            consumer.skip(count.min(consumer.occupied_len()));
        }
    }
}

fn stream_error_callback(error_flag: Arc<AtomicBool>) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!("Audio stream error: {}", err);
        error_flag.store(true, Ordering::SeqCst);
    }
}

fn build_stream_f32(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    skipper: Skipper,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                skipper.apply(&mut consumer);
                let filled = consumer.pop_slice(data);
                // Underrun: pad with silence
                data[filled..].fill(0.0);
            },
            stream_error_callback(error_flag),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

fn build_stream_i16(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    skipper: Skipper,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                skipper.apply(&mut consumer);
                for out in data.iter_mut() {
                    let sample = consumer.try_pop().unwrap_or(0.0).clamp(-1.0, 1.0);
                    *out = (sample * i16::MAX as f32) as i16;
                }
            },
            stream_error_callback(error_flag),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

fn build_stream_u16(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    skipper: Skipper,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                skipper.apply(&mut consumer);
                for out in data.iter_mut() {
                    let sample = consumer.try_pop().unwrap_or(0.0).clamp(-1.0, 1.0);
                    // [-1.0, 1.0] to [0, 65535]
                    *out = ((sample + 1.0) * 32767.5) as u16;
                }
            },
            stream_error_callback(error_flag),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Output that discards audio at real-time rate
///
/// Keeps a simulated backlog so the engine paces itself the same way it
/// would against a device.
pub struct NullOutput {
    format: Option<(u32, u16)>,
    playing: bool,
    queued: Duration,
    last_drain: tokio::time::Instant,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            format: None,
            playing: false,
            queued: Duration::ZERO,
            last_drain: tokio::time::Instant::now(),
        }
    }

    fn drain(&mut self) {
        let now = tokio::time::Instant::now();
        if self.playing {
            let played = now.saturating_duration_since(self.last_drain);
            self.queued = self.queued.saturating_sub(played);
        }
        self.last_drain = now;
    }

    fn pending(&self) -> Duration {
        if !self.playing {
            return self.queued;
        }
        let played = tokio::time::Instant::now().saturating_duration_since(self.last_drain);
        self.queued.saturating_sub(played)
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn open(&mut self, sample_rate: u32, channels: u16) -> Result<()> {
        if sample_rate == 0 || channels == 0 {
            return Err(Error::AudioOutput(format!(
                "Invalid output format: {} Hz, {} channels",
                sample_rate, channels
            )));
        }
        self.format = Some((sample_rate, channels));
        self.playing = false;
        self.queued = Duration::ZERO;
        self.last_drain = tokio::time::Instant::now();
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) -> Result<()> {
        let (sample_rate, channels) = self
            .format
            .ok_or_else(|| Error::AudioOutput("No output device open".to_string()))?;
        self.drain();
        self.queued += samples_to_duration(samples.len() as u64, sample_rate, channels);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.format.is_none() {
            return Err(Error::AudioOutput("No output device open".to_string()));
        }
        self.drain();
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.drain();
        self.playing = false;
    }

    fn clear(&mut self) {
        self.queued = Duration::ZERO;
        self.last_drain = tokio::time::Instant::now();
    }

    fn close(&mut self) {
        self.format = None;
        self.playing = false;
        self.queued = Duration::ZERO;
    }

    fn backlog(&self) -> Duration {
        self.pending()
    }
}
