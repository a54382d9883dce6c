//! # Audio Capture Module
//!
//! Real-time audio capture using CPAL (Cross-Platform Audio Library).
//! The input callback down-mixes to mono, cuts the stream into frames of the
//! configured size and hands them to the processing loop over a bounded
//! channel.
//!
//! ## Features
//! - Default or user-chosen input device
//! - Configured sample rate, 32-bit float format
//! - Fixed-size frames regardless of the backend's callback size

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::error::DeviceError;

/// Frames buffered between the audio callback and the processing loop.
/// When full, new frames are dropped.
const FRAME_QUEUE_DEPTH: usize = 64;

/// How long a read waits before reporting that no frame arrived.
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Produces fixed-size frames of mono audio.
pub trait SampleSource {
    /// Blocks until the next frame is available.
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - The next frame
    /// * `Ok(None)` - Nothing arrived within the source's wait time; call again
    /// * `Err(DeviceError::StreamClosed)` - The source has ended
    fn read(&mut self) -> Result<Option<Vec<f32>>, DeviceError>;
}

/// Reads frames from a crossbeam channel.
pub struct ChannelSource {
    frames: Receiver<Vec<f32>>,
    timeout: Duration,
}

impl ChannelSource {
    pub fn new(frames: Receiver<Vec<f32>>) -> Self {
        Self {
            frames,
            timeout: READ_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SampleSource for ChannelSource {
    fn read(&mut self) -> Result<Option<Vec<f32>>, DeviceError> {
        match self.frames.recv_timeout(self.timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::StreamClosed),
        }
    }
}

/// An audio input device as listed for interactive selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
}

/// Lists the host's input devices in backend order.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let devices = host.input_devices().map_err(backend)?;
    Ok(devices
        .enumerate()
        .map(|(index, device)| InputDeviceInfo {
            index,
            name: device.name().unwrap_or_else(|_| format!("Device {index}")),
        })
        .collect())
}

/// A running input stream. Dropping it stops capture.
pub struct AudioCapture {
    _stream: cpal::Stream,
    source: ChannelSource,
    device_name: String,
    sample_rate: u32,
}

impl AudioCapture {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl SampleSource for AudioCapture {
    fn read(&mut self) -> Result<Option<Vec<f32>>, DeviceError> {
        self.source.read()
    }
}

/// Starts audio capture.
///
/// This function:
/// 1. Selects the input device (`device_index` into [`list_input_devices`],
///    or the host default)
/// 2. Picks an f32 configuration that supports `sample_rate`
/// 3. Starts a stream that delivers mono frames of exactly `frame_size`
///    samples
pub fn start_audio_capture(
    device_index: Option<usize>,
    sample_rate: u32,
    frame_size: usize,
) -> Result<AudioCapture, DeviceError> {
    let host = cpal::default_host();
    let device = match device_index {
        Some(index) => host
            .input_devices()
            .map_err(backend)?
            .nth(index)
            .ok_or(DeviceError::DeviceIndexOutOfRange(index))?,
        None => host.default_input_device().ok_or(DeviceError::NoInputDevice)?,
    };

    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    log::info!("Using audio input device: {}", device_name);

    let configs = device
        .supported_input_configs()
        .map_err(backend)?
        .collect::<Vec<_>>();
    if !configs.iter().any(|c| c.sample_format() == cpal::SampleFormat::F32) {
        return Err(DeviceError::NoSuitableConfig);
    }
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or(DeviceError::UnsupportedSampleRate(sample_rate))?;

    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();
    log::info!(
        "Selected {} Hz, {} channel(s), {} samples per frame",
        sample_rate,
        channels,
        frame_size
    );

    let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
    let mut framer = Framer::new(frame_size, channels, frame_tx);

    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| framer.push(data),
            err_fn,
            None,
        )
        .map_err(backend)?;

    stream.play().map_err(backend)?;

    Ok(AudioCapture {
        _stream: stream,
        source: ChannelSource::new(frame_rx),
        device_name,
        sample_rate,
    })
}

/// Accumulates interleaved callback data into mono frames.
struct Framer {
    frame_size: usize,
    channels: usize,
    buffer: Vec<f32>,
    sender: Sender<Vec<f32>>,
}

impl Framer {
    fn new(frame_size: usize, channels: usize, sender: Sender<Vec<f32>>) -> Self {
        Self {
            frame_size,
            channels: channels.max(1),
            buffer: Vec::with_capacity(frame_size * 2),
            sender,
        }
    }

    fn push(&mut self, interleaved: &[f32]) {
        let scale = 1.0 / self.channels as f32;
        self.buffer.extend(
            interleaved
                .chunks_exact(self.channels)
                .map(|samples| samples.iter().sum::<f32>() * scale),
        );

        // While we have enough data for a full frame, send it.
        while self.buffer.len() >= self.frame_size {
            let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            // Send the frame, ignoring errors if the channel is full.
            let _ = self.sender.try_send(frame);
        }
    }
}

/// Finds an f32 configuration whose range contains `target_rate`, preferring
/// the fewest channels.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}

fn backend(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Backend(err.to_string())
}
