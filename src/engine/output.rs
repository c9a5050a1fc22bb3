//! Audio output backends
//!
//! The controller never talks to hardware directly; it drives an
//! [`AudioOutput`]. `CpalOutput` plays on a real device, `OfflineOutput` is
//! pulled by the caller for renders and tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::buffer::DEFAULT_SAMPLE_RATE;
use crate::error::OutputError;

/// Callback that fills one interleaved output buffer
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

type OutputResult<T> = std::result::Result<T, OutputError>;

/// Host audio clock driving the render callback
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Install `callback` and begin pulling audio through it
    fn start(&mut self, callback: RenderCallback) -> OutputResult<()>;

    /// Stop pulling audio and drop the callback
    ///
    /// Must be synchronous: once this returns the callback is never invoked
    /// again. Stopping an idle output is a no-op.
    fn stop(&mut self) -> OutputResult<()>;

    fn is_running(&self) -> bool;
}

// ============================================================================
// Offline Output
// ============================================================================

struct OfflineState {
    callback: Option<RenderCallback>,
    frames_rendered: u64,
}

/// Caller-clocked output
///
/// Cloning yields another handle to the same output, so a test can hand one
/// clone to the controller and pull frames through the other.
///
/// # Example
/// ```
/// use phantom_words::engine::output::{AudioOutput, OfflineOutput};
///
/// let mut output = OfflineOutput::new(8000, 2);
/// let puller = output.clone();
///
/// output.start(Box::new(|buf: &mut [f32]| buf.fill(0.5))).unwrap();
/// assert_eq!(puller.render(4), vec![0.5; 8]);
///
/// output.stop().unwrap();
/// assert_eq!(puller.render(2), vec![0.0; 4]);
/// ```
#[derive(Clone)]
pub struct OfflineOutput {
    sample_rate: u32,
    channels: u16,
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineOutput {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            state: Arc::new(Mutex::new(OfflineState {
                callback: None,
                frames_rendered: 0,
            })),
        }
    }

    /// Pull `frames` interleaved frames from the installed callback
    ///
    /// Returns silence when nothing is playing. The clock only advances
    /// while a callback is installed.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0_f32; frames * self.channels as usize];
        let mut state = self.state.lock();
        if let Some(callback) = state.callback.as_mut() {
            callback(&mut out);
            state.frames_rendered += frames as u64;
        }
        out
    }

    /// Frames pulled through callbacks since creation
    pub fn frames_rendered(&self) -> u64 {
        self.state.lock().frames_rendered
    }
}

impl Default for OfflineOutput {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, 2)
    }
}

impl AudioOutput for OfflineOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, callback: RenderCallback) -> OutputResult<()> {
        let mut state = self.state.lock();
        if state.callback.is_some() {
            return Err(OutputError::AlreadyRunning);
        }
        state.callback = Some(callback);
        Ok(())
    }

    fn stop(&mut self) -> OutputResult<()> {
        self.state.lock().callback = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state.lock().callback.is_some()
    }
}

// ============================================================================
// Device Output
// ============================================================================

#[cfg(feature = "device")]
pub use device::CpalOutput;

#[cfg(feature = "device")]
mod device {
    use super::*;
    use crate::config::OutputConfig;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{
        Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    };
    use tracing::{debug, error};

    /// Output on a cpal device
    pub struct CpalOutput {
        device: Device,
        config: StreamConfig,
        sample_format: SampleFormat,
        stream: Arc<Mutex<Option<Stream>>>,
    }

    impl CpalOutput {
        /// Open the default (or named) output device
        pub fn open(settings: &OutputConfig) -> OutputResult<Self> {
            let host = cpal::default_host();

            let device = match &settings.device_name {
                Some(name) => host
                    .output_devices()
                    .map_err(|e| OutputError::Device(format!("Failed to list devices: {}", e)))?
                    .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                    .ok_or_else(|| OutputError::Device(format!("No output device named '{}'", name)))?,
                None => host
                    .default_output_device()
                    .ok_or_else(|| OutputError::Device("No output device available".to_string()))?,
            };

            let default = device.default_output_config().map_err(|e| {
                OutputError::Device(format!("Failed to get default config: {}", e))
            })?;

            let sample_format = default.sample_format();
            let mut config: StreamConfig = default.into();
            if let Some(rate) = settings.sample_rate {
                config.sample_rate = SampleRate(rate);
            }
            if let Some(channels) = settings.channels {
                config.channels = channels;
            }

            debug!(
                "[OUTPUT] Opened '{}' at {} Hz, {} ch, {:?}",
                device.name().unwrap_or_default(),
                config.sample_rate.0,
                config.channels,
                sample_format
            );

            Ok(Self {
                device,
                config,
                sample_format,
                #[allow(clippy::arc_with_non_send_sync)]
                stream: Arc::new(Mutex::new(None)),
            })
        }
    }

    impl AudioOutput for CpalOutput {
        fn sample_rate(&self) -> u32 {
            self.config.sample_rate.0
        }

        fn channels(&self) -> u16 {
            self.config.channels
        }

        fn start(&mut self, callback: RenderCallback) -> OutputResult<()> {
            let mut slot = self.stream.lock();
            if slot.is_some() {
                return Err(OutputError::AlreadyRunning);
            }

            let (device, config) = (&self.device, &self.config);
            let stream = match self.sample_format {
                SampleFormat::F32 => build_stream_f32(device, config, callback),
                SampleFormat::F64 => build_stream_converted::<f64>(device, config, callback),
                SampleFormat::I16 => build_stream_converted::<i16>(device, config, callback),
                SampleFormat::I32 => build_stream_converted::<i32>(device, config, callback),
                SampleFormat::U16 => build_stream_converted::<u16>(device, config, callback),
                other => {
                    return Err(OutputError::Device(format!(
                        "Unsupported device sample format {:?}",
                        other
                    )))
                }
            }?;

            stream
                .play()
                .map_err(|e| OutputError::Device(format!("Failed to play stream: {}", e)))?;

            *slot = Some(stream);
            Ok(())
        }

        fn stop(&mut self) -> OutputResult<()> {
            // Dropping the stream ends the callback even if pause fails
            if let Some(stream) = self.stream.lock().take() {
                stream
                    .pause()
                    .map_err(|e| OutputError::Device(format!("Failed to stop stream: {}", e)))?;
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.stream.lock().is_some()
        }
    }

    fn build_stream_f32(
        device: &Device,
        config: &StreamConfig,
        mut callback: RenderCallback,
    ) -> OutputResult<Stream> {
        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                |err| error!("[OUTPUT] Audio stream error: {}", err),
                None,
            )
            .map_err(|e| OutputError::Device(format!("Failed to build stream: {}", e)))
    }

    /// Render into an f32 scratch buffer, then convert to the device format
    fn build_stream_converted<T>(
        device: &Device,
        config: &StreamConfig,
        mut callback: RenderCallback,
    ) -> OutputResult<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mut scratch: Vec<f32> = Vec::new();
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    callback(&mut scratch[..]);
                    convert_into(&scratch, data);
                },
                |err| error!("[OUTPUT] Audio stream error: {}", err),
                None,
            )
            .map_err(|e| OutputError::Device(format!("Failed to build stream: {}", e)))
    }

    pub(super) fn convert_into<T: Sample + FromSample<f32>>(src: &[f32], dst: &mut [T]) {
        for (out, &sample) in dst.iter_mut().zip(src) {
            *out = T::from_sample(sample);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
