//! CPAL output backend
//!
//! Opens the configured (or default) output device at exactly the source's
//! sample rate and channel count in PCM16. There is no renegotiation: if the
//! device does not list a matching I16 configuration, `open` fails.
//!
//! ```text
//! ┌──────────────────┐  set_* under lock   ┌─────────────────────┐
//! │  Control Thread  │────────────────────►│ Arc<Mutex<MixState>>│
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ render()
//!         │ Relaxed atomics                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │   cursor/flags   │◄────────────────────│  CPAL Audio Thread  │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, SampleRate, Stream, StreamConfig};

use super::backend::{AudioBackend, RenderCallback, StreamFormat};
use super::config::AudioConfig;
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};

/// Device-backed output through CPAL
pub struct CpalBackend {
    config: AudioConfig,
    stream: Option<Stream>,
    device_name: String,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: None,
            device_name: String::new(),
        }
    }

    /// Name of the device the stream was opened on
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&mut self, format: StreamFormat, mut callback: RenderCallback) -> AudioResult<()> {
        self.close();

        let device = match &self.config.device {
            Some(id) => find_device_by_id(id)?,
            None => get_cpal_default_device()?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("CpalBackend::open: using audio device {}", device_name);

        check_exact_format(&device, format)?;

        let buffer_frames = self.config.buffer_size.frames_for(format.sample_rate);
        let stream_config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: CpalBufferSize::Fixed(buffer_frames),
        };

        log::info!(
            "CpalBackend::open: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
            format.channels,
            format.sample_rate,
            buffer_frames,
            self.config.buffer_size.latency_ms(format.sample_rate)
        );

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        self.stream = Some(stream);
        self.device_name = device_name;
        Ok(())
    }

    fn start(&mut self) -> AudioResult<()> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotOpen)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
        log::info!("CpalBackend::start: stream running on {}", self.device_name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                log::warn!("CpalBackend::stop: pause failed: {}", e);
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("CpalBackend::close: pause failed: {}", e);
            }
            drop(stream);
            log::info!("CpalBackend::close: released {}", self.device_name);
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.close();
    }
}

/// Require an I16 configuration with this exact channel count and rate
fn check_exact_format(device: &cpal::Device, format: StreamFormat) -> AudioResult<()> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let matching = supported.iter().any(|c| {
        c.sample_format() == SampleFormat::I16
            && c.channels() == format.channels
            && format.sample_rate >= c.min_sample_rate().0
            && format.sample_rate <= c.max_sample_rate().0
    });

    if matching {
        Ok(())
    } else {
        Err(AudioError::UnsupportedFormat(format!(
            "device has no PCM16 config for {} channel(s) at {}Hz",
            format.channels, format.sample_rate
        )))
    }
}
