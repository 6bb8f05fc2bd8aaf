//! Backend capability interface
//!
//! The engine talks to the output device only through [`AudioBackend`]. A
//! backend is handed a render callback at `open` and calls it from its own
//! thread with an interleaved PCM16 buffer to fill.

use super::config::{AudioConfig, BackendKind};
use super::error::AudioResult;
use super::null_backend::NullBackend;

/// Callback invoked from the device thread with an interleaved PCM16 buffer
pub type RenderCallback = Box<dyn FnMut(&mut [i16]) + Send + 'static>;

/// Exact stream format the device must run at (always PCM16 interleaved)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Nominal period of roughly 10 ms
    pub fn period_frames(&self) -> u32 {
        (self.sample_rate / 100).max(1)
    }
}

/// An output device that can run one PCM16 stream
///
/// Not `Send`: some hosts tie the stream handle to the thread that built it.
pub trait AudioBackend {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Open the device at exactly `format` and install `callback`
    ///
    /// Fails rather than negotiating a different format.
    fn open(&mut self, format: StreamFormat, callback: RenderCallback) -> AudioResult<()>;

    /// Begin invoking the callback
    fn start(&mut self) -> AudioResult<()>;

    /// Stop invoking the callback; the device stays open
    fn stop(&mut self);

    /// Stop and release the device and the callback
    fn close(&mut self);

    /// Whether `open` succeeded and `close` has not been called
    fn is_open(&self) -> bool;
}

/// Build the backend selected by `config`
///
/// `Auto` uses the device backend when compiled in and a host output device
/// exists, and falls back to the null backend otherwise.
pub fn default_backend(config: &AudioConfig) -> Box<dyn AudioBackend> {
    match config.backend {
        BackendKind::Null => Box::new(NullBackend::new()),
        #[cfg(feature = "cpal-backend")]
        BackendKind::Cpal => Box::new(super::cpal_backend::CpalBackend::new(config.clone())),
        #[cfg(feature = "cpal-backend")]
        BackendKind::Auto => {
            if config.device.is_some() || super::device::has_default_output_device() {
                Box::new(super::cpal_backend::CpalBackend::new(config.clone()))
            } else {
                log::warn!("default_backend: no output device found, using null backend");
                Box::new(NullBackend::new())
            }
        }
        #[cfg(not(feature = "cpal-backend"))]
        BackendKind::Cpal | BackendKind::Auto => {
            log::warn!("default_backend: built without cpal-backend, using null backend");
            Box::new(NullBackend::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_frames() {
        assert_eq!(StreamFormat::new(44100, 2).period_frames(), 441);
        assert_eq!(StreamFormat::new(48000, 1).period_frames(), 480);
        assert_eq!(StreamFormat::new(50, 1).period_frames(), 1);
    }

    #[test]
    fn test_headless_config_selects_null() {
        let backend = default_backend(&AudioConfig::headless());
        assert_eq!(backend.name(), "null");
        assert!(!backend.is_open());
    }
}
