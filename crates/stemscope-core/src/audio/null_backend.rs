//! Headless backend
//!
//! Accepts any format and holds the callback without ever calling it. Used
//! for offline bounces and tests, which drive the engine's renderer directly.

use super::backend::{AudioBackend, RenderCallback, StreamFormat};
use super::error::{AudioError, AudioResult};

#[derive(Default)]
pub struct NullBackend {
    format: Option<StreamFormat>,
    callback: Option<RenderCallback>,
    running: bool,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format passed to the last successful `open`
    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&mut self, format: StreamFormat, callback: RenderCallback) -> AudioResult<()> {
        log::debug!(
            "NullBackend::open: {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );
        self.format = Some(format);
        self.callback = Some(callback);
        self.running = false;
        Ok(())
    }

    fn start(&mut self) -> AudioResult<()> {
        if self.callback.is_none() {
            return Err(AudioError::NotOpen);
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn close(&mut self) {
        self.running = false;
        self.callback = None;
        self.format = None;
    }

    fn is_open(&self) -> bool {
        self.callback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut backend = NullBackend::new();
        assert!(matches!(backend.start(), Err(AudioError::NotOpen)));

        backend
            .open(StreamFormat::new(22050, 1), Box::new(|_buf: &mut [i16]| {}))
            .unwrap();
        assert!(backend.is_open());
        assert_eq!(backend.format(), Some(StreamFormat::new(22050, 1)));

        backend.start().unwrap();
        assert!(backend.is_running());
        backend.stop();
        assert!(!backend.is_running());

        backend.close();
        assert!(!backend.is_open());
        assert_eq!(backend.format(), None);
    }
}
