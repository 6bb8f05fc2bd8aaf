//! Audio backend configuration
//!
//! Device selection and buffer settings. Sample rate and channel count are
//! never configured here: the device always runs at the bound source's format.

use serde::{Deserialize, Serialize};

/// Largest buffer the backend will request (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Smallest buffer the backend will request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Which backend [`default_backend`](super::default_backend) should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CPAL when compiled in and a host device exists, else null
    #[default]
    Auto,
    /// Always use the device backend (fails to open without one)
    Cpal,
    /// Headless: accept every format, never call back
    #[serde(rename = "headless")]
    Null,
}

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSize {
    /// About 10 ms at the stream's sample rate
    #[default]
    Default,
    /// Request a specific buffer size in frames
    Fixed(u32),
}

impl BufferSize {
    /// Resolve to a frame count for the given stream rate
    pub fn frames_for(&self, sample_rate: u32) -> u32 {
        match self {
            BufferSize::Default => (sample_rate / 100).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
        }
    }

    /// Calculate latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.frames_for(sample_rate) as f32 / sample_rate as f32 * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Backend selection
    pub backend: BackendKind,
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    /// Preferred buffer size
    pub buffer_size: BufferSize,
}

impl AudioConfig {
    /// Config that never touches a sound card
    pub fn headless() -> Self {
        Self {
            backend: BackendKind::Null,
            ..Default::default()
        }
    }

    /// Builder: select an output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Builder: set the buffer size
    pub fn with_buffer_size(mut self, buffer_size: BufferSize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}
