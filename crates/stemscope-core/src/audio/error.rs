//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening or driving an output device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to query device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Device cannot run at the exact format the source needs
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// start/stop called before open
    #[error("Audio backend is not open")]
    NotOpen,
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
