//! Engine control-path errors

use thiserror::Error;

use crate::audio::AudioError;

/// Why a control call was refused
///
/// A refused call has no side effects beyond those documented on the method
/// (a failed `initialize` leaves the engine fully reset).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Audio source is empty")]
    EmptySource,

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    InvalidChannels(u16),

    #[error("Invalid playback rate: {0}")]
    InvalidPlaybackRate(f64),

    #[error("Audio device error: {0}")]
    Audio(#[from] AudioError),
}

pub type EngineResult<T> = Result<T, EngineError>;
