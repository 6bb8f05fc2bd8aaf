//! Stemscope Core - stem mixer engine and tempo analysis

pub mod analysis;
pub mod audio;
pub mod audio_file;
pub mod bridge;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod types;

pub use types::*;
