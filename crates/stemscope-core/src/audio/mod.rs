//! Audio output backends
//!
//! The engine renders through a [`RenderCallback`] installed into an
//! [`AudioBackend`]:
//! - **CPAL** (feature `cpal-backend`, default): a real output device opened
//!   at the exact PCM16 format of the bound source
//! - **Null**: headless, for offline bounces and tests
//!
//! # Example Usage
//!
//! ```ignore
//! use stemscope_core::audio::{default_backend, AudioConfig};
//! use stemscope_core::engine::AudioEngine;
//!
//! let engine = AudioEngine::new(default_backend(&AudioConfig::default()));
//! ```

mod backend;
mod config;
mod device;
mod error;
mod null_backend;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

pub use backend::{default_backend, AudioBackend, RenderCallback, StreamFormat};
pub use config::{AudioConfig, BackendKind, BufferSize, DeviceId, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use device::{output_device_names, output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use null_backend::NullBackend;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalBackend;
