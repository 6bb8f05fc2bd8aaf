//! Audio engine - stem mixer, EQ and transport
//!
//! This module contains the real-time mixer:
//! - AudioSource: shared immutable PCM16 buffers
//! - MixConfiguration: routing, EQ and gain snapshot swapped in whole
//! - Renderer: the allocation-free callback the device thread runs
//! - AudioEngine: control-thread API tying everything together

mod engine;
mod error;
mod mix;
mod render;
mod source;

pub use engine::*;
pub use error::*;
pub use mix::*;
pub use render::Renderer;
pub use source::*;
