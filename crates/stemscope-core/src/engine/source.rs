//! Immutable PCM16 audio sources
//!
//! A source is shared between the loader, the control thread and the audio
//! thread. The sample buffer is an `Arc<[i16]>`, so cloning a source is a
//! refcount bump and the buffer outlives every render that references it.

use std::sync::Arc;

use crate::dsp::read_frame;
use crate::types::StereoFrame;

/// Named interleaved PCM16 buffer with its format
#[derive(Clone)]
pub struct AudioSource {
    name: Arc<str>,
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("name", &self.name)
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

impl AudioSource {
    pub fn new(
        name: impl Into<Arc<str>>,
        samples: impl Into<Arc<[i16]>>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            name: name.into(),
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Shared handle to the sample buffer
    pub fn shared_samples(&self) -> Arc<[i16]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_stereo(&self) -> bool {
        self.channels == 2
    }

    /// Number of whole frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Non-empty, positive rate, mono or stereo
    pub fn is_playable(&self) -> bool {
        self.frames() > 0 && self.sample_rate > 0 && (self.channels == 1 || self.channels == 2)
    }

    /// Whether both sources point at the same sample buffer
    pub fn same_buffer(&self, other: &AudioSource) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Interpolated frame at a position on an `output_rate` timeline
    #[inline]
    pub fn frame_at(&self, timeline_pos: f64, output_rate: u32) -> StereoFrame {
        read_frame(
            &self.samples,
            self.channels,
            self.sample_rate,
            timeline_pos,
            output_rate,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_geometry() {
        let src = AudioSource::new("mix", vec![0i16; 8820], 44100, 2);
        assert_eq!(src.frames(), 4410);
        assert!((src.duration_secs() - 0.1).abs() < 1e-12);
        assert!(src.is_playable());
        assert!(src.is_stereo());
        assert_eq!(src.name(), "mix");
    }

    #[test]
    fn test_unplayable_sources() {
        assert!(!AudioSource::new("empty", Vec::<i16>::new(), 44100, 1).is_playable());
        assert!(!AudioSource::new("rate", vec![1i16; 4], 0, 1).is_playable());
        assert!(!AudioSource::new("ch", vec![1i16; 6], 44100, 3).is_playable());
        assert_eq!(AudioSource::new("ch0", vec![1i16; 6], 44100, 0).frames(), 0);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let a = AudioSource::new("a", vec![1i16, 2, 3], 8000, 1);
        let b = a.clone();
        let c = AudioSource::new("a", vec![1i16, 2, 3], 8000, 1);
        assert!(a.same_buffer(&b));
        assert!(!a.same_buffer(&c));
    }
}
