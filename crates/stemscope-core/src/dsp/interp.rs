//! Fractional frame reads from interleaved PCM16
//!
//! The mixer timeline runs at the device rate. A source recorded at another
//! rate is read at `timeline_pos * source_rate / output_rate` and linearly
//! interpolated between the two surrounding frames.

use super::pcm16_to_norm;
use crate::types::StereoFrame;

/// Read one stereo frame at a fractional timeline position
///
/// `samples` is interleaved with `channels` (1 or 2) per frame. Positions
/// before the start, at or past the end, or non-finite return silence, as
/// does an empty buffer or a zero rate. The right-hand neighbour is clamped
/// to the last frame, so the tail never extrapolates.
#[inline]
pub fn read_frame(
    samples: &[i16],
    channels: u16,
    source_rate: u32,
    timeline_pos: f64,
    output_rate: u32,
) -> StereoFrame {
    let ch = channels as usize;
    if ch == 0 || ch > 2 || source_rate == 0 || output_rate == 0 || !timeline_pos.is_finite() {
        return StereoFrame::silence();
    }
    let frames = samples.len() / ch;
    if frames == 0 || timeline_pos < 0.0 {
        return StereoFrame::silence();
    }

    let pos = if source_rate == output_rate {
        timeline_pos
    } else {
        timeline_pos * source_rate as f64 / output_rate as f64
    };

    let base = pos.floor();
    if base >= frames as f64 {
        return StereoFrame::silence();
    }
    let i0 = base as usize;
    let i1 = (i0 + 1).min(frames - 1);
    let frac = pos - base;

    let a = frame_at(samples, ch, i0);
    if frac <= 0.0 || i1 == i0 {
        return a;
    }
    let b = frame_at(samples, ch, i1);
    StereoFrame::new(
        a.left + (b.left - a.left) * frac,
        a.right + (b.right - a.right) * frac,
    )
}

#[inline]
fn frame_at(samples: &[i16], ch: usize, index: usize) -> StereoFrame {
    let i = index * ch;
    if ch == 1 {
        StereoFrame::mono(pcm16_to_norm(samples[i]))
    } else {
        StereoFrame::new(pcm16_to_norm(samples[i]), pcm16_to_norm(samples[i + 1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_positions_are_exact() {
        let s = [0i16, 0, 16384, -16384, 8192, 8192];
        let f = read_frame(&s, 2, 44100, 1.0, 44100);
        assert_eq!(f, StereoFrame::new(0.5, -0.5));
    }

    #[test]
    fn test_linear_interpolation() {
        let s = [0i16, 16384];
        let f = read_frame(&s, 1, 44100, 0.5, 44100);
        assert!((f.left - 0.25).abs() < 1e-12);
        assert_eq!(f.left, f.right);
    }

    #[test]
    fn test_last_frame_does_not_extrapolate() {
        let s = [0i16, 16384];
        let f = read_frame(&s, 1, 44100, 1.75, 44100);
        assert_eq!(f.left, 0.5);
    }

    #[test]
    fn test_out_of_range_is_silent() {
        let s = [1000i16, 1000, 2000, 2000];
        assert_eq!(read_frame(&s, 2, 44100, 2.0, 44100), StereoFrame::silence());
        assert_eq!(read_frame(&s, 2, 44100, -0.1, 44100), StereoFrame::silence());
        assert_eq!(read_frame(&s, 2, 44100, f64::NAN, 44100), StereoFrame::silence());
        assert_eq!(read_frame(&[], 2, 44100, 0.0, 44100), StereoFrame::silence());
        assert_eq!(read_frame(&s, 2, 0, 0.0, 44100), StereoFrame::silence());
        assert_eq!(read_frame(&s, 3, 44100, 0.0, 44100), StereoFrame::silence());
    }

    #[test]
    fn test_rate_conversion_scales_position() {
        // 22050 Hz source on a 44100 Hz timeline: timeline frame 2 reads source frame 1
        let s = [0i16, 8192, 16384];
        let f = read_frame(&s, 1, 22050, 2.0, 44100);
        assert_eq!(f.left, 0.25);
        let f = read_frame(&s, 1, 22050, 1.0, 44100);
        assert!((f.left - 0.125).abs() < 1e-12);
    }
}
