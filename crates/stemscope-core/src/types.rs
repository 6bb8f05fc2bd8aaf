//! Common types for Stemscope
//!
//! Stem identifiers and the stereo frame type used by the mixer's
//! per-frame processing.

/// Number of stems produced by the separator (Vocals, Drums, Bass, Other)
pub const NUM_STEMS: usize = 4;

/// Sample rate assumed when nothing else is known (CD audio)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Stem identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Stem {
    Vocals = 0,
    Drums = 1,
    Bass = 2,
    Other = 3,
}

impl Stem {
    /// Get all stems in order
    pub const ALL: [Stem; NUM_STEMS] = [Stem::Vocals, Stem::Drums, Stem::Bass, Stem::Other];

    /// Convert from index (0-3) to Stem
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Stem::Vocals),
            1 => Some(Stem::Drums),
            2 => Some(Stem::Bass),
            3 => Some(Stem::Other),
            _ => None,
        }
    }

    /// Index into per-stem arrays
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the name of this stem
    pub fn name(&self) -> &'static str {
        match self {
            Stem::Vocals => "Vocals",
            Stem::Drums => "Drums",
            Stem::Bass => "Bass",
            Stem::Other => "Other",
        }
    }

    /// File stem used by the separator's output (`vocals.wav`, ...)
    pub fn file_stem(&self) -> &'static str {
        match self {
            Stem::Vocals => "vocals",
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Other => "other",
        }
    }
}

/// A single stereo frame in normalized float scale
///
/// The mixer works in f64 between the PCM16 read and the PCM16 write so
/// that the cascaded biquads do not accumulate f32 rounding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f64,
    pub right: f64,
}

impl StereoFrame {
    /// Create a new stereo frame
    #[inline]
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo frame
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono frame (same value in both channels)
    #[inline]
    pub fn mono(value: f64) -> Self {
        Self { left: value, right: value }
    }

    /// Average of both channels
    #[inline]
    pub fn mid(&self) -> f64 {
        0.5 * (self.left + self.right)
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> f64 {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoFrame {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoFrame {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<f64> for StereoFrame {
    type Output = Self;

    #[inline]
    fn mul(self, factor: f64) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<f64> for StereoFrame {
    #[inline]
    fn mul_assign(&mut self, factor: f64) {
        self.left *= factor;
        self.right *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_index_roundtrip() {
        for stem in Stem::ALL {
            assert_eq!(Stem::from_index(stem.index()), Some(stem));
        }
        assert_eq!(Stem::from_index(4), None);
    }

    #[test]
    fn test_stereo_frame_ops() {
        let mut a = StereoFrame::new(0.25, -0.5);
        a += StereoFrame::mono(0.25);
        assert_eq!(a, StereoFrame::new(0.5, -0.25));
        assert_eq!((a * 2.0).left, 1.0);
        assert_eq!(a.peak(), 0.5);
        assert_eq!(StereoFrame::new(1.0, 0.0).mid(), 0.5);
    }
}
