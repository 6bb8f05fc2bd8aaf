//! DSP primitives shared by the mixer and the analysis pipeline
//!
//! - [`biquad`]: cookbook shelving/peaking filters in transposed direct form II
//! - [`eq`]: the mixer's 3-band EQ with cached coefficients
//! - [`interp`]: linear-interpolating, rate-converting frame reads from PCM16
//! - [`onepole`]: one-pole low/high-pass used by envelope followers

pub mod biquad;
pub mod eq;
pub mod interp;
pub mod onepole;

pub use biquad::{BiquadCoeffs, BiquadState};
pub use eq::{EqBand, EqConfig, ThreeBandEq};
pub use interp::read_frame;

/// Gains below this magnitude (dB) are treated as flat
pub const GAIN_EPSILON_DB: f64 = 1e-6;

/// Convert a PCM16 sample to normalized float (-1.0..1.0)
#[inline]
pub fn pcm16_to_norm(s: i16) -> f64 {
    s as f64 / 32768.0
}

/// Convert a normalized float to PCM16, rounding to nearest
///
/// Non-finite input becomes silence; out-of-range input is clamped.
#[inline]
pub fn norm_to_pcm16(x: f64) -> i16 {
    let x = if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 };
    (x * 32767.0).round() as i16
}

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_conversion() {
        assert_eq!(norm_to_pcm16(0.0), 0);
        assert_eq!(norm_to_pcm16(1.0), 32767);
        assert_eq!(norm_to_pcm16(-1.0), -32767);
        assert_eq!(norm_to_pcm16(2.5), 32767);
        assert_eq!(norm_to_pcm16(f64::NAN), 0);
        assert_eq!(norm_to_pcm16(f64::INFINITY), 0);
        assert_eq!(pcm16_to_norm(-32768), -1.0);
        assert_eq!(pcm16_to_norm(16384), 0.5);
    }

    #[test]
    fn test_db_to_linear() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_linear(6.0) - 1.9953).abs() < 1e-3);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-12);
    }
}
