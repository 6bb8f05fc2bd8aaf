//! Biquad filter primitive (RBJ audio-EQ cookbook)
//!
//! Coefficients are normalized by `a0` when they are built, so the runtime
//! filter only ever sees `b0, b1, b2, a1, a2`:
//!
//! ```text
//! y   = b0*x + z1
//! z1' = b1*x - a1*y + z2
//! z2' = b2*x - a2*y
//! ```

use std::f64::consts::PI;

/// Lowest allowed center/corner frequency
const MIN_FREQ_HZ: f64 = 10.0;
/// Highest allowed center/corner frequency as a fraction of the sample rate
const MAX_FREQ_RATIO: f64 = 0.45;
/// Lower bound for shelf slope and peak Q
const MIN_SLOPE_Q: f64 = 0.1;

/// Biquad filter state for one channel of one band
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    pub z1: f64,
    pub z2: f64,
}

impl BiquadState {
    /// Run one sample through the filter
    #[inline]
    pub fn process(&mut self, x: f64, coeffs: &BiquadCoeffs) -> f64 {
        let y = coeffs.b0 * x + self.z1;
        self.z1 = coeffs.b1 * x - coeffs.a1 * y + self.z2;
        self.z2 = coeffs.b2 * x - coeffs.a2 * y;
        y
    }

    /// Clear filter memory
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Normalized biquad filter coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl BiquadCoeffs {
    /// Divide the raw cookbook coefficients through by `a0`
    pub fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        let inv_a0 = if a0.abs() > 1e-18 { 1.0 / a0 } else { 1.0 };
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }

    /// Passthrough (unity gain, no filtering)
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    /// Create low shelf filter coefficients
    /// gain_db: boost/cut in dB, freq: shelf frequency, slope: shelf slope (S)
    pub fn low_shelf(freq: f64, slope: f64, gain_db: f64, sample_rate: f64) -> Self {
        let (a, cos_w0, alpha) = shelf_terms(freq, slope, gain_db, sample_rate);
        let t = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w0 + t),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
            a * ((a + 1.0) - (a - 1.0) * cos_w0 - t),
            (a + 1.0) + (a - 1.0) * cos_w0 + t,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
            (a + 1.0) + (a - 1.0) * cos_w0 - t,
        )
    }

    /// Create peaking EQ filter coefficients
    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = omega(freq, sample_rate);
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q.max(MIN_SLOPE_Q));

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// Create high shelf filter coefficients
    pub fn high_shelf(freq: f64, slope: f64, gain_db: f64, sample_rate: f64) -> Self {
        let (a, cos_w0, alpha) = shelf_terms(freq, slope, gain_db, sample_rate);
        let t = 2.0 * a.sqrt() * alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w0 + t),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
            a * ((a + 1.0) + (a - 1.0) * cos_w0 - t),
            (a + 1.0) - (a - 1.0) * cos_w0 + t,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
            (a + 1.0) - (a - 1.0) * cos_w0 - t,
        )
    }
}

/// Angular frequency with the corner clamped into the usable band
#[inline]
fn omega(freq: f64, sample_rate: f64) -> f64 {
    let freq = freq.max(MIN_FREQ_HZ).min(sample_rate * MAX_FREQ_RATIO);
    2.0 * PI * freq / sample_rate
}

/// Shared shelf terms: (A, cos(w0), alpha)
#[inline]
fn shelf_terms(freq: f64, slope: f64, gain_db: f64, sample_rate: f64) -> (f64, f64, f64) {
    let a = 10.0_f64.powf(gain_db / 40.0);
    let w0 = omega(freq, sample_rate);
    let slope = slope.max(MIN_SLOPE_Q);
    let alpha = w0.sin() * 0.5 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt();
    (a, w0.cos(), alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(len: usize) -> Vec<f64> {
        // Deterministic LCG noise in [-1, 1)
        let mut seed: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 8) as f64 / (1u32 << 23) as f64 - 1.0
            })
            .collect()
    }

    fn run(coeffs: &BiquadCoeffs, input: &[f64]) -> Vec<f64> {
        let mut state = BiquadState::default();
        input.iter().map(|&x| state.process(x, coeffs)).collect()
    }

    #[test]
    fn test_unity_at_zero_db() {
        let input = noise(2048);
        let sr = 44100.0;
        let filters = [
            BiquadCoeffs::low_shelf(220.0, 0.9, 0.0, sr),
            BiquadCoeffs::peaking(1000.0, 0.75, 0.0, sr),
            BiquadCoeffs::high_shelf(4200.0, 0.9, 0.0, sr),
        ];
        for coeffs in &filters {
            let output = run(coeffs, &input);
            for (x, y) in input.iter().zip(output.iter()) {
                assert!((x - y).abs() < 1e-9, "0 dB filter must be identity");
            }
        }
    }

    #[test]
    fn test_low_shelf_dc_gain() {
        // A +6 dB low shelf should boost DC by ~6 dB
        let coeffs = BiquadCoeffs::low_shelf(220.0, 0.9, 6.0, 48000.0);
        let output = run(&coeffs, &vec![0.25; 20000]);
        let expected = 0.25 * 10.0_f64.powf(6.0 / 20.0);
        assert!((output[19999] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_high_shelf_leaves_dc() {
        let coeffs = BiquadCoeffs::high_shelf(4200.0, 0.9, -12.0, 48000.0);
        let output = run(&coeffs, &vec![0.5; 20000]);
        assert!((output[19999] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_peaking_cut_attenuates_center() {
        let sr = 44100.0;
        let coeffs = BiquadCoeffs::peaking(1000.0, 0.75, -12.0, sr);
        let input: Vec<f64> = (0..8820)
            .map(|i| (2.0 * PI * 1000.0 * i as f64 / sr).sin())
            .collect();
        let output = run(&coeffs, &input);
        let peak = output[4410..].iter().fold(0.0_f64, |m, y| m.max(y.abs()));
        let expected = 10.0_f64.powf(-12.0 / 20.0);
        assert!((peak - expected).abs() < 0.02, "peak {} expected {}", peak, expected);
    }

    #[test]
    fn test_degenerate_a0_is_not_divided() {
        let c = BiquadCoeffs::normalized(2.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(c.b0, 2.0);
    }

    #[test]
    fn test_state_reset() {
        let coeffs = BiquadCoeffs::low_shelf(220.0, 0.9, 9.0, 44100.0);
        let mut state = BiquadState::default();
        state.process(1.0, &coeffs);
        assert_ne!(state, BiquadState::default());
        state.reset();
        assert_eq!(state, BiquadState::default());
    }
}
