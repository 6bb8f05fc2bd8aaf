//! Three-band EQ used on the mixer output
//!
//! Low shelf → mid peak → high shelf, cascaded per channel. Coefficients are
//! cached against (sample rate, low, mid, high) and rebuilt only when one of
//! them moves, outside the per-sample loop.

use serde::{Deserialize, Serialize};

use super::biquad::{BiquadCoeffs, BiquadState};
use super::GAIN_EPSILON_DB;
use crate::types::StereoFrame;

/// Tolerance used when deciding whether cached coefficients are stale
const CACHE_TOLERANCE: f64 = 1e-9;

/// EQ band selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqBand {
    Low = 0,
    Mid = 1,
    High = 2,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];

    pub fn name(&self) -> &'static str {
        match self {
            EqBand::Low => "low",
            EqBand::Mid => "mid",
            EqBand::High => "high",
        }
    }
}

/// Band placement for the 3-band EQ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    /// Low shelf corner frequency (Hz)
    pub low_freq_hz: f64,
    /// Low shelf slope (S)
    pub low_slope: f64,
    /// Mid peak center frequency (Hz)
    pub mid_freq_hz: f64,
    /// Mid peak Q
    pub mid_q: f64,
    /// High shelf corner frequency (Hz)
    pub high_freq_hz: f64,
    /// High shelf slope (S)
    pub high_slope: f64,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            low_freq_hz: 220.0,
            low_slope: 0.9,
            mid_freq_hz: 1000.0,
            mid_q: 0.75,
            high_freq_hz: 4200.0,
            high_slope: 0.9,
        }
    }
}

/// Gains the cached coefficients were built for
#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    sample_rate: u32,
    gains_db: [f64; 3],
}

impl CacheKey {
    fn matches(&self, sample_rate: u32, gains_db: [f64; 3]) -> bool {
        self.sample_rate == sample_rate
            && self
                .gains_db
                .iter()
                .zip(gains_db.iter())
                .all(|(a, b)| (a - b).abs() <= CACHE_TOLERANCE)
    }
}

/// Cascaded low/mid/high biquads with per-channel state
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    config: EqConfig,
    coeffs: [BiquadCoeffs; 3],
    /// `states[band][channel]`
    states: [[BiquadState; 2]; 3],
    cache: Option<CacheKey>,
}

impl Default for ThreeBandEq {
    fn default() -> Self {
        Self::new(EqConfig::default())
    }
}

impl ThreeBandEq {
    pub fn new(config: EqConfig) -> Self {
        Self {
            config,
            coeffs: [BiquadCoeffs::passthrough(); 3],
            states: [[BiquadState::default(); 2]; 3],
            cache: None,
        }
    }

    /// Whether any of the three gains is far enough from 0 dB to matter
    #[inline]
    pub fn is_active(low_db: f64, mid_db: f64, high_db: f64) -> bool {
        low_db.abs() > GAIN_EPSILON_DB
            || mid_db.abs() > GAIN_EPSILON_DB
            || high_db.abs() > GAIN_EPSILON_DB
    }

    /// Band placement currently in use
    pub fn config(&self) -> &EqConfig {
        &self.config
    }

    /// Make sure coefficients match the given rate and gains
    ///
    /// Returns true when a rebuild happened. A sample-rate change also clears
    /// filter memory.
    pub fn prepare(&mut self, sample_rate: u32, low_db: f64, mid_db: f64, high_db: f64) -> bool {
        let gains_db = [low_db, mid_db, high_db];
        if let Some(key) = &self.cache {
            if key.matches(sample_rate, gains_db) {
                return false;
            }
            if key.sample_rate != sample_rate {
                self.reset();
            }
        }

        let fs = sample_rate.max(1) as f64;
        let cfg = &self.config;
        self.coeffs = [
            BiquadCoeffs::low_shelf(cfg.low_freq_hz, cfg.low_slope, low_db, fs),
            BiquadCoeffs::peaking(cfg.mid_freq_hz, cfg.mid_q, mid_db, fs),
            BiquadCoeffs::high_shelf(cfg.high_freq_hz, cfg.high_slope, high_db, fs),
        ];
        self.cache = Some(CacheKey { sample_rate, gains_db });
        true
    }

    /// Force the next [`prepare`](Self::prepare) to rebuild
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Clear all filter memory (seek, source swap)
    pub fn reset(&mut self) {
        for band in self.states.iter_mut() {
            for state in band.iter_mut() {
                state.reset();
            }
        }
    }

    /// Filter one stereo frame through low → mid → high
    #[inline]
    pub fn process(&mut self, frame: StereoFrame) -> StereoFrame {
        let mut l = frame.left;
        let mut r = frame.right;
        for (coeffs, state) in self.coeffs.iter().zip(self.states.iter_mut()) {
            l = state[0].process(l, coeffs);
            r = state[1].process(r, coeffs);
        }
        StereoFrame::new(l, r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_defaults() {
        let cfg = EqConfig::default();
        assert_eq!(cfg.low_freq_hz, 220.0);
        assert_eq!(cfg.mid_q, 0.75);
        assert_eq!(cfg.high_freq_hz, 4200.0);
    }

    #[test]
    fn test_is_active_threshold() {
        assert!(!ThreeBandEq::is_active(0.0, 0.0, 0.0));
        assert!(!ThreeBandEq::is_active(1e-7, -1e-7, 0.0));
        assert!(ThreeBandEq::is_active(0.0, 0.5, 0.0));
        assert!(ThreeBandEq::is_active(0.0, 0.0, -3.0));
    }

    #[test]
    fn test_coefficient_cache() {
        let mut eq = ThreeBandEq::default();
        assert!(eq.prepare(44100, 3.0, 0.0, -2.0));
        assert!(!eq.prepare(44100, 3.0, 0.0, -2.0));
        assert!(!eq.prepare(44100, 3.0 + 1e-12, 0.0, -2.0));
        assert!(eq.prepare(44100, 3.5, 0.0, -2.0));
        assert!(eq.prepare(48000, 3.5, 0.0, -2.0));
        eq.invalidate();
        assert!(eq.prepare(48000, 3.5, 0.0, -2.0));
    }

    #[test]
    fn test_sample_rate_change_resets_state() {
        let mut eq = ThreeBandEq::default();
        eq.prepare(44100, 6.0, 0.0, 0.0);
        eq.process(StereoFrame::new(0.8, -0.8));
        assert_ne!(eq.states[0][0], BiquadState::default());

        // Same rate, different gain: memory survives
        eq.prepare(44100, 5.0, 0.0, 0.0);
        assert_ne!(eq.states[0][0], BiquadState::default());

        eq.prepare(48000, 5.0, 0.0, 0.0);
        assert_eq!(eq.states[0][0], BiquadState::default());
    }

    #[test]
    fn test_flat_eq_is_identity() {
        let mut eq = ThreeBandEq::default();
        eq.prepare(44100, 0.0, 0.0, 0.0);
        for i in 0..500 {
            let x = ((i * 37) % 200) as f64 / 100.0 - 1.0;
            let y = eq.process(StereoFrame::new(x, -x));
            assert!((y.left - x).abs() < 1e-9);
            assert!((y.right + x).abs() < 1e-9);
        }
    }
}
