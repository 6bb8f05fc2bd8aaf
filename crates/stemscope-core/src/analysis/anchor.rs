//! Grid anchor detection: audible start and kick-drum attacks
//!
//! Kick envelopes are the 180 Hz one-pole low-pass of the signal, rectified
//! and smoothed over a few milliseconds. Thresholds are `μ + kσ` of a
//! baseline taken from the start of the analysed segment.

use super::stats::mean_std;
use crate::dsp::onepole;

/// Time of the first RMS frame at or above `threshold_db`
///
/// Frames are `frame_secs` long every `hop_secs` (at least 16 / 8 samples).
/// Returns 0.0 when nothing crosses or the signal is shorter than a frame.
pub fn audio_start(
    samples: &[f64],
    sample_rate: u32,
    frame_secs: f64,
    hop_secs: f64,
    threshold_db: f64,
) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    let sr = sample_rate as f64;
    let frame = ((frame_secs * sr) as usize).max(16);
    let hop = ((hop_secs * sr) as usize).max(8);
    if samples.len() < frame {
        return 0.0;
    }
    let threshold = 10f64.powf(threshold_db / 20.0);
    (0..samples.len() - frame)
        .step_by(hop)
        .find(|&i| {
            let block = &samples[i..i + frame];
            let ms = block.iter().map(|x| x * x).sum::<f64>() / frame as f64;
            (ms + 1e-12).sqrt() >= threshold
        })
        .map_or(0.0, |i| i as f64 / sr)
}

/// Kick envelope extraction and thresholding parameters
#[derive(Debug, Clone, Copy)]
pub struct KickParams {
    pub lowpass_hz: f64,
    pub smooth_secs: f64,
    pub baseline_secs: f64,
    /// Threshold in baseline standard deviations
    pub sigma: f64,
    /// How long the envelope must stay above threshold
    pub sustain_secs: f64,
}

/// Rectified, smoothed low-band envelope of a segment
pub fn kick_envelope(
    segment: &[f64],
    sample_rate: u32,
    lowpass_hz: f64,
    smooth_secs: f64,
) -> Vec<f64> {
    let sr = sample_rate as f64;
    let lp = onepole::lowpass(segment, lowpass_hz, sr);
    let rectified: Vec<f64> = lp.iter().map(|x| x.abs()).collect();
    let win = ((smooth_secs * sr) as usize).max(1);
    onepole::moving_average(&rectified, win)
}

/// `μ + sigma·σ` over the first `baseline_len` envelope samples
fn baseline_threshold(env: &[f64], baseline_len: usize, sigma: f64) -> f64 {
    let n = baseline_len.min(env.len());
    let (mean, std) = mean_std(&env[..n]);
    mean + sigma * (std + 1e-12)
}

/// First index where `env` stays above `threshold` for `sustain` samples
fn first_sustained(env: &[f64], threshold: f64, sustain: usize) -> Option<usize> {
    let sustain = sustain.max(1);
    let limit = env.len().checked_sub(sustain)?;
    let mut run = 0usize;
    for (i, &v) in env.iter().enumerate() {
        if v > threshold {
            run += 1;
            let start = i + 1 - run;
            if run >= sustain && start < limit {
                return Some(start);
            }
        } else {
            run = 0;
        }
        if i + 1 - run >= limit {
            break;
        }
    }
    None
}

/// Attack of the kick ending at `approx_onset`
///
/// Scans the `lookback_secs` before the onset for the first sustained rise
/// above the baseline threshold, then the first plain crossing; falls back to
/// `approx_onset` when the segment is too short or nothing rises.
pub fn kick_attack(
    samples: &[f64],
    sample_rate: u32,
    approx_onset: f64,
    lookback_secs: f64,
    params: KickParams,
) -> f64 {
    if sample_rate == 0 || approx_onset < 0.0 {
        return approx_onset.max(0.0);
    }
    let sr = sample_rate as f64;
    let onset_i = ((approx_onset * sr) as usize).min(samples.len());
    let start = onset_i.saturating_sub((lookback_secs * sr) as usize);
    let segment = &samples[start..onset_i];
    if segment.len() < 32 {
        return approx_onset;
    }

    let env = kick_envelope(segment, sample_rate, params.lowpass_hz, params.smooth_secs);
    let baseline_len = ((params.baseline_secs * sr) as usize).max(16);
    let threshold = baseline_threshold(&env, baseline_len, params.sigma);
    let sustain = ((params.sustain_secs * sr) as usize)
        .max(1)
        .min(env.len().saturating_sub(1).max(1));

    let idx = first_sustained(&env, threshold, sustain)
        .or_else(|| env.iter().position(|&v| v > threshold));
    match idx {
        Some(i) => (start + i) as f64 / sr,
        None => approx_onset,
    }
}

/// First sustained kick within `search_secs` after `start_secs`
pub fn first_kick_after(
    samples: &[f64],
    sample_rate: u32,
    start_secs: f64,
    search_secs: f64,
    params: KickParams,
) -> Option<f64> {
    if sample_rate == 0 {
        return None;
    }
    let sr = sample_rate as f64;
    let start = ((start_secs.max(0.0) * sr) as usize).min(samples.len());
    let end = (start + (search_secs * sr) as usize).min(samples.len());
    let segment = &samples[start..end];
    if segment.len() < 64 {
        return None;
    }

    let env = kick_envelope(segment, sample_rate, params.lowpass_hz, params.smooth_secs);
    let baseline_len = ((params.baseline_secs * sr) as usize).max(16);
    let threshold = baseline_threshold(&env, baseline_len, params.sigma);
    let sustain = ((params.sustain_secs * sr) as usize).max(1);
    first_sustained(&env, threshold, sustain).map(|i| (start + i) as f64 / sr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const SR: u32 = 44100;

    fn params() -> KickParams {
        KickParams {
            lowpass_hz: 180.0,
            smooth_secs: 0.0025,
            baseline_secs: 0.08,
            sigma: 6.0,
            sustain_secs: 0.008,
        }
    }

    /// Silence with a 60 Hz kick thump at `at` seconds
    fn kick_at(at: f64, secs: f64) -> Vec<f64> {
        let mut out = vec![0.0; (secs * SR as f64) as usize];
        let start = (at * SR as f64) as usize;
        for i in 0..(0.15 * SR as f64) as usize {
            if let Some(s) = out.get_mut(start + i) {
                let t = i as f64 / SR as f64;
                *s = 0.9 * (2.0 * PI * 60.0 * t).sin() * (-t / 0.05).exp();
            }
        }
        out
    }

    #[test]
    fn test_audio_start() {
        let samples = kick_at(0.5, 1.0);
        let t = audio_start(&samples, SR, 0.02, 0.01, -45.0);
        assert!(t > 0.47 && t <= 0.5, "start {}", t);
    }

    #[test]
    fn test_audio_start_silence_and_short() {
        assert_eq!(audio_start(&vec![0.0; 44100], SR, 0.02, 0.01, -45.0), 0.0);
        assert_eq!(audio_start(&[0.5; 10], SR, 0.02, 0.01, -45.0), 0.0);
        assert_eq!(audio_start(&[0.5; 1000], 0, 0.02, 0.01, -45.0), 0.0);
    }

    #[test]
    fn test_kick_attack_before_onset() {
        let samples = kick_at(0.5, 1.0);
        // Onset reported a little late; the attack search looks back
        let t = kick_attack(&samples, SR, 0.53, 0.2, params());
        // The centred smoother leads the true start by half a window
        assert!((0.495..0.515).contains(&t), "attack {}", t);
    }

    #[test]
    fn test_kick_attack_fallbacks() {
        let silent = vec![0.0; 44100];
        assert_eq!(kick_attack(&silent, SR, 0.5, 0.2, params()), 0.5);
        // Segment shorter than 32 samples
        assert_eq!(kick_attack(&silent, SR, 0.0005, 0.2, params()), 0.0005);
    }

    #[test]
    fn test_first_kick_after() {
        let samples = kick_at(0.6, 1.5);
        let t = first_kick_after(&samples, SR, 0.3, 0.8, params()).unwrap();
        assert!((0.595..0.615).contains(&t), "kick {}", t);
        assert_eq!(first_kick_after(&samples, SR, 1.0, 0.8, params()), None);
        assert_eq!(first_kick_after(&samples, SR, 1.499, 0.8, params()), None);
    }

    #[test]
    fn test_first_sustained() {
        let env = [0.0, 2.0, 0.0, 2.0, 2.0, 2.0, 0.0, 0.0];
        assert_eq!(first_sustained(&env, 1.0, 3), Some(3));
        assert_eq!(first_sustained(&env, 1.0, 1), Some(1));
        assert_eq!(first_sustained(&env, 5.0, 1), None);
        assert_eq!(first_sustained(&[2.0; 3], 1.0, 3), None);
    }
}
