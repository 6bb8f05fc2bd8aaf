//! Autocorrelation tempo stages
//!
//! The energy candidate looks at broadband level changes above the kick
//! fundamental; the local refinement rescans the onset envelope on a fine
//! BPM grid around the clustered seed.

use super::fold::fold_bpm;
use super::onset::OnsetEnvelope;
use super::stats::{autocorrelation, grid, zscore};
use crate::dsp::onepole;

/// Tempo from the autocorrelation of a high-passed energy envelope
///
/// Searches lags for `min_bpm..=max_bpm`; returns 0.0 when the signal is too
/// short or carries no periodic energy.
#[allow(clippy::too_many_arguments)]
pub fn energy_tempo(
    samples: &[f64],
    sample_rate: u32,
    highpass_hz: f64,
    window: usize,
    hop: usize,
    min_bpm: f64,
    max_bpm: f64,
) -> f64 {
    let env = energy_envelope(samples, sample_rate, highpass_hz, window, hop);
    if env.len() < 8 {
        return 0.0;
    }
    let lag_lo = ((60.0 * env.fps / max_bpm).floor() as usize).max(1);
    let lag_hi = (60.0 * env.fps / min_bpm).ceil() as usize;
    let ac = autocorrelation(&env.values, lag_hi);
    let hi = lag_hi.min(ac.len().saturating_sub(1));
    if lag_lo > hi {
        return 0.0;
    }
    let best = (lag_lo..=hi).max_by(|&a, &b| ac[a].total_cmp(&ac[b]));
    match best {
        Some(lag) if ac[lag] > 0.0 => 60.0 * env.fps / lag as f64,
        _ => 0.0,
    }
}

/// Positive first difference of frame RMS after a one-pole high-pass, z-scored
pub fn energy_envelope(
    samples: &[f64],
    sample_rate: u32,
    highpass_hz: f64,
    window: usize,
    hop: usize,
) -> OnsetEnvelope {
    if sample_rate == 0 || window == 0 || hop == 0 || samples.len() < window {
        return OnsetEnvelope::default();
    }
    let hp = onepole::highpass(samples, highpass_hz, sample_rate as f64);
    let rms: Vec<f64> = (0..=(hp.len() - window) / hop)
        .map(|k| {
            let frame = &hp[k * hop..k * hop + window];
            (frame.iter().map(|x| x * x).sum::<f64>() / window as f64).sqrt()
        })
        .collect();
    let diff: Vec<f64> = std::iter::once(0.0)
        .chain(rms.windows(2).map(|w| (w[1] - w[0]).max(0.0)))
        .collect();
    OnsetEnvelope {
        values: zscore(&diff),
        fps: sample_rate as f64 / hop as f64,
    }
}

/// Fine search parameters for [`refine_bpm_local`]
#[derive(Debug, Clone, Copy)]
pub struct RefineParams {
    /// Half-width of the search around each centre (BPM)
    pub span: f64,
    pub step: f64,
    pub fold_lo: f64,
    pub fold_hi: f64,
    /// Box width applied to the autocorrelation before scoring
    pub smooth_ac: usize,
}

/// Refine a seed tempo against the onset envelope's autocorrelation
///
/// Searches `seed`, `seed/2` and `2·seed` (each folded) ± `span`; the score of
/// a candidate is the autocorrelation at its implied lag, linearly
/// interpolated between integer lags. Only a strictly better score replaces
/// the current best. The result is folded.
pub fn refine_bpm_local(env: &OnsetEnvelope, seed: f64, params: RefineParams) -> f64 {
    let RefineParams {
        span,
        step,
        fold_lo,
        fold_hi,
        smooth_ac,
    } = params;
    if seed <= 0.0 || !seed.is_finite() {
        return 0.0;
    }
    if env.len() < 8 || env.fps <= 0.0 {
        return seed;
    }

    let slowest = (fold_lo - span).max(1.0);
    let max_lag = (60.0 * env.fps / slowest).ceil() as usize + 2;
    let mut ac = autocorrelation(&zscore(&env.values), max_lag);
    ac[0] = 0.0;
    let ac = smooth_autocorrelation(&ac, smooth_ac);

    let mut best_bpm = seed;
    let mut best_score = f64::NEG_INFINITY;
    for centre in [seed, seed * 0.5, seed * 2.0] {
        let centre = fold_bpm(centre, fold_lo, fold_hi);
        if centre <= 0.0 {
            continue;
        }
        for bpm in grid(centre - span, centre + span, step) {
            if bpm <= 0.0 {
                continue;
            }
            let lag = 60.0 * env.fps / bpm;
            let nearest = lag.round();
            if nearest < 1.0 || nearest as usize >= ac.len() {
                continue;
            }
            let score = interpolate(&ac, lag);
            if score > best_score {
                best_score = score;
                best_bpm = bpm;
            }
        }
    }
    log::debug!(
        "refine_bpm_local: seed {:.2} -> {:.2} (score {:.3})",
        seed,
        best_bpm,
        best_score
    );
    fold_bpm(best_bpm, fold_lo, fold_hi)
}

/// Centred box smoothing; even widths are widened to the next odd one
fn smooth_autocorrelation(ac: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 {
        return ac.to_vec();
    }
    onepole::moving_average(ac, width | 1)
}

/// Linear interpolation of `values` at a fractional index
fn interpolate(values: &[f64], pos: f64) -> f64 {
    let lo = pos.floor().max(0.0) as usize;
    let Some(&a) = values.get(lo) else {
        return f64::NEG_INFINITY;
    };
    match values.get(lo + 1) {
        Some(&b) => a + (b - a) * (pos - lo as f64),
        None => a,
    }
}
