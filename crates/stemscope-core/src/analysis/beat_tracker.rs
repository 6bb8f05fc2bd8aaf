//! Dynamic-programming beat tracker over an onset envelope
//!
//! ```text
//! onset envelope ──► autocorrelation × log-normal prior ──► period P
//!        │                                                      │
//!        └──► Gaussian local score ──► DP (spacing cost ~ ln²(Δ/P)) ──► beats
//! ```
//!
//! Produces two tempo candidates: the period tempo itself and the tempo
//! implied by the median inter-beat interval of the tracked beats.

use super::onset::OnsetEnvelope;
use super::stats::{autocorrelation, mean_std, median};

/// Envelopes shorter than this carry no usable periodicity
const MIN_FRAMES: usize = 8;

/// Tracked tempo and beat positions
#[derive(Debug, Clone, Default)]
pub struct TrackedBeats {
    /// Tempo of the autocorrelation period
    pub bpm: f64,
    /// Beat times in seconds
    pub beats: Vec<f64>,
}

impl TrackedBeats {
    /// `60 / median(IBI)`; 0 with fewer than two beats
    pub fn ibi_bpm(&self) -> f64 {
        let ibis: Vec<f64> = self
            .beats
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| *d > 0.0)
            .collect();
        match median(&ibis) {
            Some(m) if m > 0.0 => 60.0 / m,
            _ => 0.0,
        }
    }
}

/// Beat tracker parameters
#[derive(Debug, Clone, Copy)]
pub struct TrackerParams {
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Centre of the log-normal tempo prior (one octave deviation)
    pub prior_bpm: f64,
    pub tightness: f64,
}

/// Estimate the period and track beats
pub fn track_beats(env: &OnsetEnvelope, params: TrackerParams) -> TrackedBeats {
    if env.len() < MIN_FRAMES || env.fps <= 0.0 {
        return TrackedBeats::default();
    }
    let (_, std) = mean_std(&env.values);
    if std <= 0.0 {
        return TrackedBeats::default();
    }
    let norm: Vec<f64> = env.values.iter().map(|v| v / std).collect();

    let Some(period) = estimate_period(&norm, env.fps, params) else {
        return TrackedBeats::default();
    };
    let bpm = 60.0 * env.fps / period;
    let frames = dp_beats(&norm, period, params.tightness);
    log::debug!(
        "track_beats: period {:.2} frames ({:.2} BPM), {} beats",
        period,
        bpm,
        frames.len()
    );

    TrackedBeats {
        bpm,
        beats: frames.into_iter().map(|f| env.frame_time(f)).collect(),
    }
}

/// Beat period in (fractional) frames
fn estimate_period(norm: &[f64], fps: f64, params: TrackerParams) -> Option<f64> {
    let lag_lo = ((60.0 * fps / params.max_bpm).floor() as usize).max(1);
    let lag_hi = (60.0 * fps / params.min_bpm).ceil() as usize;
    let centred: Vec<f64> = {
        let (mean, _) = mean_std(norm);
        norm.iter().map(|v| v - mean).collect()
    };
    let ac = autocorrelation(&centred, lag_hi + 1);
    if lag_lo >= ac.len() {
        return None;
    }

    let prior = |lag: f64| {
        let bpm = 60.0 * fps / lag;
        (-0.5 * (bpm / params.prior_bpm).log2().powi(2)).exp()
    };
    let weighted = |lag: usize| ac[lag] * prior(lag as f64);

    let hi = lag_hi.min(ac.len() - 1);
    let best = (lag_lo..=hi).max_by(|&a, &b| weighted(a).total_cmp(&weighted(b)))?;
    if weighted(best) <= 0.0 {
        return None;
    }

    // Parabolic interpolation around the peak
    if best > lag_lo && best < hi {
        let (y0, y1, y2) = (weighted(best - 1), weighted(best), weighted(best + 1));
        let denom = y0 - 2.0 * y1 + y2;
        if denom.abs() > 1e-12 {
            let shift = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
            return Some(best as f64 + shift);
        }
    }
    Some(best as f64)
}

/// Dynamic-programming beat placement; returns beat frame indices
fn dp_beats(norm: &[f64], period: f64, tightness: f64) -> Vec<usize> {
    let n = norm.len();
    let local = local_score(norm, period);

    let max_back = (2.0 * period).round() as usize;
    let min_back = ((period / 2.0).round() as usize).max(1);

    let mut cumulative = vec![0.0; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;
        if i >= min_back {
            let lo = i.saturating_sub(max_back);
            for j in lo..=(i - min_back) {
                let gap = (i - j) as f64;
                let cost = -tightness * (gap / period).ln().powi(2);
                let score = cumulative[j] + cost;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((j, score));
                }
            }
        }
        match best {
            Some((j, score)) if score > 0.0 => {
                cumulative[i] = local[i] + score;
                backlink[i] = Some(j);
            }
            _ => cumulative[i] = local[i],
        }
    }

    // Last strong local maximum of the cumulative score
    let maxima: Vec<usize> = (1..n.saturating_sub(1))
        .filter(|&i| cumulative[i] > cumulative[i - 1] && cumulative[i] >= cumulative[i + 1])
        .collect();
    let values: Vec<f64> = maxima.iter().map(|&i| cumulative[i]).collect();
    let Some(med) = median(&values) else {
        return Vec::new();
    };
    let Some(&last) = maxima.iter().rev().find(|&&i| cumulative[i] >= 0.5 * med) else {
        return Vec::new();
    };

    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();
    beats
}

/// Onset strength smoothed by a Gaussian a beat wide
fn local_score(norm: &[f64], period: f64) -> Vec<f64> {
    let half = period.round().max(1.0) as isize;
    let kernel: Vec<f64> = (-half..=half)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period).powi(2)).exp())
        .collect();
    let n = norm.len() as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(ki, w)| {
                    let idx = i + ki as isize - half;
                    (0..n).contains(&idx).then(|| w * norm[idx as usize])
                })
                .sum()
        })
        .collect()
}
