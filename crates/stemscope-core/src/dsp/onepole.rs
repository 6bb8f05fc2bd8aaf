//! One-pole filters for analysis envelopes
//!
//! RC form: `a = dt / (rc + dt)` with `rc = 1 / (2π·fc)`, `y += a·(x - y)`.
//! Used offline only (kick envelopes, energy high-pass).

use std::f64::consts::PI;

/// Smoothing factor `a` for a one-pole filter at `cutoff_hz`
///
/// Returns 1.0 (no smoothing) for a non-positive cutoff or rate.
#[inline]
pub fn coefficient(cutoff_hz: f64, sample_rate: f64) -> f64 {
    if cutoff_hz <= 0.0 || sample_rate <= 0.0 {
        return 1.0;
    }
    let dt = 1.0 / sample_rate;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    dt / (rc + dt)
}

/// One-pole low-pass over a whole signal
pub fn lowpass(input: &[f64], cutoff_hz: f64, sample_rate: f64) -> Vec<f64> {
    let a = coefficient(cutoff_hz, sample_rate);
    let mut y = 0.0;
    input
        .iter()
        .map(|&x| {
            y += a * (x - y);
            y
        })
        .collect()
}

/// One-pole high-pass (input minus its low-passed copy)
pub fn highpass(input: &[f64], cutoff_hz: f64, sample_rate: f64) -> Vec<f64> {
    lowpass(input, cutoff_hz, sample_rate)
        .into_iter()
        .zip(input)
        .map(|(lp, &x)| x - lp)
        .collect()
}

/// Centered moving average of `len` samples, edges averaged over what exists
pub fn moving_average(input: &[f64], len: usize) -> Vec<f64> {
    let len = len.max(1);
    if len == 1 || input.is_empty() {
        return input.to_vec();
    }
    let mut prefix = Vec::with_capacity(input.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in input {
        acc += x;
        prefix.push(acc);
    }
    let half = len / 2;
    (0..input.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + len - half).min(input.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}
