//! Tempo drift correction
//!
//! A grid that is a hair too fast or slow shows up as kick residuals that
//! grow along the track. The track is sampled in a handful of windows, kicks
//! are detected once per window, and every candidate tempo around the seed
//! is scored by how small and how flat its residuals are:
//!
//! ```text
//! loss(bpm) = median(|r|) + λ · |slope(median r per window vs window centre)|
//! ```

use rayon::prelude::*;

use super::anchor::kick_envelope;
use super::stats::{grid, linear_slope, mean_std, median};

/// Kick picking parameters for drift windows
#[derive(Debug, Clone, Copy)]
pub struct DriftKickParams {
    pub lowpass_hz: f64,
    pub smooth_secs: f64,
    pub baseline_secs: f64,
    pub sigma: f64,
    pub min_separation_secs: f64,
    pub lookback_secs: f64,
}

/// Search parameters for [`refine_bpm_by_drift`]
#[derive(Debug, Clone, Copy)]
pub struct DriftParams {
    pub min_duration_secs: f64,
    pub windows: usize,
    pub window_secs: f64,
    pub start_frac: f64,
    pub end_frac: f64,
    pub span: f64,
    pub step: f64,
    pub lambda: f64,
    pub kicks: DriftKickParams,
}

/// Kick times detected inside one analysis window
#[derive(Debug, Clone)]
pub struct DriftWindow {
    pub centre: f64,
    pub kicks: Vec<f64>,
}

/// Kick attack times (seconds) between `t_start` and `t_end`
///
/// Rising edges of the low-band envelope above `μ + sigma·σ` of the
/// window's opening baseline, at least `min_separation_secs` apart, each
/// walked back to the first sample above threshold within `lookback_secs`.
pub fn detect_kick_times(
    samples: &[f64],
    sample_rate: u32,
    t_start: f64,
    t_end: f64,
    params: DriftKickParams,
) -> Vec<f64> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let sr = sample_rate as f64;
    let duration = samples.len() as f64 / sr;
    let i0 = ((t_start.max(0.0) * sr) as usize).min(samples.len());
    let i1 = ((t_end.min(duration) * sr) as usize).min(samples.len());
    if i1 <= i0 || ((i1 - i0) as f64) < 0.2 * sr {
        return Vec::new();
    }

    let env = kick_envelope(
        &samples[i0..i1],
        sample_rate,
        params.lowpass_hz,
        params.smooth_secs,
    );
    let baseline = ((params.baseline_secs * sr) as usize).max(32).min(env.len());
    let (mean, std) = mean_std(&env[..baseline]);
    let threshold = mean + params.sigma * std;

    let min_sep = (params.min_separation_secs * sr) as usize;
    let mut picks: Vec<usize> = Vec::new();
    for j in 1..env.len() {
        let rising = env[j] > threshold && env[j - 1] <= threshold;
        if rising && picks.last().map_or(true, |&last| j - last >= min_sep) {
            picks.push(j);
        }
    }

    let lookback = (params.lookback_secs * sr) as usize;
    picks
        .into_iter()
        .map(|j| {
            let lb = j.saturating_sub(lookback);
            let first = (lb..=j).find(|&k| env[k] > threshold).unwrap_or(j);
            (i0 + first) as f64 / sr
        })
        .collect()
}

/// Offset of each kick from its nearest grid line
pub fn residuals(kicks: &[f64], t0: f64, period: f64) -> Vec<f64> {
    kicks
        .iter()
        .map(|&kt| kt - (t0 + ((kt - t0) / period).round() * period))
        .collect()
}

/// Drift loss of a candidate tempo; infinite when no window has kicks
pub fn drift_loss(windows: &[DriftWindow], t0: f64, bpm: f64, lambda: f64) -> f64 {
    if bpm <= 0.0 || !bpm.is_finite() {
        return f64::INFINITY;
    }
    let period = 60.0 / bpm;
    let mut all_abs = Vec::new();
    let mut centres = Vec::new();
    let mut medians = Vec::new();
    for window in windows.iter().filter(|w| !w.kicks.is_empty()) {
        let r = residuals(&window.kicks, t0, period);
        all_abs.extend(r.iter().map(|x| x.abs()));
        if let Some(m) = median(&r) {
            medians.push(m);
            centres.push(window.centre);
        }
    }
    let Some(med_abs) = median(&all_abs) else {
        return f64::INFINITY;
    };
    med_abs + lambda * linear_slope(&centres, &medians).abs()
}

/// Evenly spaced values from `start` to `end` inclusive
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        n => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Detect kicks in every drift window
pub fn drift_windows(samples: &[f64], sample_rate: u32, params: &DriftParams) -> Vec<DriftWindow> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let duration = samples.len() as f64 / sample_rate as f64;
    let half = params.window_secs / 2.0;
    linspace(
        params.start_frac * duration,
        params.end_frac * duration,
        params.windows,
    )
    .into_par_iter()
    .map(|centre| DriftWindow {
        centre,
        kicks: detect_kick_times(
            samples,
            sample_rate,
            (centre - half).max(0.0),
            (centre + half).min(duration),
            params.kicks,
        ),
    })
    .collect()
}

/// Pick the tempo within `bpm0 ± span` whose grid drifts least against the kicks
///
/// Returns `bpm0` untouched for short tracks, a non-positive seed, or when no
/// kicks are found.
pub fn refine_bpm_by_drift(
    samples: &[f64],
    sample_rate: u32,
    t0: f64,
    bpm0: f64,
    params: &DriftParams,
) -> f64 {
    if sample_rate == 0 || bpm0 <= 0.0 || !bpm0.is_finite() {
        return bpm0;
    }
    let duration = samples.len() as f64 / sample_rate as f64;
    if duration < params.min_duration_secs {
        log::debug!(
            "refine_bpm_by_drift: {:.1}s track is too short, keeping {:.2}",
            duration,
            bpm0
        );
        return bpm0;
    }

    let windows = drift_windows(samples, sample_rate, params);
    let kick_count: usize = windows.iter().map(|w| w.kicks.len()).sum();
    if kick_count == 0 {
        log::debug!("refine_bpm_by_drift: no kicks found, keeping {:.2}", bpm0);
        return bpm0;
    }

    let candidates: Vec<f64> = grid(bpm0 - params.span, bpm0 + params.span, params.step)
        .into_iter()
        .filter(|&b| b > 0.0)
        .collect();
    let losses: Vec<f64> = candidates
        .par_iter()
        .map(|&bpm| drift_loss(&windows, t0, bpm, params.lambda))
        .collect();

    // Earliest candidate wins ties
    let mut best = (bpm0, f64::INFINITY);
    for (&bpm, &loss) in candidates.iter().zip(&losses) {
        if loss < best.1 {
            best = (bpm, loss);
        }
    }
    log::info!(
        "refine_bpm_by_drift: {:.2} -> {:.2} BPM (loss {:.4}, {} kicks in {} windows)",
        bpm0,
        best.0,
        best.1,
        kick_count,
        windows.len()
    );
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const SR: u32 = 8000;

    fn kick_params() -> DriftKickParams {
        DriftKickParams {
            lowpass_hz: 180.0,
            smooth_secs: 0.0025,
            baseline_secs: 0.2,
            sigma: 2.0,
            min_separation_secs: 0.18,
            lookback_secs: 0.08,
        }
    }

    fn drift_params() -> DriftParams {
        DriftParams {
            min_duration_secs: 30.0,
            windows: 7,
            window_secs: 18.0,
            start_frac: 0.1,
            end_frac: 0.9,
            span: 1.0,
            step: 0.01,
            lambda: 0.25,
            kicks: kick_params(),
        }
    }

    /// Short low thumps on a grid starting at `first` with `bpm`, over a
    /// faint hum so window baselines are never digital silence
    fn kick_track(bpm: f64, first: f64, secs: f64) -> Vec<f64> {
        let len = (secs * SR as f64) as usize;
        let mut out: Vec<f64> = (0..len)
            .map(|i| 0.001 * (2.0 * PI * 37.0 * i as f64 / SR as f64).sin())
            .collect();
        let period = 60.0 / bpm;
        let mut t = first;
        while t < secs {
            let start = (t * SR as f64) as usize;
            for i in 0..(0.06 * SR as f64) as usize {
                if let Some(s) = out.get_mut(start + i) {
                    let ts = i as f64 / SR as f64;
                    *s += 0.9 * (2.0 * PI * 55.0 * ts).sin() * (-ts / 0.02).exp();
                }
            }
            t += period;
        }
        out
    }

    #[test]
    fn test_residuals() {
        let r = residuals(&[1.02, 1.49, 3.0], 1.0, 0.5);
        assert!((r[0] - 0.02).abs() < 1e-12);
        assert!((r[1] + 0.01).abs() < 1e-12);
        assert!(r[2].abs() < 1e-12);
    }

    #[test]
    fn test_drift_loss_no_kicks_is_infinite() {
        let windows = vec![DriftWindow {
            centre: 5.0,
            kicks: Vec::new(),
        }];
        assert!(drift_loss(&windows, 0.0, 120.0, 0.25).is_infinite());
        assert!(drift_loss(&[], 0.0, 120.0, 0.25).is_infinite());
    }

    #[test]
    fn test_drift_loss_minimum_at_true_tempo() {
        // Kicks exactly on a 124 BPM grid, spread over three windows
        let period = 60.0 / 124.0;
        let windows: Vec<DriftWindow> = [10.0, 30.0, 50.0]
            .iter()
            .map(|&c| DriftWindow {
                centre: c,
                kicks: (0..20)
                    .map(|k| 0.25 + ((c / period).floor() + k as f64) * period)
                    .collect(),
            })
            .collect();
        let at_truth = drift_loss(&windows, 0.25, 124.0, 0.25);
        assert!(at_truth < 1e-9);
        assert!(drift_loss(&windows, 0.25, 124.1, 0.25) > at_truth);
        assert!(drift_loss(&windows, 0.25, 123.9, 0.25) > at_truth);
    }

    #[test]
    fn test_detect_kick_times() {
        let samples = kick_track(120.0, 0.5, 5.0);
        let kicks = detect_kick_times(&samples, SR, 0.0, 5.0, kick_params());
        assert!(kicks.len() >= 8, "found {:?}", kicks);
        for pair in kicks.windows(2) {
            assert!(((pair[1] - pair[0]) - 0.5).abs() < 0.01, "{:?}", kicks);
        }
        assert!(detect_kick_times(&samples, SR, 1.0, 1.1, kick_params()).is_empty());
    }

    #[test]
    fn test_refine_by_drift_recovers_tempo() {
        let samples = kick_track(126.0, 0.4, 40.0);
        let refined = refine_bpm_by_drift(&samples, SR, 0.4, 126.6, &drift_params());
        assert!((refined - 126.0).abs() < 0.05, "refined {}", refined);
    }

    #[test]
    fn test_refine_by_drift_short_track_untouched() {
        let samples = kick_track(126.0, 0.4, 10.0);
        assert_eq!(refine_bpm_by_drift(&samples, SR, 0.4, 126.6, &drift_params()), 126.6);
        assert_eq!(refine_bpm_by_drift(&samples, SR, 0.4, 0.0, &drift_params()), 0.0);
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
