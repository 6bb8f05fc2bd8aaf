//! Small numeric helpers shared by the analysis stages

/// Median (mean of the middle pair for even lengths); None when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Population mean and standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Zero-mean, unit-variance copy (σ floored at 1e-12)
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let (mean, std) = mean_std(values);
    let std = std + 1e-12;
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Raw autocorrelation for lags `0..=max_lag` (clamped to the signal length)
pub fn autocorrelation(x: &[f64], max_lag: usize) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let max_lag = max_lag.min(x.len() - 1);
    (0..=max_lag)
        .map(|lag| x[lag..].iter().zip(x).map(|(a, b)| a * b).sum())
        .collect()
}

/// Least-squares slope of `ys` against `xs`; 0 for fewer than two points
pub fn linear_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (mx, _) = mean_std(&xs[..n]);
    let (my, _) = mean_std(&ys[..n]);
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(ys).take(n) {
        num += (x - mx) * (y - my);
        den += (x - mx) * (x - mx);
    }
    if den <= 0.0 {
        0.0
    } else {
        num / den
    }
}

/// `start, start+step, ...` up to and including `end` (within half a step)
pub fn grid(start: f64, end: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !start.is_finite() || !end.is_finite() || end < start {
        return Vec::new();
    }
    let count = ((end - start) / step + 0.5).floor() as usize + 1;
    (0..count).map(|i| start + i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_autocorrelation_peaks_at_period() {
        let x: Vec<f64> = (0..200).map(|i| if i % 10 == 0 { 1.0 } else { 0.0 }).collect();
        let ac = autocorrelation(&zscore(&x), 30);
        assert_eq!(ac.len(), 31);
        let best = (1..ac.len())
            .max_by(|&a, &b| ac[a].total_cmp(&ac[b]))
            .unwrap();
        assert_eq!(best, 10);
        assert!(autocorrelation(&[], 5).is_empty());
        assert_eq!(autocorrelation(&[1.0, 2.0], 10).len(), 2);
    }

    #[test]
    fn test_linear_slope() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        assert!((linear_slope(&xs, &ys) - 2.0).abs() < 1e-12);
        assert_eq!(linear_slope(&[1.0], &[2.0]), 0.0);
        assert_eq!(linear_slope(&[1.0, 1.0], &[2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_grid_includes_end() {
        let g = grid(119.0, 121.0, 0.01);
        assert_eq!(g.len(), 201);
        assert!((g[200] - 121.0).abs() < 1e-9);
        assert!(grid(1.0, 0.0, 0.1).is_empty());
        assert!(grid(0.0, 1.0, 0.0).is_empty());
    }
}
