//! Octave folding, candidate clustering and final BPM rounding

use super::config::BpmSnap;
use super::stats::{mean_std, median};

/// Fold a tempo into the half-open octave range `[lo, hi)`
///
/// Non-finite or non-positive input yields 0.0. Requires `hi >= 2·lo`
/// (guaranteed by [`TempoConfig::validate`](super::TempoConfig::validate)).
pub fn fold_bpm(bpm: f64, lo: f64, hi: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 || !(lo > 0.0) || !(hi > lo) {
        return 0.0;
    }
    let mut b = bpm;
    while b >= hi {
        b *= 0.5;
    }
    while b < lo {
        b *= 2.0;
    }
    // Doubling a value just under lo can overshoot a narrow range
    if b >= hi {
        b *= 0.5;
    }
    b
}

/// Pick the consensus tempo from a set of candidates
///
/// Sorted values join the first bucket whose running median is within
/// `tol`; the largest bucket wins, then the one with the lower spread.
/// Zero / non-finite candidates are ignored. Returns 0.0 when nothing is left.
pub fn cluster_pick(values: &[f64], tol: f64) -> f64 {
    let mut sorted: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let mut buckets: Vec<Vec<f64>> = Vec::new();
    for v in sorted {
        let home = buckets
            .iter_mut()
            .find(|b| median(b).is_some_and(|m| (m - v).abs() <= tol));
        match home {
            Some(bucket) => bucket.push(v),
            None => buckets.push(vec![v]),
        }
    }

    // Stable sort keeps the lower-tempo bucket on a full tie
    buckets.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| mean_std(a).1.total_cmp(&mean_std(b).1))
    });
    buckets
        .first()
        .and_then(|b| median(b))
        .unwrap_or(0.0)
}

/// Round a tempo per `snap`, only when it lands inside `[min, max]`
///
/// Non-finite or non-positive input yields 0.0; out-of-range tempos are
/// returned unchanged.
pub fn snap_bpm(bpm: f64, snap: BpmSnap, min: f64, max: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    let whole = bpm.round();
    if whole < min || whole > max {
        return bpm;
    }
    match snap {
        BpmSnap::None => bpm,
        BpmSnap::Integer => whole,
        BpmSnap::Decimal(places) => {
            let scale = 10f64.powi(places.min(9) as i32);
            (bpm * scale).round() / scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_into_range() {
        assert_eq!(fold_bpm(60.0, 80.0, 180.0), 120.0);
        assert_eq!(fold_bpm(240.0, 80.0, 180.0), 120.0);
        assert_eq!(fold_bpm(120.0, 80.0, 180.0), 120.0);
        assert_eq!(fold_bpm(45.0, 80.0, 180.0), 90.0);
        // Upper bound is exclusive
        assert_eq!(fold_bpm(180.0, 80.0, 180.0), 90.0);
        assert_eq!(fold_bpm(80.0, 80.0, 180.0), 80.0);
    }

    #[test]
    fn test_fold_degenerate() {
        assert_eq!(fold_bpm(0.0, 80.0, 180.0), 0.0);
        assert_eq!(fold_bpm(-5.0, 80.0, 180.0), 0.0);
        assert_eq!(fold_bpm(f64::NAN, 80.0, 180.0), 0.0);
        assert_eq!(fold_bpm(f64::INFINITY, 80.0, 180.0), 0.0);
    }

    #[test]
    fn test_fold_invariant_over_sweep() {
        let mut bpm = 1.0;
        while bpm < 2000.0 {
            let f = fold_bpm(bpm, 80.0, 180.0);
            assert!((80.0..180.0).contains(&f), "{} folded to {}", bpm, f);
            assert_eq!(fold_bpm(f, 80.0, 180.0), f, "{} not idempotent", bpm);
            bpm *= 1.37;
        }
    }

    #[test]
    fn test_fold_edges_are_idempotent() {
        let edges = [
            79.999_999_999,
            80.0,
            179.999_999_999,
            180.0,
            359.999_999,
            1e300,
            f64::MIN_POSITIVE,
            1e-6,
            1e7,
        ];
        for bpm in edges {
            let f = fold_bpm(bpm, 80.0, 180.0);
            assert!((80.0..180.0).contains(&f), "{} folded to {}", bpm, f);
            assert_eq!(fold_bpm(f, 80.0, 180.0), f, "{} not idempotent", bpm);
        }
    }

    #[test]
    fn test_cluster_majority_wins() {
        assert!((cluster_pick(&[120.1, 90.0, 119.9], 1.5) - 120.0).abs() < 1e-9);
        assert_eq!(cluster_pick(&[], 1.5), 0.0);
        assert_eq!(cluster_pick(&[0.0, f64::NAN], 1.5), 0.0);
        assert_eq!(cluster_pick(&[0.0, 128.0], 1.5), 128.0);
    }

    #[test]
    fn test_cluster_tie_prefers_tight_bucket() {
        // Two buckets of two; the tighter one wins
        let picked = cluster_pick(&[100.0, 101.4, 140.0, 140.2], 1.5);
        assert!((picked - 140.1).abs() < 1e-9);
        // Full tie keeps the lower bucket
        assert_eq!(cluster_pick(&[100.0, 150.0], 1.5), 100.0);
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap_bpm(120.04, BpmSnap::Decimal(1), 60.0, 200.0), 120.0);
        assert_eq!(snap_bpm(127.96, BpmSnap::Integer, 60.0, 200.0), 128.0);
        assert_eq!(snap_bpm(127.96, BpmSnap::None, 60.0, 200.0), 127.96);
        assert_eq!(snap_bpm(250.33, BpmSnap::Integer, 60.0, 200.0), 250.33);
        assert_eq!(snap_bpm(f64::NAN, BpmSnap::Integer, 60.0, 200.0), 0.0);
        assert_eq!(snap_bpm(-1.0, BpmSnap::Integer, 60.0, 200.0), 0.0);
    }
}
