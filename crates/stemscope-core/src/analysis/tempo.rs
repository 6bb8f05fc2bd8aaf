//! Tempo and beat-grid estimation entry points

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use super::anchor::{self, KickParams};
use super::autocorr::{energy_tempo, refine_bpm_local, RefineParams};
use super::beat_tracker::{track_beats, TrackerParams};
use super::config::{AnchorMode, TempoConfig};
use super::drift::{refine_bpm_by_drift, DriftKickParams, DriftParams};
use super::error::AnalysisResult;
use super::fold::{cluster_pick, fold_bpm, snap_bpm};
use super::onset::{first_onset_hfc, spectral_flux, HfcParams};

/// Inputs louder than this are assumed to be unnormalized integer PCM
const NORMALIZE_ABOVE: f64 = 2.0;

/// Tempo plus the detected anchor times of a beat grid
///
/// All times are seconds from the start of the track. Beat `n` of the grid
/// sits at `t0 + n·60/bpm`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatGridEstimate {
    pub bpm: f64,
    pub t0: f64,
    pub audio_start: f64,
    pub approx_onset: f64,
    pub kick_attack: f64,
}

impl BeatGridEstimate {
    /// Seconds per beat; 0 without a tempo
    pub fn beat_period(&self) -> f64 {
        if self.bpm > 0.0 {
            60.0 / self.bpm
        } else {
            0.0
        }
    }

    pub fn has_tempo(&self) -> bool {
        self.bpm > 0.0
    }
}

/// Configured tempo estimator
///
/// ```text
/// mono ─► crop ─┬─► spectral flux (hop 512) ─► beat tracker ─► bpm, 60/median(IBI)
///               └─► high-passed energy ──────► autocorrelation ─► bpm
///                         fold ─► cluster ─► seed
///   spectral flux (hop 256) ─► local refinement ─► bpm_refined
///
/// beat grid: audio start ─► first HFC onset ─► kick attack ─► t0
///            bpm_refined + t0 ─► drift correction ─► snap
/// ```
#[derive(Debug, Clone, Default)]
pub struct TempoEstimator {
    config: TempoConfig,
}

impl TempoEstimator {
    pub fn new(mut config: TempoConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &TempoConfig {
        &self.config
    }

    /// Estimated tempo in BPM, 0.0 when the input carries none
    pub fn estimate_tempo(&self, samples: &[f64], sample_rate: u32) -> f64 {
        let Some(mono) = prepare(samples, sample_rate) else {
            return 0.0;
        };
        let bpm = self.refined_tempo(&mono, sample_rate);
        let snapped = self.snap(bpm);
        log::info!(
            "TempoEstimator::estimate_tempo: {:.3} BPM (reported {:.3})",
            bpm,
            snapped
        );
        snapped
    }

    /// Tempo and anchor times for a beat grid
    pub fn estimate_beat_grid(&self, samples: &[f64], sample_rate: u32) -> BeatGridEstimate {
        let Some(mono) = prepare(samples, sample_rate) else {
            return BeatGridEstimate::default();
        };
        let c = &self.config;
        let bpm_refined = self.refined_tempo(&mono, sample_rate);

        let audio_start = anchor::audio_start(
            &mono,
            sample_rate,
            c.rms_frame_secs,
            c.rms_hop_secs,
            c.audio_start_db,
        );
        let approx_onset = match first_onset_hfc(&mono, sample_rate, audio_start, self.hfc_params())
        {
            Ok(Some(t)) => t,
            Ok(None) => audio_start,
            Err(e) => {
                log::warn!("TempoEstimator::estimate_beat_grid: onset detection failed: {}", e);
                audio_start
            }
        };
        let kick_attack = anchor::kick_attack(
            &mono,
            sample_rate,
            approx_onset,
            c.kick_lookback_secs,
            self.kick_params(),
        );

        let t0 = match c.anchor {
            AnchorMode::KickAttack => kick_attack,
            AnchorMode::AudioStart if c.snap_to_first_kick => anchor::first_kick_after(
                &mono,
                sample_rate,
                audio_start,
                c.first_kick_search_secs,
                self.kick_params(),
            )
            .unwrap_or(audio_start),
            AnchorMode::AudioStart => audio_start,
        };

        let bpm = if bpm_refined > 0.0 && c.drift_enabled {
            refine_bpm_by_drift(&mono, sample_rate, t0, bpm_refined, &self.drift_params())
        } else {
            bpm_refined
        };

        let estimate = BeatGridEstimate {
            bpm: self.snap(bpm),
            t0,
            audio_start,
            approx_onset,
            kick_attack,
        };
        log::info!(
            "TempoEstimator::estimate_beat_grid: {:.2} BPM, t0 {:.3}s (start {:.3}s, onset {:.3}s, kick {:.3}s)",
            estimate.bpm,
            estimate.t0,
            estimate.audio_start,
            estimate.approx_onset,
            estimate.kick_attack
        );
        estimate
    }

    /// Ensemble estimate refined on the onset envelope, before snapping
    fn refined_tempo(&self, mono: &[f64], sample_rate: u32) -> f64 {
        let cropped = self.crop(mono, sample_rate);
        match self.try_refined_tempo(cropped, sample_rate) {
            Ok(bpm) => bpm,
            Err(e) => {
                log::warn!("TempoEstimator: tempo estimation failed: {}", e);
                0.0
            }
        }
    }

    fn try_refined_tempo(&self, mono: &[f64], sample_rate: u32) -> AnalysisResult<f64> {
        let c = &self.config;
        let flux = spectral_flux(mono, sample_rate, c.tracker_window, c.tracker_hop)?;
        let tracked = track_beats(
            &flux,
            TrackerParams {
                min_bpm: c.min_bpm,
                max_bpm: c.max_bpm,
                prior_bpm: c.tracker_prior_bpm,
                tightness: c.tracker_tightness,
            },
        );
        let energy = energy_tempo(
            mono,
            sample_rate,
            c.energy_highpass_hz,
            c.energy_window,
            c.energy_hop,
            c.min_bpm,
            c.max_bpm,
        );

        let raw = [tracked.bpm, tracked.ibi_bpm(), energy];
        let folded = raw.map(|b| fold_bpm(b, c.fold_lo, c.fold_hi));
        let seed = cluster_pick(&folded, c.cluster_tol);
        log::debug!(
            "TempoEstimator: candidates tracker {:.2} / ibi {:.2} / energy {:.2} -> seed {:.2}",
            folded[0],
            folded[1],
            folded[2],
            seed
        );
        if seed <= 0.0 {
            return Ok(0.0);
        }

        let fine = spectral_flux(mono, sample_rate, c.tracker_window, c.refine_hop)?;
        Ok(refine_bpm_local(
            &fine,
            seed,
            RefineParams {
                span: c.refine_span,
                step: c.refine_step,
                smooth_ac: c.refine_smooth_ac,
                fold_lo: c.fold_lo,
                fold_hi: c.fold_hi,
            },
        ))
    }

    /// Candidate stages skip the intro and stop after `crop_secs`
    fn crop<'a>(&self, mono: &'a [f64], sample_rate: u32) -> &'a [f64] {
        let sr = sample_rate as f64;
        let start = (self.config.crop_offset_secs.max(0.0) * sr) as usize;
        let end = start.saturating_add((self.config.crop_secs.max(0.0) * sr) as usize);
        if end > start && end <= mono.len() {
            &mono[start..end]
        } else if start < mono.len() {
            &mono[start..]
        } else {
            mono
        }
    }

    fn snap(&self, bpm: f64) -> f64 {
        let c = &self.config;
        snap_bpm(bpm, c.snap, c.snap_min_bpm, c.snap_max_bpm)
    }

    fn hfc_params(&self) -> HfcParams {
        let c = &self.config;
        HfcParams {
            window: c.onset_window,
            hop: c.onset_hop,
            threshold: c.onset_threshold,
            silence_db: c.onset_silence_db,
            min_ioi_secs: c.onset_min_ioi_secs,
        }
    }

    fn kick_params(&self) -> KickParams {
        let c = &self.config;
        let (sigma, sustain_secs) = if c.kick_earliest_edge {
            (c.kick_edge_sigma, c.kick_edge_sustain_secs)
        } else {
            (c.kick_rise_sigma, c.kick_sustain_secs)
        };
        KickParams {
            lowpass_hz: c.kick_lowpass_hz,
            smooth_secs: c.kick_smooth_secs,
            baseline_secs: c.kick_baseline_secs,
            sigma,
            sustain_secs,
        }
    }

    fn drift_params(&self) -> DriftParams {
        let c = &self.config;
        DriftParams {
            min_duration_secs: c.drift_min_duration_secs,
            windows: c.drift_windows,
            window_secs: c.drift_window_secs,
            start_frac: c.drift_start_frac,
            end_frac: c.drift_end_frac,
            span: c.drift_span,
            step: c.drift_step,
            lambda: c.drift_lambda,
            kicks: DriftKickParams {
                lowpass_hz: c.kick_lowpass_hz,
                smooth_secs: c.kick_smooth_secs,
                baseline_secs: c.drift_kick_baseline_secs,
                sigma: c.drift_kick_sigma,
                min_separation_secs: c.drift_kick_min_sep_secs,
                lookback_secs: c.drift_kick_lookback_secs,
            },
        }
    }
}

/// Estimate tempo with the default configuration
pub fn estimate_tempo(samples: &[f64], sample_rate: u32) -> f64 {
    TempoEstimator::default().estimate_tempo(samples, sample_rate)
}

/// Estimate a beat grid with the default configuration
pub fn estimate_beat_grid(samples: &[f64], sample_rate: u32) -> BeatGridEstimate {
    TempoEstimator::default().estimate_beat_grid(samples, sample_rate)
}

/// Sanitize input: None for empty input or a zero rate, non-finite samples
/// zeroed, integer-scaled input divided by its peak
fn prepare(samples: &[f64], sample_rate: u32) -> Option<Cow<'_, [f64]>> {
    if samples.is_empty() || sample_rate == 0 {
        return None;
    }
    let all_finite = samples.iter().all(|x| x.is_finite());
    let peak = samples
        .iter()
        .filter(|x| x.is_finite())
        .fold(0.0f64, |m, x| m.max(x.abs()));
    if all_finite && peak <= NORMALIZE_ABOVE {
        return Some(Cow::Borrowed(samples));
    }
    let scale = if peak > NORMALIZE_ABOVE { 1.0 / peak } else { 1.0 };
    Some(Cow::Owned(
        samples
            .iter()
            .map(|&x| if x.is_finite() { x * scale } else { 0.0 })
            .collect(),
    ))
}
