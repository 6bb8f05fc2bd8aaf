//! Tempo analysis configuration
//!
//! Every constant the estimator uses lives here so a config file can tune
//! the pipeline without a rebuild. Defaults reproduce the stock behaviour.

use serde::{Deserialize, Serialize};

/// How the final BPM is rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BpmSnap {
    /// Report the raw estimate
    None,
    /// Round to a whole BPM
    Integer,
    /// Round to the given number of decimal places
    Decimal(u32),
}

impl Default for BpmSnap {
    fn default() -> Self {
        BpmSnap::Decimal(1)
    }
}

/// Which detected time becomes the grid anchor `t0`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    /// First audible RMS frame
    #[default]
    AudioStart,
    /// Attack of the first kick drum
    KickAttack,
}

/// Tempo and beat-grid estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    // Analysis crop (candidate stages only)
    pub crop_offset_secs: f64,
    pub crop_secs: f64,

    // Octave fold range, half-open [fold_lo, fold_hi)
    pub fold_lo: f64,
    pub fold_hi: f64,
    /// Candidate lag search range for the autocorrelation stages
    pub min_bpm: f64,
    pub max_bpm: f64,

    // Onset tracker
    pub tracker_window: usize,
    pub tracker_hop: usize,
    /// Centre of the log-normal tempo prior
    pub tracker_prior_bpm: f64,
    /// Penalty on beat spacings that stray from the period
    pub tracker_tightness: f64,

    // Energy candidate
    pub energy_highpass_hz: f64,
    pub energy_window: usize,
    pub energy_hop: usize,

    /// Clustering tolerance against a bucket's median
    pub cluster_tol: f64,

    // Local refinement
    pub refine_hop: usize,
    pub refine_span: f64,
    pub refine_step: f64,
    /// Box-smoothing width for the refinement autocorrelation (odd; 0 or 1 disables)
    pub refine_smooth_ac: usize,

    // Final rounding
    pub snap: BpmSnap,
    pub snap_min_bpm: f64,
    pub snap_max_bpm: f64,

    // Audio start (RMS gate)
    pub rms_frame_secs: f64,
    pub rms_hop_secs: f64,
    pub audio_start_db: f64,

    // First onset (HFC)
    pub onset_window: usize,
    pub onset_hop: usize,
    pub onset_threshold: f64,
    pub onset_silence_db: f64,
    pub onset_min_ioi_secs: f64,

    // Kick attack
    pub kick_lookback_secs: f64,
    pub kick_lowpass_hz: f64,
    pub kick_smooth_secs: f64,
    pub kick_baseline_secs: f64,
    pub kick_rise_sigma: f64,
    pub kick_sustain_secs: f64,
    /// Looser threshold that finds the very first edge of the attack
    pub kick_earliest_edge: bool,
    pub kick_edge_sigma: f64,
    pub kick_edge_sustain_secs: f64,

    // Anchor
    pub anchor: AnchorMode,
    /// Move `t0` forward to the first kick found after the audio start
    pub snap_to_first_kick: bool,
    pub first_kick_search_secs: f64,

    // Drift correction
    pub drift_enabled: bool,
    pub drift_min_duration_secs: f64,
    pub drift_windows: usize,
    pub drift_window_secs: f64,
    pub drift_start_frac: f64,
    pub drift_end_frac: f64,
    pub drift_span: f64,
    pub drift_step: f64,
    /// Weight of the residual slope term in the drift loss
    pub drift_lambda: f64,
    pub drift_kick_sigma: f64,
    pub drift_kick_baseline_secs: f64,
    pub drift_kick_min_sep_secs: f64,
    pub drift_kick_lookback_secs: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            crop_offset_secs: 10.0,
            crop_secs: 150.0,

            fold_lo: 80.0,
            fold_hi: 180.0,
            min_bpm: 60.0,
            max_bpm: 200.0,

            tracker_window: 1024,
            tracker_hop: 512,
            tracker_prior_bpm: 128.0,
            tracker_tightness: 100.0,

            energy_highpass_hz: 120.0,
            energy_window: 1024,
            energy_hop: 512,

            cluster_tol: 1.5,

            refine_hop: 256,
            refine_span: 2.0,
            refine_step: 0.01,
            refine_smooth_ac: 0,

            snap: BpmSnap::default(),
            snap_min_bpm: 60.0,
            snap_max_bpm: 200.0,

            rms_frame_secs: 0.02,
            rms_hop_secs: 0.01,
            audio_start_db: -45.0,

            onset_window: 1024,
            onset_hop: 128,
            onset_threshold: 0.25,
            onset_silence_db: -60.0,
            onset_min_ioi_secs: 0.08,

            kick_lookback_secs: 0.2,
            kick_lowpass_hz: 180.0,
            kick_smooth_secs: 0.0025,
            kick_baseline_secs: 0.08,
            kick_rise_sigma: 6.0,
            kick_sustain_secs: 0.008,
            kick_earliest_edge: false,
            kick_edge_sigma: 2.0,
            kick_edge_sustain_secs: 0.001,

            anchor: AnchorMode::default(),
            snap_to_first_kick: false,
            first_kick_search_secs: 0.8,

            drift_enabled: true,
            drift_min_duration_secs: 30.0,
            drift_windows: 7,
            drift_window_secs: 18.0,
            drift_start_frac: 0.1,
            drift_end_frac: 0.9,
            drift_span: 1.0,
            drift_step: 0.01,
            drift_lambda: 0.25,
            drift_kick_sigma: 2.0,
            drift_kick_baseline_secs: 0.2,
            drift_kick_min_sep_secs: 0.18,
            drift_kick_lookback_secs: 0.08,
        }
    }
}

impl TempoConfig {
    /// Repair values that would make a stage degenerate
    ///
    /// Called by the estimator before every run; a hand-edited config file
    /// can't make it divide by zero or loop forever.
    pub fn validate(&mut self) {
        if !(self.fold_lo > 0.0) || !self.fold_lo.is_finite() {
            self.fold_lo = 80.0;
        }
        // The range must span at least one octave or folding can't terminate
        if !(self.fold_hi >= self.fold_lo * 2.0) || !self.fold_hi.is_finite() {
            self.fold_hi = self.fold_lo * 2.25;
        }
        if !(self.min_bpm > 0.0) || !(self.max_bpm > self.min_bpm) {
            self.min_bpm = 60.0;
            self.max_bpm = 200.0;
        }
        for size in [
            &mut self.tracker_window,
            &mut self.energy_window,
            &mut self.onset_window,
        ] {
            *size = (*size).max(64);
        }
        for hop in [
            &mut self.tracker_hop,
            &mut self.energy_hop,
            &mut self.refine_hop,
            &mut self.onset_hop,
        ] {
            *hop = (*hop).max(1);
        }
        if !(self.refine_step > 0.0) {
            self.refine_step = 0.01;
        }
        if !(self.drift_step > 0.0) {
            self.drift_step = 0.01;
        }
        self.refine_span = self.refine_span.max(0.0);
        self.drift_span = self.drift_span.max(0.0);
        self.cluster_tol = self.cluster_tol.max(0.0);
        self.drift_windows = self.drift_windows.max(1);
    }

    /// Builder: set the anchor mode
    pub fn with_anchor(mut self, anchor: AnchorMode) -> Self {
        self.anchor = anchor;
        self
    }

    /// Builder: set the final rounding
    pub fn with_snap(mut self, snap: BpmSnap) -> Self {
        self.snap = snap;
        self
    }

    /// Builder: enable or disable drift correction
    pub fn with_drift(mut self, enabled: bool) -> Self {
        self.drift_enabled = enabled;
        self
    }
}
