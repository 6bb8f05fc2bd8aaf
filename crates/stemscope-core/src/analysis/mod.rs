//! Tempo and beat-grid analysis
//!
//! Offline estimation over mono f64 audio. Runs on the control thread (or a
//! worker), never on the audio thread.
//!
//! ## Stages
//!
//! - [`onset`]: spectral-flux envelope and HFC first-onset detection
//! - [`beat_tracker`]: autocorrelation period and DP beat tracking
//! - [`autocorr`]: energy-envelope tempo candidate and local refinement
//! - [`fold`]: octave folding, clustering and final rounding
//! - [`anchor`]: audible start and kick-attack detection for `t0`
//! - [`drift`]: kick-residual drift correction of the tempo
//!
//! [`TempoEstimator`] wires the stages together; every constant comes from
//! [`TempoConfig`].

pub mod anchor;
pub mod autocorr;
pub mod beat_tracker;
mod config;
pub mod drift;
mod error;
pub mod fold;
pub mod onset;
mod stats;
mod tempo;

pub use config::{AnchorMode, BpmSnap, TempoConfig};
pub use error::{AnalysisError, AnalysisResult};
pub use fold::{cluster_pick, fold_bpm, snap_bpm};
pub use tempo::{estimate_beat_grid, estimate_tempo, BeatGridEstimate, TempoEstimator};
