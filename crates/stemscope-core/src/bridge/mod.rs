//! Playback-state bridge between the engine and visualizers
//!
//! The engine publishes transport, format and mix parameters here; a
//! waveform/spectrogram view publishes its zoom/pan hints and the beat-grid
//! overlay. Everything is stored in relaxed atomics (f64 as raw bits) so the
//! audio thread can write without locking and readers get an eventually
//! consistent [`PlaybackSnapshot`] copy.
//!
//! The bridge is an explicit context object: create one, wrap it in an `Arc`,
//! and hand clones to the engine and to whoever draws.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::analysis::BeatGridEstimate;
use crate::engine::MixConfiguration;
use crate::types::NUM_STEMS;

/// Beats per bar used when the caller does not specify one
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// f64 stored as its bit pattern in an `AtomicU64`
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Zoom/pan hints published by the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewHints {
    pub zoom: f64,
    pub pan_offset_frames: f64,
    /// Horizontal playhead position as a fraction of the view width
    pub playhead_x_ratio: f64,
}

impl Default for ViewHints {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_offset_frames: 0.0,
            playhead_x_ratio: 0.5,
        }
    }
}

/// Beat-grid overlay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOverlay {
    pub enabled: bool,
    pub bpm: f64,
    pub t0: f64,
    pub beats_per_bar: u32,
    pub audio_start: f64,
    pub approx_onset: f64,
    pub kick_attack: f64,
}

impl Default for GridOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            bpm: 0.0,
            t0: 0.0,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            audio_start: 0.0,
            approx_onset: 0.0,
            kick_attack: 0.0,
        }
    }
}

impl GridOverlay {
    /// Overlay for a computed estimate; disabled when the BPM is unusable
    pub fn from_estimate(estimate: &BeatGridEstimate, beats_per_bar: u32) -> Self {
        Self {
            enabled: estimate.bpm.is_finite() && estimate.bpm > 0.0,
            bpm: estimate.bpm,
            t0: estimate.t0,
            beats_per_bar: beats_per_bar.max(1),
            audio_start: estimate.audio_start,
            approx_onset: estimate.approx_onset,
            kick_attack: estimate.kick_attack,
        }
    }

    /// Beat period in seconds (0 when disabled)
    pub fn beat_period(&self) -> f64 {
        if self.enabled && self.bpm > 0.0 {
            60.0 / self.bpm
        } else {
            0.0
        }
    }

    /// Grid lines in `[start, end)` seconds as `(time, is_downbeat)`
    pub fn beats_in_range(&self, start: f64, end: f64) -> Vec<(f64, bool)> {
        let period = self.beat_period();
        if period <= 0.0 || !(end > start) {
            return Vec::new();
        }
        let first = ((start - self.t0) / period).ceil() as i64;
        let bar = self.beats_per_bar.max(1) as i64;
        let mut lines = Vec::new();
        let mut k = first;
        loop {
            let t = self.t0 + k as f64 * period;
            if t >= end {
                break;
            }
            lines.push((t, k.rem_euclid(bar) == 0));
            k += 1;
        }
        lines
    }
}

/// Copy of everything published on the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub valid: bool,
    pub playing: bool,
    pub stereo: bool,
    pub sample_rate: u32,
    pub total_frames: u64,
    pub current_frame: u64,
    pub playback_rate: f64,
    pub view: ViewHints,
    pub grid: GridOverlay,
    pub stem_playback_enabled: bool,
    pub stem_enabled: [bool; NUM_STEMS],
    pub eq_low_db: f64,
    pub eq_mid_db: f64,
    pub eq_high_db: f64,
    pub master_gain_db: f64,
}

impl PlaybackSnapshot {
    /// Playhead position in seconds
    pub fn current_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.current_frame as f64 / self.sample_rate as f64
    }

    /// Track length in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_frames as f64 / self.sample_rate as f64
    }
}

/// Lock-free shared playback state
#[derive(Debug)]
pub struct PlaybackBridge {
    valid: AtomicBool,
    playing: AtomicBool,
    stereo: AtomicBool,
    sample_rate: AtomicU32,
    total_frames: AtomicU64,
    current_frame: AtomicU64,
    playback_rate: AtomicF64,

    zoom: AtomicF64,
    pan_offset_frames: AtomicF64,
    playhead_x_ratio: AtomicF64,

    grid_enabled: AtomicBool,
    grid_bpm: AtomicF64,
    grid_t0: AtomicF64,
    grid_beats_per_bar: AtomicU32,
    grid_audio_start: AtomicF64,
    grid_approx_onset: AtomicF64,
    grid_kick_attack: AtomicF64,

    stem_playback_enabled: AtomicBool,
    stem_enabled: [AtomicBool; NUM_STEMS],
    eq_low_db: AtomicF64,
    eq_mid_db: AtomicF64,
    eq_high_db: AtomicF64,
    master_gain_db: AtomicF64,
}

impl Default for PlaybackBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackBridge {
    pub fn new() -> Self {
        let view = ViewHints::default();
        Self {
            valid: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            stereo: AtomicBool::new(false),
            sample_rate: AtomicU32::new(0),
            total_frames: AtomicU64::new(0),
            current_frame: AtomicU64::new(0),
            playback_rate: AtomicF64::new(1.0),
            zoom: AtomicF64::new(view.zoom),
            pan_offset_frames: AtomicF64::new(view.pan_offset_frames),
            playhead_x_ratio: AtomicF64::new(view.playhead_x_ratio),
            grid_enabled: AtomicBool::new(false),
            grid_bpm: AtomicF64::new(0.0),
            grid_t0: AtomicF64::new(0.0),
            grid_beats_per_bar: AtomicU32::new(DEFAULT_BEATS_PER_BAR),
            grid_audio_start: AtomicF64::new(0.0),
            grid_approx_onset: AtomicF64::new(0.0),
            grid_kick_attack: AtomicF64::new(0.0),
            stem_playback_enabled: AtomicBool::new(false),
            stem_enabled: std::array::from_fn(|_| AtomicBool::new(true)),
            eq_low_db: AtomicF64::new(0.0),
            eq_mid_db: AtomicF64::new(0.0),
            eq_high_db: AtomicF64::new(0.0),
            master_gain_db: AtomicF64::new(0.0),
        }
    }

    /// Publish the stream format of a freshly bound track
    pub fn publish_format(&self, sample_rate: u32, stereo: bool, total_frames: u64) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.stereo.store(stereo, Ordering::Relaxed);
        self.total_frames.store(total_frames, Ordering::Relaxed);
        self.valid.store(true, Ordering::Relaxed);
    }

    /// Publish playhead and transport state (safe from the audio thread)
    #[inline]
    pub fn publish_transport(&self, playing: bool, current_frame: u64) {
        self.current_frame.store(current_frame, Ordering::Relaxed);
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub fn publish_rate(&self, rate: f64) {
        self.playback_rate.store(rate);
    }

    /// Publish the routing and gain part of a mix configuration
    pub fn publish_mix(&self, config: &MixConfiguration) {
        self.stem_playback_enabled
            .store(config.stem_playback_enabled, Ordering::Relaxed);
        for (flag, &enabled) in self.stem_enabled.iter().zip(config.stem_enabled.iter()) {
            flag.store(enabled, Ordering::Relaxed);
        }
        self.eq_low_db.store(config.eq_low_db);
        self.eq_mid_db.store(config.eq_mid_db);
        self.eq_high_db.store(config.eq_high_db);
        self.master_gain_db.store(config.master_gain_db);
    }

    /// View hints from the visualizer
    pub fn set_view(&self, view: ViewHints) {
        self.zoom.store(view.zoom);
        self.pan_offset_frames.store(view.pan_offset_frames);
        self.playhead_x_ratio.store(view.playhead_x_ratio);
    }

    /// Install the beat-grid overlay
    pub fn set_grid(&self, grid: GridOverlay) {
        self.grid_bpm.store(grid.bpm);
        self.grid_t0.store(grid.t0);
        self.grid_beats_per_bar
            .store(grid.beats_per_bar.max(1), Ordering::Relaxed);
        self.grid_audio_start.store(grid.audio_start);
        self.grid_approx_onset.store(grid.approx_onset);
        self.grid_kick_attack.store(grid.kick_attack);
        self.grid_enabled.store(grid.enabled, Ordering::Relaxed);
    }

    /// Hide the beat-grid overlay
    pub fn clear_grid(&self) {
        self.grid_enabled.store(false, Ordering::Relaxed);
    }

    /// Mark the published state stale (engine shut down)
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Relaxed);
        self.playing.store(false, Ordering::Relaxed);
        self.current_frame.store(0, Ordering::Relaxed);
        self.total_frames.store(0, Ordering::Relaxed);
    }

    /// Whether a track is currently bound
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    /// Copy out everything currently published
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            valid: self.valid.load(Ordering::Relaxed),
            playing: self.playing.load(Ordering::Relaxed),
            stereo: self.stereo.load(Ordering::Relaxed),
            sample_rate: self.sample_rate.load(Ordering::Relaxed),
            total_frames: self.total_frames.load(Ordering::Relaxed),
            current_frame: self.current_frame.load(Ordering::Relaxed),
            playback_rate: self.playback_rate.load(),
            view: ViewHints {
                zoom: self.zoom.load(),
                pan_offset_frames: self.pan_offset_frames.load(),
                playhead_x_ratio: self.playhead_x_ratio.load(),
            },
            grid: GridOverlay {
                enabled: self.grid_enabled.load(Ordering::Relaxed),
                bpm: self.grid_bpm.load(),
                t0: self.grid_t0.load(),
                beats_per_bar: self.grid_beats_per_bar.load(Ordering::Relaxed),
                audio_start: self.grid_audio_start.load(),
                approx_onset: self.grid_approx_onset.load(),
                kick_attack: self.grid_kick_attack.load(),
            },
            stem_playback_enabled: self.stem_playback_enabled.load(Ordering::Relaxed),
            stem_enabled: std::array::from_fn(|i| self.stem_enabled[i].load(Ordering::Relaxed)),
            eq_low_db: self.eq_low_db.load(),
            eq_mid_db: self.eq_mid_db.load(),
            eq_high_db: self.eq_high_db.load(),
            master_gain_db: self.master_gain_db.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate() -> BeatGridEstimate {
        BeatGridEstimate {
            bpm: 120.0,
            t0: 1.0,
            audio_start: 1.0,
            approx_onset: 1.01,
            kick_attack: 0.995,
        }
    }

    #[test]
    fn test_snapshot_defaults() {
        let bridge = PlaybackBridge::new();
        let snap = bridge.snapshot();
        assert!(!snap.valid);
        assert!(!snap.playing);
        assert_eq!(snap.playback_rate, 1.0);
        assert_eq!(snap.view, ViewHints::default());
        assert!(!snap.grid.enabled);
        assert_eq!(snap.stem_enabled, [true; NUM_STEMS]);
    }

    #[test]
    fn test_publish_and_invalidate() {
        let bridge = PlaybackBridge::new();
        bridge.publish_format(44100, true, 441_000);
        bridge.publish_transport(true, 22050);
        bridge.publish_rate(1.5);
        let snap = bridge.snapshot();
        assert!(snap.valid && snap.playing && snap.stereo);
        assert_eq!(snap.current_frame, 22050);
        assert_eq!(snap.playback_rate, 1.5);
        assert!((snap.current_seconds() - 0.5).abs() < 1e-12);
        assert!((snap.duration_seconds() - 10.0).abs() < 1e-12);

        bridge.invalidate();
        let snap = bridge.snapshot();
        assert!(!snap.valid);
        assert!(!snap.playing);
        assert_eq!(snap.total_frames, 0);
    }

    #[test]
    fn test_mix_and_view() {
        let bridge = PlaybackBridge::new();
        let mut config = MixConfiguration::default();
        config.stem_playback_enabled = true;
        config.stem_enabled = [true, false, true, false];
        config.eq_mid_db = -4.5;
        config.master_gain_db = 2.0;
        bridge.publish_mix(&config);
        bridge.set_view(ViewHints { zoom: 4.0, pan_offset_frames: 1000.0, playhead_x_ratio: 0.25 });

        let snap = bridge.snapshot();
        assert!(snap.stem_playback_enabled);
        assert_eq!(snap.stem_enabled, [true, false, true, false]);
        assert_eq!(snap.eq_mid_db, -4.5);
        assert_eq!(snap.master_gain_db, 2.0);
        assert_eq!(snap.view.zoom, 4.0);
        assert_eq!(snap.view.playhead_x_ratio, 0.25);
    }

    #[test]
    fn test_grid_overlay() {
        let bridge = PlaybackBridge::new();
        bridge.set_grid(GridOverlay::from_estimate(&estimate(), 4));
        let grid = bridge.snapshot().grid;
        assert!(grid.enabled);
        assert_eq!(grid.bpm, 120.0);
        assert_eq!(grid.kick_attack, 0.995);

        let lines = grid.beats_in_range(0.25, 3.0);
        let times: Vec<f64> = lines.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0.5, 1.0, 1.5, 2.0, 2.5]);
        // Beat 0 sits at t0 and is a downbeat; the one before is beat -1
        assert_eq!(lines[1], (1.0, true));
        assert!(!lines[0].1);
        assert_eq!(lines[4].1, false);

        bridge.clear_grid();
        assert!(!bridge.snapshot().grid.enabled);
    }

    #[test]
    fn test_zero_bpm_disables_grid() {
        let mut est = estimate();
        est.bpm = 0.0;
        let grid = GridOverlay::from_estimate(&est, 4);
        assert!(!grid.enabled);
        assert!(grid.beats_in_range(0.0, 10.0).is_empty());
    }
}
