//! Real-time render path
//!
//! [`Renderer::render`] is what the device thread calls. It zero-fills the
//! buffer, takes the shared lock for exactly one buffer, and publishes the
//! cursor through relaxed atomics. Nothing in here allocates, logs or does
//! I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::mix::{MixConfiguration, RenderPath};
use super::source::AudioSource;
use crate::bridge::PlaybackBridge;
use crate::dsp::{db_to_linear, norm_to_pcm16, EqConfig, ThreeBandEq, GAIN_EPSILON_DB};
use crate::types::{StereoFrame, DEFAULT_SAMPLE_RATE};

/// Channel count assumed while nothing is bound
pub(crate) const DEFAULT_CHANNELS: u16 = 2;

/// State guarded by the engine lock
pub(crate) struct MixState {
    /// Source bound by `initialize`/`replace_source`
    pub(crate) source: Option<AudioSource>,
    /// Live configuration, None until the first `set_mix_configuration`
    pub(crate) config: Option<MixConfiguration>,
    pub(crate) eq: ThreeBandEq,
    /// Fractional timeline position in device frames
    pub(crate) cursor: f64,
    /// Device format
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

/// Where a rendered block left the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockEnd {
    pub(crate) frame: u64,
    pub(crate) finished: bool,
}

impl MixState {
    pub(crate) fn new(eq_config: EqConfig) -> Self {
        Self {
            source: None,
            config: None,
            eq: ThreeBandEq::new(eq_config),
            cursor: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }

    /// Source that defines the timeline
    pub(crate) fn main(&self) -> Option<&AudioSource> {
        self.config
            .as_ref()
            .and_then(|c| c.main.as_ref())
            .or(self.source.as_ref())
    }

    pub(crate) fn total_frames(&self) -> usize {
        self.main().map_or(0, AudioSource::frames)
    }

    /// Render one device buffer; `out` is already silent
    pub(crate) fn render_block(&mut self, out: &mut [i16], rate: f64) -> Option<BlockEnd> {
        let MixState {
            source,
            config,
            eq,
            cursor,
            sample_rate,
            channels,
        } = self;

        let ch = *channels as usize;
        let out_rate = *sample_rate;
        if ch == 0 || out_rate == 0 {
            return None;
        }

        let config = config.as_ref();
        let main = config.and_then(|c| c.main.as_ref()).or(source.as_ref())?;
        let total = main.frames();
        if total == 0 {
            return None;
        }
        let total_f = total as f64;

        let mut pos = if cursor.is_finite() { cursor.max(0.0) } else { 0.0 };
        if pos >= total_f {
            *cursor = total_f;
            return Some(BlockEnd {
                frame: (total - 1) as u64,
                finished: true,
            });
        }

        let path = config.map_or(RenderPath::Direct, MixConfiguration::render_path);
        let (low, mid, high, gain_db) = config.map_or((0.0, 0.0, 0.0, 0.0), |c| {
            (c.eq_low_db, c.eq_mid_db, c.eq_high_db, c.master_gain_db)
        });
        let eq_active = ThreeBandEq::is_active(low, mid, high);
        if eq_active {
            eq.prepare(out_rate, low, mid, high);
        }
        let gain = (gain_db.abs() > GAIN_EPSILON_DB).then(|| db_to_linear(gain_db));

        for frame_out in out.chunks_exact_mut(ch) {
            if pos >= total_f {
                break;
            }
            let mut frame = match (path, config) {
                (RenderPath::StemSum, Some(c)) => stem_sum(c, pos, out_rate),
                _ => main.frame_at(pos, out_rate),
            };
            if eq_active {
                frame = eq.process(frame);
            }
            if let Some(g) = gain {
                frame *= g;
            }
            write_frame(frame_out, frame);
            pos += rate;
        }

        *cursor = pos;
        Some(BlockEnd {
            frame: (pos.floor() as u64).min((total - 1) as u64),
            finished: pos >= total_f,
        })
    }
}

/// Sum of the enabled stems at one timeline position
#[inline]
fn stem_sum(config: &MixConfiguration, pos: f64, out_rate: u32) -> StereoFrame {
    let mut sum = StereoFrame::silence();
    for (stem, &enabled) in config.stems.iter().zip(config.stem_enabled.iter()) {
        if let (true, Some(src)) = (enabled, stem) {
            sum += src.frame_at(pos, out_rate);
        }
    }
    sum
}

#[inline]
fn write_frame(out: &mut [i16], frame: StereoFrame) {
    match out {
        [mono] => *mono = norm_to_pcm16(frame.mid()),
        [l, r, ..] => {
            *l = norm_to_pcm16(frame.left);
            *r = norm_to_pcm16(frame.right);
        }
        [] => {}
    }
}

/// Engine state shared with the device thread
pub(crate) struct Shared {
    pub(crate) state: Mutex<MixState>,
    pub(crate) current_frame: AtomicU64,
    pub(crate) playing: AtomicBool,
    pub(crate) initialized: AtomicBool,
    rate_bits: AtomicU64,
    pub(crate) bridge: Option<Arc<PlaybackBridge>>,
}

impl Shared {
    pub(crate) fn new(eq_config: EqConfig, bridge: Option<Arc<PlaybackBridge>>) -> Self {
        Self {
            state: Mutex::new(MixState::new(eq_config)),
            current_frame: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            rate_bits: AtomicU64::new(1.0_f64.to_bits()),
            bridge,
        }
    }

    /// Lock the mix state, recovering from a poisoned lock
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, MixState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn playback_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store_playback_rate(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// Publish the cursor to readers (call with the lock held)
    #[inline]
    pub(crate) fn publish_frame(&self, frame: u64) {
        self.current_frame.store(frame, Ordering::Relaxed);
        if let Some(bridge) = &self.bridge {
            bridge.publish_transport(self.playing.load(Ordering::Relaxed), frame);
        }
    }
}

/// Cloneable handle to the engine's render function
///
/// Installed into the backend as its callback; tests and offline bounces
/// call [`render`](Self::render) directly.
#[derive(Clone)]
pub struct Renderer {
    pub(crate) shared: Arc<Shared>,
}

impl Renderer {
    /// Fill `out` (interleaved PCM16 at the device channel count)
    pub fn render(&self, out: &mut [i16]) {
        out.fill(0);

        let shared = &*self.shared;
        if !shared.initialized.load(Ordering::Acquire) || !shared.playing.load(Ordering::Relaxed) {
            return;
        }
        let rate = shared.playback_rate();

        let mut state = shared.lock();
        if let Some(end) = state.render_block(out, rate) {
            if end.finished {
                shared.playing.store(false, Ordering::Relaxed);
            }
            shared.publish_frame(end.frame);
        }
    }
}

/// Render a mono window of the output signal without touching live state
///
/// Frame `i` of the window sits at `center + (i - count/2) * rate` on the
/// timeline. EQ starts from fresh filter memory.
pub(crate) fn render_mono_window(
    main: &AudioSource,
    config: Option<&MixConfiguration>,
    eq_config: EqConfig,
    out_rate: u32,
    rate: f64,
    center: f64,
    count: usize,
) -> Vec<f64> {
    let path = config.map_or(RenderPath::Direct, MixConfiguration::render_path);
    let (low, mid, high, gain_db) = config.map_or((0.0, 0.0, 0.0, 0.0), |c| {
        (c.eq_low_db, c.eq_mid_db, c.eq_high_db, c.master_gain_db)
    });
    let mut eq = ThreeBandEq::new(eq_config);
    let eq_active = ThreeBandEq::is_active(low, mid, high);
    if eq_active {
        eq.prepare(out_rate, low, mid, high);
    }
    let gain = (gain_db.abs() > GAIN_EPSILON_DB).then(|| db_to_linear(gain_db));

    let start = center - (count / 2) as f64 * rate;
    (0..count)
        .map(|i| {
            let pos = start + i as f64 * rate;
            let mut frame = match (path, config) {
                (RenderPath::StemSum, Some(c)) => stem_sum(c, pos, out_rate),
                _ => main.frame_at(pos, out_rate),
            };
            if eq_active {
                frame = eq.process(frame);
            }
            if let Some(g) = gain {
                frame *= g;
            }
            frame.mid().clamp(-1.0, 1.0)
        })
        .collect()
}
