//! Audio engine - control-thread API of the mixer
//!
//! Owns the output backend and the state shared with the device thread.
//! Every mutating call takes the mix lock briefly; reads of the cursor and
//! transport flags are relaxed atomic loads.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::error::{EngineError, EngineResult};
use super::mix::MixConfiguration;
use super::render::{render_mono_window, Renderer, Shared, DEFAULT_CHANNELS};
use super::source::AudioSource;
use crate::audio::{AudioBackend, StreamFormat};
use crate::bridge::PlaybackBridge;
use crate::dsp::EqConfig;
use crate::types::DEFAULT_SAMPLE_RATE;

/// Slowest accepted playback rate
pub const MIN_PLAYBACK_RATE: f64 = 0.125;
/// Fastest accepted playback rate
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Stem/main mixer with 3-band EQ, master gain and variable-rate playback
pub struct AudioEngine {
    backend: Box<dyn AudioBackend>,
    shared: Arc<Shared>,
}

impl AudioEngine {
    /// Create an engine that renders through `backend`
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_options(backend, EqConfig::default(), None)
    }

    /// Create an engine that also publishes its state on `bridge`
    pub fn with_bridge(backend: Box<dyn AudioBackend>, bridge: Arc<PlaybackBridge>) -> Self {
        Self::with_options(backend, EqConfig::default(), Some(bridge))
    }

    /// Create an engine with custom EQ band placement
    pub fn with_options(
        backend: Box<dyn AudioBackend>,
        eq_config: EqConfig,
        bridge: Option<Arc<PlaybackBridge>>,
    ) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared::new(eq_config, bridge)),
        }
    }

    /// Handle to the render function (for offline rendering and tests)
    pub fn renderer(&self) -> Renderer {
        Renderer {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Name of the output backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Bind `source` as the main track and open the device at its format
    ///
    /// On success the cursor is at 0, the rate is 1.0, playback is stopped
    /// and no live mix configuration is set. On failure the engine is left
    /// fully reset.
    pub fn initialize(&mut self, source: AudioSource) -> EngineResult<()> {
        if self.is_initialized() {
            self.shutdown();
        }
        validate_source(&source)?;

        let format = StreamFormat::new(source.sample_rate(), source.channels());
        let total_frames = source.frames() as u64;
        let stereo = source.is_stereo();
        let name = source.name().to_string();

        {
            let mut state = self.shared.lock();
            state.source = Some(source);
            state.config = None;
            state.cursor = 0.0;
            state.sample_rate = format.sample_rate;
            state.channels = format.channels;
            state.eq.reset();
            state.eq.invalidate();
        }
        self.shared.current_frame.store(0, Ordering::Relaxed);
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.store_playback_rate(1.0);

        let renderer = self.renderer();
        let opened = self
            .backend
            .open(format, Box::new(move |buf: &mut [i16]| renderer.render(buf)))
            .and_then(|_| self.backend.start());
        if let Err(e) = opened {
            log::error!(
                "AudioEngine::initialize: failed to open {} backend at {}Hz/{}ch: {}",
                self.backend.name(),
                format.sample_rate,
                format.channels,
                e
            );
            self.backend.close();
            self.reset_state();
            return Err(e.into());
        }

        self.shared.initialized.store(true, Ordering::Release);

        if let Some(bridge) = &self.shared.bridge {
            bridge.publish_format(format.sample_rate, stereo, total_frames);
            bridge.publish_transport(false, 0);
            bridge.publish_rate(1.0);
            bridge.publish_mix(&MixConfiguration::default());
        }

        log::info!(
            "AudioEngine::initialize: '{}' {} frames at {}Hz, {} channel(s) on {}",
            name,
            total_frames,
            format.sample_rate,
            format.channels,
            self.backend.name()
        );
        Ok(())
    }

    /// Swap the main source, keeping position and play state
    ///
    /// A source with a different rate or channel count reopens the device.
    pub fn replace_source(&mut self, source: AudioSource) -> EngineResult<()> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        validate_source(&source)?;

        let was_playing = self.is_playing();
        let frame = self.current_frame();
        let (old_source, same_format) = {
            let state = self.shared.lock();
            (
                state.source.clone(),
                state.sample_rate == source.sample_rate() && state.channels == source.channels(),
            )
        };

        if !same_format {
            log::info!(
                "AudioEngine::replace_source: format change to {}Hz/{}ch, reopening device",
                source.sample_rate(),
                source.channels()
            );
            let live = self.shared.lock().config.clone();
            self.initialize(source.clone())?;
            if let Some(mut config) = live {
                if points_at(&config.main, old_source.as_ref()) {
                    config.main = Some(source);
                }
                self.set_mix_configuration(config)?;
            }
            self.seek_frame(frame);
            if was_playing {
                self.play()?;
            }
            return Ok(());
        }

        let (stale_source, stale_main) = {
            let mut state = self.shared.lock();
            let stale_main = match state.config.as_mut() {
                Some(config) if points_at(&config.main, old_source.as_ref()) => {
                    config.main.replace(source.clone())
                }
                _ => None,
            };
            let stale_source = state.source.replace(source);
            state.eq.invalidate();
            state.eq.reset();
            (stale_source, stale_main)
        };
        // Release the old buffers outside the lock
        drop(stale_source);
        drop(stale_main);

        self.seek_frame(frame);
        if let Some(bridge) = &self.shared.bridge {
            let state = self.shared.lock();
            bridge.publish_format(state.sample_rate, state.channels == 2, state.total_frames() as u64);
        }
        log::debug!("AudioEngine::replace_source: swapped source in place at frame {}", frame);
        Ok(())
    }

    /// Replace the live mix configuration
    ///
    /// A configuration without a main source plays the bound source.
    pub fn set_mix_configuration(&mut self, mut config: MixConfiguration) -> EngineResult<()> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        if let Some(bridge) = &self.shared.bridge {
            bridge.publish_mix(&config);
        }

        let previous = {
            let mut state = self.shared.lock();
            if config.main.is_none() {
                config.main = state.source.clone();
            }
            state.eq.invalidate();
            state.config.replace(config)
        };
        drop(previous);
        Ok(())
    }

    /// Current live mix configuration, if one was set
    pub fn mix_configuration(&self) -> Option<MixConfiguration> {
        self.shared.lock().config.clone()
    }

    /// Stop the device, then release sources and reset all state
    pub fn shutdown(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.initialized.store(false, Ordering::Release);

        self.backend.stop();
        self.backend.close();
        self.reset_state();

        if let Some(bridge) = &self.shared.bridge {
            bridge.invalidate();
        }
        log::debug!("AudioEngine::shutdown: device closed, sources released");
    }

    fn reset_state(&mut self) {
        let (source, config) = {
            let mut state = self.shared.lock();
            state.cursor = 0.0;
            state.sample_rate = DEFAULT_SAMPLE_RATE;
            state.channels = DEFAULT_CHANNELS;
            state.eq.reset();
            state.eq.invalidate();
            (state.source.take(), state.config.take())
        };
        drop(source);
        drop(config);

        self.shared.initialized.store(false, Ordering::Release);
        self.shared.playing.store(false, Ordering::Relaxed);
        self.shared.current_frame.store(0, Ordering::Relaxed);
        self.shared.store_playback_rate(1.0);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    /// Start playback, rewinding first when the cursor is at the end
    pub fn play(&mut self) -> EngineResult<()> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        let at_end = {
            let state = self.shared.lock();
            state.cursor >= state.total_frames() as f64
        };
        if at_end {
            self.seek_frame(0);
        }
        self.shared.playing.store(true, Ordering::Relaxed);
        if let Some(bridge) = &self.shared.bridge {
            bridge.publish_transport(true, self.current_frame());
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        if let Some(bridge) = &self.shared.bridge {
            bridge.publish_transport(false, self.current_frame());
        }
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        self.pause();
        self.seek_frame(0);
    }

    /// Move the cursor to `frame`, clamped to `[0, total - 1]`
    ///
    /// Clears EQ filter memory so the jump does not ring.
    pub fn seek_frame(&mut self, frame: u64) {
        let mut state = self.shared.lock();
        let total = state.total_frames() as u64;
        let target = if total == 0 { 0 } else { frame.min(total - 1) };
        state.cursor = target as f64;
        state.eq.reset();
        self.shared.publish_frame(target);
    }

    /// Set the playback rate; non-finite or non-positive rates are refused
    ///
    /// Accepted rates are clamped to `[0.125, 4.0]`.
    pub fn set_playback_rate(&mut self, rate: f64) -> EngineResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::InvalidPlaybackRate(rate));
        }
        let clamped = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        self.shared.store_playback_rate(clamped);
        if let Some(bridge) = &self.shared.bridge {
            bridge.publish_rate(clamped);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn playback_rate(&self) -> f64 {
        self.shared.playback_rate()
    }

    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.shared.current_frame.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    /// Timeline length in frames (0 when nothing is bound)
    pub fn total_frames(&self) -> u64 {
        self.shared.lock().total_frames() as u64
    }

    /// Device sample rate (0 when not initialized)
    pub fn sample_rate(&self) -> u32 {
        if !self.is_initialized() {
            return 0;
        }
        self.shared.lock().sample_rate
    }

    pub fn is_stereo(&self) -> bool {
        self.is_initialized() && self.shared.lock().channels == 2
    }

    /// Mono analysis window of the current output signal around a frame
    ///
    /// Uses the live routing, EQ and gain with fresh filter memory; live
    /// playback state is not touched. None when nothing is bound.
    pub fn render_mono_window(&self, center_frame: f64, frame_count: usize) -> Option<Vec<f64>> {
        if !self.is_initialized() || frame_count == 0 || !center_frame.is_finite() {
            return None;
        }
        let (main, config, eq_config, sample_rate) = {
            let state = self.shared.lock();
            (
                state.main()?.clone(),
                state.config.clone(),
                state.eq.config().clone(),
                state.sample_rate,
            )
        };
        Some(render_mono_window(
            &main,
            config.as_ref(),
            eq_config,
            sample_rate,
            self.playback_rate(),
            center_frame,
            frame_count,
        ))
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.is_initialized() || self.backend.is_open() {
            self.shutdown();
        }
    }
}

fn validate_source(source: &AudioSource) -> EngineResult<()> {
    if source.channels() != 1 && source.channels() != 2 {
        return Err(EngineError::InvalidChannels(source.channels()));
    }
    if source.sample_rate() == 0 {
        return Err(EngineError::InvalidSampleRate(source.sample_rate()));
    }
    if source.frames() == 0 {
        return Err(EngineError::EmptySource);
    }
    Ok(())
}

/// Whether `main` is unset or shares its buffer with `old`
fn points_at(main: &Option<AudioSource>, old: Option<&AudioSource>) -> bool {
    match (main, old) {
        (None, _) => true,
        (Some(m), Some(o)) => m.same_buffer(o),
        (Some(_), None) => false,
    }
}
