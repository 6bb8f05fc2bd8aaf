//! Live mix configuration and render-path selection

use super::source::AudioSource;
use crate::types::{Stem, NUM_STEMS};

/// Snapshot of routing and gain consumed by the audio callback
///
/// Built on the control thread and swapped into the engine as a whole.
#[derive(Debug, Clone)]
pub struct MixConfiguration {
    /// Main track; None means "the source the engine was initialized with"
    pub main: Option<AudioSource>,
    /// Play the stems instead of the main track
    pub stem_playback_enabled: bool,
    /// Stem sources indexed by [`Stem::index`]
    pub stems: [Option<AudioSource>; NUM_STEMS],
    pub stem_enabled: [bool; NUM_STEMS],
    /// Play the main track when every stem is switched on
    pub prefer_main_when_all_stems_on: bool,
    pub eq_low_db: f64,
    pub eq_mid_db: f64,
    pub eq_high_db: f64,
    pub master_gain_db: f64,
}

impl Default for MixConfiguration {
    fn default() -> Self {
        Self {
            main: None,
            stem_playback_enabled: false,
            stems: Default::default(),
            stem_enabled: [true; NUM_STEMS],
            prefer_main_when_all_stems_on: true,
            eq_low_db: 0.0,
            eq_mid_db: 0.0,
            eq_high_db: 0.0,
            master_gain_db: 0.0,
        }
    }
}

impl MixConfiguration {
    /// Builder: attach a stem source
    pub fn with_stem(mut self, stem: Stem, source: AudioSource) -> Self {
        self.stems[stem.index()] = Some(source);
        self
    }

    /// Builder: set the three EQ gains in dB
    pub fn with_eq(mut self, low_db: f64, mid_db: f64, high_db: f64) -> Self {
        self.eq_low_db = low_db;
        self.eq_mid_db = mid_db;
        self.eq_high_db = high_db;
        self
    }

    /// Builder: set master gain in dB
    pub fn with_master_gain(mut self, gain_db: f64) -> Self {
        self.master_gain_db = gain_db;
        self
    }

    pub fn set_stem_enabled(&mut self, stem: Stem, enabled: bool) {
        self.stem_enabled[stem.index()] = enabled;
    }

    pub fn all_stems_enabled(&self) -> bool {
        self.stem_enabled.iter().all(|&on| on)
    }

    /// Which signal the callback will render
    pub fn render_path(&self) -> RenderPath {
        if !self.stem_playback_enabled
            || (self.prefer_main_when_all_stems_on && self.all_stems_enabled())
        {
            RenderPath::Direct
        } else {
            RenderPath::StemSum
        }
    }
}

/// Signal path chosen per callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// Main track verbatim
    Direct,
    /// Sum of the enabled stems
    StemSum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MixConfiguration::default();
        assert!(config.main.is_none());
        assert!(config.all_stems_enabled());
        assert!(config.prefer_main_when_all_stems_on);
        assert_eq!(config.render_path(), RenderPath::Direct);
    }

    #[test]
    fn test_render_path_selection() {
        let mut config = MixConfiguration::default();
        config.stem_playback_enabled = true;
        // All four on and prefer-main set: direct
        assert_eq!(config.render_path(), RenderPath::Direct);

        config.prefer_main_when_all_stems_on = false;
        assert_eq!(config.render_path(), RenderPath::StemSum);

        config.prefer_main_when_all_stems_on = true;
        config.set_stem_enabled(Stem::Vocals, false);
        assert_eq!(config.render_path(), RenderPath::StemSum);

        config.stem_playback_enabled = false;
        assert_eq!(config.render_path(), RenderPath::Direct);
    }

    #[test]
    fn test_builders() {
        let drums = AudioSource::new("drums", vec![0i16; 4], 44100, 2);
        let config = MixConfiguration::default()
            .with_stem(Stem::Drums, drums)
            .with_eq(1.0, -2.0, 3.0)
            .with_master_gain(-6.0);
        assert!(config.stems[Stem::Drums.index()].is_some());
        assert!(config.stems[Stem::Vocals.index()].is_none());
        assert_eq!(config.eq_mid_db, -2.0);
        assert_eq!(config.master_gain_db, -6.0);
    }
}
