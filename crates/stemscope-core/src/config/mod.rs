//! Application configuration
//!
//! One YAML file holds every tunable section:
//!
//! ```yaml
//! audio:
//!   backend: auto
//!   buffer_size: !fixed 512
//! eq:
//!   low_freq_hz: 220.0
//! tempo:
//!   drift_lambda: 0.25
//!   snap: !decimal 1
//! ```
//!
//! Missing sections and fields fall back to their defaults, so a partial
//! file (or none at all) is always valid.

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};

use serde::{Deserialize, Serialize};

use crate::analysis::TempoConfig;
use crate::audio::AudioConfig;
use crate::dsp::EqConfig;

/// Top-level stemscope configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub eq: EqConfig,
    pub tempo: TempoConfig,
}

impl AppConfig {
    /// Load from the default location
    pub fn load_default() -> Self {
        let mut config: Self = load_config(&default_config_path());
        config.tempo.validate();
        config
    }
}
