//! Command-line definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stemscope_core::engine::MixConfiguration;

/// Stemscope - stem mixer with tempo and beat-grid analysis
#[derive(Parser, Debug)]
#[command(name = "stemscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate tempo and beat grid of a track
    Analyze {
        /// Audio file (WAV, FLAC, MP3, OGG)
        file: PathBuf,

        /// Beats per bar used when printing bar lines
        #[arg(long, default_value_t = 4)]
        beats_per_bar: u32,

        /// Number of grid lines to print
        #[arg(long, default_value_t = 8)]
        lines: usize,
    },

    /// Play a track through the output device
    Play {
        file: PathBuf,

        #[command(flatten)]
        mix: MixArgs,
    },

    /// Render a track offline to a PCM16 WAV file
    Bounce {
        file: PathBuf,

        /// Output WAV path
        output: PathBuf,

        #[command(flatten)]
        mix: MixArgs,
    },

    /// List output devices
    Devices,
}

/// Mix settings shared by `play` and `bounce`
#[derive(Args, Debug, Clone)]
pub struct MixArgs {
    /// Directory with vocals.wav, drums.wav, bass.wav and other.wav
    #[arg(long)]
    pub stems: Option<PathBuf>,

    /// Mute a stem (repeatable): vocals, drums, bass, other
    #[arg(long = "mute", value_name = "STEM")]
    pub muted: Vec<String>,

    /// Low shelf gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eq_low: f64,

    /// Mid peak gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eq_mid: f64,

    /// High shelf gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub eq_high: f64,

    /// Master gain in dB
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub gain: f64,

    /// Playback rate (0.125 - 4.0)
    #[arg(long, default_value_t = 1.0)]
    pub rate: f64,

    /// Play the main track when no stem is muted
    #[arg(long)]
    pub prefer_main: bool,
}

impl MixArgs {
    /// Mix configuration without sources attached
    pub fn to_mix_configuration(&self) -> MixConfiguration {
        let mut config = MixConfiguration::default()
            .with_eq(self.eq_low, self.eq_mid, self.eq_high)
            .with_master_gain(self.gain);
        config.prefer_main_when_all_stems_on = self.prefer_main;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bounce_with_mix_flags() {
        let cli = Cli::try_parse_from([
            "stemscope", "bounce", "in.wav", "out.wav", "--eq-low", "-6", "--gain", "-3",
            "--mute", "vocals", "--rate", "1.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Bounce { file, output, mix } => {
                assert_eq!(file, PathBuf::from("in.wav"));
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(mix.eq_low, -6.0);
                assert_eq!(mix.gain, -3.0);
                assert_eq!(mix.rate, 1.5);
                assert_eq!(mix.muted, vec!["vocals".to_string()]);
                assert!(!mix.prefer_main);

                let config = mix.to_mix_configuration();
                assert_eq!(config.eq_low_db, -6.0);
                assert_eq!(config.master_gain_db, -3.0);
                assert!(!config.prefer_main_when_all_stems_on);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze_defaults() {
        let cli = Cli::try_parse_from(["stemscope", "analyze", "track.flac"]).unwrap();
        match cli.command {
            Commands::Analyze { beats_per_bar, lines, .. } => {
                assert_eq!(beats_per_bar, 4);
                assert_eq!(lines, 8);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
