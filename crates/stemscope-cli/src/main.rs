//! Stemscope - play, bounce and analyze stem tracks from the command line
//!
//! ## Commands
//!
//! - `analyze <file>`: tempo and beat-grid anchors
//! - `play <file>`: device playback with stem mix, EQ, gain and rate
//! - `bounce <file> <out.wav>`: the same mix rendered offline
//! - `devices`: list output devices

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use stemscope_core::config::{default_config_path, load_config, AppConfig};

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("stemscope v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config: AppConfig = load_config(&config_path);
    config.tempo.validate();

    match cli.command {
        Commands::Analyze {
            file,
            beats_per_bar,
            lines,
        } => commands::analyze(&config, &file, beats_per_bar, lines),
        Commands::Play { file, mix } => commands::play(&config, &file, &mix),
        Commands::Bounce { file, output, mix } => commands::bounce(&config, &file, &output, &mix),
        Commands::Devices => commands::devices(),
    }
}
