//! Command implementations

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use stemscope_core::analysis::TempoEstimator;
use stemscope_core::audio::{default_backend, output_devices, NullBackend};
use stemscope_core::audio_file::{decode_pcm16, load_stems, mono_f64, write_wav_pcm16};
use stemscope_core::bridge::{GridOverlay, PlaybackBridge};
use stemscope_core::config::AppConfig;
use stemscope_core::engine::{AudioEngine, AudioSource, MixConfiguration};
use stemscope_core::Stem;

use crate::cli::MixArgs;

/// Frames rendered per offline block
const BOUNCE_BLOCK_FRAMES: usize = 4096;

/// Progress poll interval while playing
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn load_track(path: &Path) -> Result<AudioSource> {
    decode_pcm16(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Resolve a `--mute` argument to a stem
fn parse_stem(name: &str) -> Result<Stem> {
    Stem::ALL
        .into_iter()
        .find(|s| s.file_stem().eq_ignore_ascii_case(name) || s.name().eq_ignore_ascii_case(name))
        .with_context(|| format!("Unknown stem '{}' (expected vocals, drums, bass or other)", name))
}

/// Mix configuration with stems loaded and mutes applied
fn build_mix(args: &MixArgs) -> Result<MixConfiguration> {
    let mut config = args.to_mix_configuration();
    if let Some(dir) = &args.stems {
        let stems = load_stems(dir)
            .with_context(|| format!("Failed to load stems from {}", dir.display()))?;
        let found = stems.iter().filter(|s| s.is_some()).count();
        if found == 0 {
            bail!("No stem files found in {}", dir.display());
        }
        log::info!("build_mix: {} of {} stems loaded", found, stems.len());
        config.stems = stems;
        config.stem_playback_enabled = true;
    }
    for name in &args.muted {
        config.set_stem_enabled(parse_stem(name)?, false);
    }
    if !args.muted.is_empty() && args.stems.is_none() {
        log::warn!("build_mix: --mute has no effect without --stems");
    }
    Ok(config)
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0);
    let minutes = (total / 60.0).floor();
    format!("{}:{:06.3}", minutes as u64, total - minutes * 60.0)
}

pub fn analyze(config: &AppConfig, file: &Path, beats_per_bar: u32, lines: usize) -> Result<()> {
    let source = load_track(file)?;
    let mono = mono_f64(&source);
    println!(
        "{}: {} at {} Hz, {} channel(s)",
        file.display(),
        format_time(source.duration_secs()),
        source.sample_rate(),
        source.channels()
    );

    let estimator = TempoEstimator::new(config.tempo.clone());
    let estimate = estimator.estimate_beat_grid(&mono, source.sample_rate());
    if !estimate.has_tempo() {
        println!("No tempo detected");
        return Ok(());
    }

    println!("BPM:          {:.2}", estimate.bpm);
    println!("Grid anchor:  {}", format_time(estimate.t0));
    println!("Audio start:  {}", format_time(estimate.audio_start));
    println!("First onset:  {}", format_time(estimate.approx_onset));
    println!("Kick attack:  {}", format_time(estimate.kick_attack));

    let grid = GridOverlay::from_estimate(&estimate, beats_per_bar);
    let end = estimate.t0 + lines as f64 * grid.beat_period();
    for (t, downbeat) in grid.beats_in_range(estimate.t0, end) {
        println!("  {} {}", format_time(t), if downbeat { "|" } else { "." });
    }
    Ok(())
}

pub fn play(config: &AppConfig, file: &Path, args: &MixArgs) -> Result<()> {
    let source = load_track(file)?;
    let mix = build_mix(args)?;

    let bridge = Arc::new(PlaybackBridge::new());
    let mut engine = AudioEngine::with_options(
        default_backend(&config.audio),
        config.eq.clone(),
        Some(Arc::clone(&bridge)),
    );
    if engine.backend_name() == "null" {
        bail!("No audio output device available; use `stemscope bounce` to render to a file");
    }

    engine.initialize(source).context("Failed to open audio output")?;
    engine.set_mix_configuration(mix)?;
    engine.set_playback_rate(args.rate)?;
    engine.play()?;

    let snapshot = bridge.snapshot();
    println!(
        "Playing {} ({} at {} Hz)",
        file.display(),
        format_time(snapshot.duration_seconds()),
        snapshot.sample_rate
    );
    while engine.is_playing() {
        thread::sleep(POLL_INTERVAL);
        let snapshot = bridge.snapshot();
        log::debug!(
            "play: {} / {}",
            format_time(snapshot.current_seconds()),
            format_time(snapshot.duration_seconds())
        );
    }
    engine.shutdown();
    println!("Done");
    Ok(())
}

/// Interleaved samples produced by an offline render
struct Bounce {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

/// Render the whole track through a null-backed engine
fn render_offline(
    config: &AppConfig,
    source: AudioSource,
    mix: MixConfiguration,
    rate: f64,
) -> Result<Bounce> {
    let mut engine =
        AudioEngine::with_options(Box::new(NullBackend::new()), config.eq.clone(), None);
    engine.initialize(source)?;
    engine.set_mix_configuration(mix)?;
    engine.set_playback_rate(rate)?;

    let sample_rate = engine.sample_rate();
    let channels: u16 = if engine.is_stereo() { 2 } else { 1 };
    let total = engine.total_frames() as f64;
    // Output positions 0, r, 2r, ... strictly below the track length
    let out_frames = (total / engine.playback_rate()).ceil() as usize;

    let renderer = engine.renderer();
    let mut block = vec![0i16; BOUNCE_BLOCK_FRAMES * channels as usize];
    let mut samples = Vec::with_capacity(out_frames * channels as usize);
    engine.play()?;
    while engine.is_playing() {
        renderer.render(&mut block);
        samples.extend_from_slice(&block);
    }
    samples.truncate(out_frames * channels as usize);
    engine.shutdown();

    Ok(Bounce {
        samples,
        sample_rate,
        channels,
    })
}

pub fn bounce(config: &AppConfig, file: &Path, output: &Path, args: &MixArgs) -> Result<()> {
    let source = load_track(file)?;
    let mix = build_mix(args)?;
    let bounce = render_offline(config, source, mix, args.rate)?;

    write_wav_pcm16(output, &bounce.samples, bounce.sample_rate, bounce.channels)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    let frames = bounce.samples.len() / bounce.channels as usize;
    println!(
        "Wrote {} ({} at {} Hz, {} channel(s))",
        output.display(),
        format_time(frames as f64 / bounce.sample_rate as f64),
        bounce.sample_rate,
        bounce.channels
    );
    Ok(())
}

pub fn devices() -> Result<()> {
    let devices = output_devices().context("Failed to enumerate audio devices")?;
    if devices.is_empty() {
        println!("No output devices found");
        return Ok(());
    }
    for device in devices {
        println!("{} [{} ch]", device, device.max_channels);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stem_names() {
        assert_eq!(parse_stem("vocals").unwrap(), Stem::Vocals);
        assert_eq!(parse_stem("DRUMS").unwrap(), Stem::Drums);
        assert!(parse_stem("guitar").is_err());
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00.000");
        assert_eq!(format_time(61.5), "1:01.500");
    }

    #[test]
    fn test_render_offline_covers_track_at_rate() {
        let source = AudioSource::new("tone", vec![1000i16; 2 * 10_000], 8000, 2);
        let bounce = render_offline(
            &AppConfig::default(),
            source,
            MixConfiguration::default(),
            2.0,
        )
        .unwrap();
        assert_eq!(bounce.channels, 2);
        assert_eq!(bounce.sample_rate, 8000);
        assert_eq!(bounce.samples.len(), 2 * 5_000);
        assert!(bounce.samples.iter().all(|&s| (s - 1000).abs() <= 1));
    }

    #[test]
    fn test_render_offline_applies_gain() {
        let source = AudioSource::new("tone", vec![4000i16; 3000], 8000, 1);
        let mix = MixConfiguration::default().with_master_gain(-120.0);
        let bounce = render_offline(&AppConfig::default(), source, mix, 1.0).unwrap();
        assert_eq!(bounce.samples.len(), 3000);
        assert!(bounce.samples.iter().all(|&s| s == 0));
    }
}
