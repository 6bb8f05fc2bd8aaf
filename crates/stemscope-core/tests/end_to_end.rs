//! End-to-end scenarios driven through the null backend

use std::f64::consts::PI;
use std::sync::Arc;

use stemscope_core::analysis::{
    estimate_beat_grid, estimate_tempo, AnchorMode, BeatGridEstimate, TempoConfig, TempoEstimator,
};
use stemscope_core::audio::NullBackend;
use stemscope_core::audio_file::{decode_pcm16, mono_f64, write_wav_pcm16};
use stemscope_core::bridge::{GridOverlay, PlaybackBridge};
use stemscope_core::dsp::norm_to_pcm16;
use stemscope_core::engine::{AudioEngine, AudioSource, MixConfiguration};
use stemscope_core::Stem;

const SR: u32 = 44100;

fn engine() -> AudioEngine {
    AudioEngine::new(Box::new(NullBackend::new()))
}

/// Kick-like thump with a bright tick every beat from `first` seconds
fn click_track(bpm: f64, first: f64, secs: f64) -> Vec<f64> {
    let len = (secs * SR as f64) as usize;
    let mut out = vec![0.0; len];
    let period = 60.0 / bpm;
    let mut beat = 0usize;
    loop {
        let t = first + beat as f64 * period;
        if t >= secs {
            break;
        }
        let start = (t * SR as f64).round() as usize;
        for i in 0..(0.1 * SR as f64) as usize {
            let Some(s) = out.get_mut(start + i) else {
                break;
            };
            let ts = i as f64 / SR as f64;
            *s = 0.7 * (2.0 * PI * 60.0 * ts).sin() * (-ts / 0.03).exp()
                + 0.25 * (2.0 * PI * 3000.0 * ts).sin() * (-ts / 0.003).exp();
        }
        beat += 1;
    }
    out
}

#[test]
fn silent_source_plays_to_completion() {
    let mut engine = engine();
    engine
        .initialize(AudioSource::new("silence", vec![0i16; 44100], SR, 1))
        .unwrap();
    engine.play().unwrap();

    let renderer = engine.renderer();
    let mut buf = vec![1i16; 512];
    let mut callbacks = 0;
    while engine.is_playing() {
        renderer.render(&mut buf);
        assert!(buf.iter().all(|&s| s == 0));
        callbacks += 1;
        assert!(callbacks < 1000, "playback never finished");
    }

    assert!(!engine.is_playing());
    assert_eq!(engine.current_frame(), 44099);
    // Finished: further callbacks stay silent
    buf.fill(7);
    renderer.render(&mut buf);
    assert!(buf.iter().all(|&s| s == 0));
}

#[test]
fn click_track_tempo_is_120() {
    let samples = click_track(120.0, 1.0, 60.0);
    let bpm = estimate_tempo(&samples, SR);
    assert!((bpm - 120.0).abs() <= 0.5, "estimated {}", bpm);
}

#[test]
fn click_track_beat_grid_anchors_first_click() {
    let samples = click_track(120.0, 1.0, 60.0);
    let grid = estimate_beat_grid(&samples, SR);
    assert!((grid.bpm - 120.0).abs() <= 0.5, "grid {:?}", grid);
    assert!((grid.audio_start - 1.0).abs() < 0.02, "grid {:?}", grid);
    assert!((grid.t0 - grid.audio_start).abs() < 1e-12);
    assert!((grid.approx_onset - 1.0).abs() < 0.03, "grid {:?}", grid);
    assert!((grid.kick_attack - 1.0).abs() < 0.03, "grid {:?}", grid);

    let kick_anchored = TempoEstimator::new(TempoConfig::default().with_anchor(AnchorMode::KickAttack))
        .estimate_beat_grid(&samples, SR);
    assert_eq!(kick_anchored.t0, kick_anchored.kick_attack);
}

#[test]
fn integer_scaled_input_is_normalized() {
    let samples: Vec<f64> = click_track(120.0, 1.0, 40.0)
        .into_iter()
        .map(|x| x * 32767.0)
        .collect();
    let bpm = estimate_tempo(&samples, SR);
    assert!((bpm - 120.0).abs() <= 0.5, "estimated {}", bpm);
}

#[test]
fn seek_beyond_end_is_clamped() {
    let mut engine = engine();
    engine
        .initialize(AudioSource::new("tone", vec![100i16; 2000], SR, 2))
        .unwrap();
    let total = engine.total_frames();
    assert_eq!(total, 1000);

    engine.seek_frame(total + 5000);
    assert_eq!(engine.current_frame(), total - 1);
    engine.seek_frame(total + 5000);
    assert_eq!(engine.current_frame(), total - 1);
}

#[test]
fn decoded_file_feeds_engine_and_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    let mono = click_track(120.0, 1.0, 5.0);
    let pcm: Vec<i16> = mono
        .iter()
        .flat_map(|&x| {
            let s = norm_to_pcm16(x);
            [s, s]
        })
        .collect();
    write_wav_pcm16(&path, &pcm, SR, 2).unwrap();

    let source = decode_pcm16(&path).unwrap();
    assert_eq!(source.frames(), mono.len());
    let analysed = mono_f64(&source);
    assert!((analysed[44100 + 200] - mono[44100 + 200]).abs() < 1e-3);

    let mut engine = engine();
    engine.initialize(source).unwrap();
    assert!(engine.is_stereo());
    assert_eq!(engine.sample_rate(), SR);
}

#[test]
fn all_stems_on_with_prefer_main_renders_main_track() {
    let frames = 4000usize;
    let main_samples: Vec<i16> = (0..frames)
        .flat_map(|i| {
            let v = (i % 2000) as i16 * 10 - 10000;
            [v, -v]
        })
        .collect();
    let main = AudioSource::new("main", main_samples.clone(), SR, 2);

    let mut engine = engine();
    engine.initialize(main).unwrap();
    let mut config = MixConfiguration::default();
    for stem in Stem::ALL {
        let source = AudioSource::new(stem.name(), vec![5000i16; 2 * frames], SR, 2);
        config = config.with_stem(stem, source);
    }
    config.stem_playback_enabled = true;
    config.prefer_main_when_all_stems_on = true;
    engine.set_mix_configuration(config.clone()).unwrap();

    let renderer = engine.renderer();
    let mut buf = vec![0i16; 2 * 16];
    for start in [0u64, 333, 1500] {
        engine.seek_frame(start);
        engine.play().unwrap();
        renderer.render(&mut buf);
        engine.pause();
        let expected = &main_samples[2 * start as usize..2 * start as usize + buf.len()];
        for (out, want) in buf.iter().zip(expected) {
            assert!(
                (*out as i32 - *want as i32).abs() <= 1,
                "frame {}: {} vs {}",
                start,
                out,
                want
            );
        }
    }

    // Same stems without the preference: the four stems are summed instead
    config.prefer_main_when_all_stems_on = false;
    engine.set_mix_configuration(config).unwrap();
    engine.seek_frame(333);
    engine.play().unwrap();
    renderer.render(&mut buf);
    assert!(buf.iter().all(|&s| (s as i32 - 20000).abs() <= 2), "{:?}", &buf[..4]);
}

#[test]
fn stem_mix_and_bridge_snapshot() {
    let bridge = Arc::new(PlaybackBridge::new());
    let mut engine = AudioEngine::with_bridge(Box::new(NullBackend::new()), Arc::clone(&bridge));

    let main = AudioSource::new("main", vec![1000i16; 8820], SR, 2);
    let drums = AudioSource::new("drums", vec![300i16; 8820], SR, 2);
    let bass = AudioSource::new("bass", vec![200i16; 8820], SR, 2);
    engine.initialize(main).unwrap();

    let mut config = MixConfiguration::default()
        .with_stem(Stem::Drums, drums)
        .with_stem(Stem::Bass, bass);
    config.stem_playback_enabled = true;
    config.set_stem_enabled(Stem::Vocals, false);
    engine.set_mix_configuration(config).unwrap();
    engine.play().unwrap();

    let mut buf = vec![0i16; 256];
    engine.renderer().render(&mut buf);
    // 300 + 200 from the enabled stems; the main track is bypassed
    assert!(buf.iter().all(|&s| (s - 500).abs() <= 1), "{:?}", &buf[..4]);

    let snap = bridge.snapshot();
    assert!(snap.valid);
    assert!(snap.playing);
    assert!(snap.stereo);
    assert_eq!(snap.sample_rate, SR);
    assert_eq!(snap.total_frames, 4410);
    assert_eq!(snap.current_frame, engine.current_frame());
    assert!(snap.stem_playback_enabled);
    assert!(!snap.stem_enabled[Stem::Vocals.index()]);

    let estimate = BeatGridEstimate {
        bpm: 120.0,
        t0: 0.5,
        audio_start: 0.5,
        approx_onset: 0.51,
        kick_attack: 0.5,
    };
    bridge.set_grid(GridOverlay::from_estimate(&estimate, 4));
    let grid = bridge.snapshot().grid;
    assert!(grid.enabled);
    assert_eq!(grid.beats_in_range(0.0, 2.0).len(), 4);

    engine.shutdown();
    assert!(!bridge.snapshot().valid);
}
