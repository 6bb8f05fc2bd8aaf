//! Onset detection functions
//!
//! Two STFT-based detectors over mono f64 audio:
//!
//! - **Spectral flux** envelope (log-compressed magnitude, positive
//!   differences summed across bins), frames centred on `k·hop`. Feeds the
//!   beat tracker and the local refinement.
//! - **High-frequency content** with adaptive median/mean peak picking, used
//!   to find the first audible onset of a track.

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use super::error::{AnalysisError, AnalysisResult};

/// Log compression applied to magnitudes before differencing
const FLUX_COMPRESSION: f64 = 100.0;

/// Past / future frames in the peak-picking window
const PEAK_PRE: usize = 5;
const PEAK_POST: usize = 1;

/// A detection function sampled at a fixed frame rate
#[derive(Debug, Clone, Default)]
pub struct OnsetEnvelope {
    pub values: Vec<f64>,
    /// Frames per second
    pub fps: f64,
}

impl OnsetEnvelope {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time in seconds of frame `index`
    pub fn frame_time(&self, index: usize) -> f64 {
        if self.fps <= 0.0 {
            return 0.0;
        }
        index as f64 / self.fps
    }
}

/// Windowed forward FFT with reusable buffers
struct Stft {
    fft: Arc<dyn RealToComplex<f64>>,
    window: Vec<f64>,
    frame: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl Stft {
    fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        // Periodic Hann
        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
            .collect();
        Self {
            frame: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            window,
        }
    }

    /// Transform the window starting at `start` (may be negative or run past
    /// the end; missing samples are zero)
    fn transform(&mut self, samples: &[f64], start: isize) -> AnalysisResult<&[Complex<f64>]> {
        for (i, (slot, w)) in self.frame.iter_mut().zip(&self.window).enumerate() {
            let idx = start + i as isize;
            *slot = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize] * w
            } else {
                0.0
            };
        }
        self.fft
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| AnalysisError::Fft(format!("{:?}", e)))?;
        Ok(&self.spectrum)
    }
}

/// Spectral-flux onset envelope with frames centred on multiples of `hop`
pub fn spectral_flux(
    samples: &[f64],
    sample_rate: u32,
    window: usize,
    hop: usize,
) -> AnalysisResult<OnsetEnvelope> {
    if samples.is_empty() || sample_rate == 0 || window == 0 || hop == 0 {
        return Ok(OnsetEnvelope::default());
    }
    let mut stft = Stft::new(window);
    let half = (window / 2) as isize;
    let n_frames = samples.len() / hop + 1;

    let mut prev: Option<Vec<f64>> = None;
    let mut values = Vec::with_capacity(n_frames);
    for k in 0..n_frames {
        let spectrum = stft.transform(samples, (k * hop) as isize - half)?;
        let mags: Vec<f64> = spectrum
            .iter()
            .map(|c| (FLUX_COMPRESSION * c.norm()).ln_1p())
            .collect();
        let flux = match &prev {
            Some(p) => mags
                .iter()
                .zip(p)
                .map(|(cur, old)| (cur - old).max(0.0))
                .sum(),
            None => 0.0,
        };
        values.push(flux);
        prev = Some(mags);
    }

    Ok(OnsetEnvelope {
        values,
        fps: sample_rate as f64 / hop as f64,
    })
}

/// HFC onset detector parameters
#[derive(Debug, Clone, Copy)]
pub struct HfcParams {
    pub window: usize,
    pub hop: usize,
    /// Peak-picking threshold relative to the local mean
    pub threshold: f64,
    /// Hops quieter than this (dB) never produce an onset
    pub silence_db: f64,
    pub min_ioi_secs: f64,
}

/// First HFC onset at or after `start_secs`
///
/// Frame `n` analyses the `window` samples ending at `(n + 1)·hop`; its onset
/// time is the centre of that window. Returns None when no onset qualifies.
pub fn first_onset_hfc(
    samples: &[f64],
    sample_rate: u32,
    start_secs: f64,
    params: HfcParams,
) -> AnalysisResult<Option<f64>> {
    let HfcParams { window, hop, .. } = params;
    if samples.is_empty() || sample_rate == 0 || window == 0 || hop == 0 {
        return Ok(None);
    }
    let sr = sample_rate as f64;
    let start_secs = start_secs.max(0.0);
    let min_ioi = params.min_ioi_secs.max(0.0);

    // Pre-roll so the picking window is primed when `start_secs` is reached
    let start_sample = (start_secs * sr) as usize;
    let preroll = window + (PEAK_PRE + 2) * hop;
    let first_frame = start_sample.saturating_sub(preroll) / hop;
    let last_frame = samples.len().div_ceil(hop);
    if first_frame >= last_frame {
        return Ok(None);
    }

    let mut stft = Stft::new(window);
    let frame_time = |n: usize| (((n + 1) * hop) as f64 - (window / 2) as f64).max(0.0) / sr;

    let mut odf: Vec<f64> = Vec::new();
    let mut silent: Vec<bool> = Vec::new();
    // Thresholded values for the last three frames
    let mut peek = [0.0f64; 3];
    let mut last_onset: Option<f64> = None;

    for n in first_frame..last_frame {
        let start = ((n + 1) * hop) as isize - window as isize;
        let spectrum = stft.transform(samples, start)?;
        let hfc: f64 = spectrum
            .iter()
            .enumerate()
            .map(|(k, c)| k as f64 * c.norm())
            .sum();
        odf.push(hfc);

        let block_lo = (n * hop).min(samples.len());
        let block_hi = ((n + 1) * hop).min(samples.len());
        silent.push(block_db(&samples[block_lo..block_hi]) < params.silence_db);

        // Decide on the frame PEAK_POST behind the newest one
        let i = odf.len() as isize - 1 - PEAK_POST as isize;
        if i < 0 {
            continue;
        }
        let i = i as usize;
        let lo = i.saturating_sub(PEAK_PRE);
        let neighbourhood = &odf[lo..];
        let mut sorted = neighbourhood.to_vec();
        sorted.sort_by(f64::total_cmp);
        let med = sorted[sorted.len() / 2];
        let mean = neighbourhood.iter().sum::<f64>() / neighbourhood.len() as f64;

        peek = [peek[1], peek[2], odf[i] - med - params.threshold * mean];

        // peek[1] belongs to frame i - 1
        if i == 0 {
            continue;
        }
        let candidate = i - 1;
        let is_peak = peek[1] > 0.0 && peek[1] > peek[0] && peek[1] > peek[2];
        if !is_peak || silent[candidate] {
            continue;
        }
        let t = frame_time(first_frame + candidate);
        if last_onset.is_some_and(|prev| t - prev < min_ioi) {
            continue;
        }
        last_onset = Some(t);
        if t >= start_secs {
            return Ok(Some(t));
        }
    }
    Ok(None)
}

/// Mean energy of a block in dB (-inf for an empty or silent block)
fn block_db(block: &[f64]) -> f64 {
    if block.is_empty() {
        return f64::NEG_INFINITY;
    }
    let energy = block.iter().map(|x| x * x).sum::<f64>() / block.len() as f64;
    10.0 * energy.log10()
}
