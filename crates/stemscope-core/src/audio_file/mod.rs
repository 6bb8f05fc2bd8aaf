//! Audio file loading and writing
//!
//! - PCM16 WAV through a small RIFF chunk parser ([`read_wav_pcm16`])
//! - Everything else (MP3, FLAC, OGG, 24-bit WAV...) through symphonia
//!   ([`decode_pcm16`]), converted to interleaved PCM16 at the native rate
//! - Separator output directories with one WAV per stem ([`load_stems`])
//! - PCM16 WAV output through hound ([`write_wav_pcm16`])

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dsp::{norm_to_pcm16, pcm16_to_norm};
use crate::engine::AudioSource;
use crate::types::{Stem, NUM_STEMS};

/// WAVE format tag for integer PCM
const WAVE_FORMAT_PCM: u16 = 1;
/// Largest `fmt ` chunk accepted (WAVE_FORMAT_EXTENSIBLE is 40 bytes)
const MAX_FMT_CHUNK: u64 = 1024;

/// Audio file errors
#[derive(Error, Debug)]
pub enum AudioFileError {
    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    #[error("Unsupported format tag: {0} (expected PCM)")]
    UnsupportedFormatTag(u16),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    #[error("File corrupted: {0}")]
    Corrupted(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("WAV write error: {0}")]
    Write(#[from] hound::Error),
}

impl AudioFileError {
    /// Valid WAV that the PCM16 parser doesn't handle but a decoder might
    fn is_unsupported_encoding(&self) -> bool {
        matches!(
            self,
            AudioFileError::UnsupportedFormatTag(_) | AudioFileError::UnsupportedBitDepth(_)
        )
    }
}

/// Audio format information from the fmt chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes per frame (channels * bits_per_sample / 8)
    pub block_align: u16,
}

impl WavFormat {
    /// Check the format is 16-bit integer PCM, mono or stereo
    pub fn validate(&self) -> Result<(), AudioFileError> {
        if self.format_tag != WAVE_FORMAT_PCM {
            return Err(AudioFileError::UnsupportedFormatTag(self.format_tag));
        }
        if self.bits_per_sample != 16 {
            return Err(AudioFileError::UnsupportedBitDepth(self.bits_per_sample));
        }
        if self.channels != 1 && self.channels != 2 {
            return Err(AudioFileError::UnsupportedChannels(self.channels));
        }
        if self.sample_rate == 0 {
            return Err(AudioFileError::InvalidFormat("sample rate is 0".into()));
        }
        Ok(())
    }

    fn parse(data: &[u8]) -> Result<Self, AudioFileError> {
        if data.len() < 16 {
            return Err(AudioFileError::Corrupted("fmt chunk too small".into()));
        }
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        Ok(Self {
            format_tag: u16_at(0),
            channels: u16_at(2),
            sample_rate: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            block_align: u16_at(12),
            bits_per_sample: u16_at(14),
        })
    }
}

fn open(path: &Path) -> Result<File, AudioFileError> {
    File::open(path).map_err(|source| AudioFileError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio")
        .to_string()
}

/// Read a 16-bit PCM WAV file
pub fn read_wav_pcm16<P: AsRef<Path>>(path: P) -> Result<AudioSource, AudioFileError> {
    let path = path.as_ref();
    let mut reader = BufReader::new(open(path)?);
    let (format, samples) = parse_wav_pcm16(&mut reader)?;
    log::debug!(
        "read_wav_pcm16: {:?} {} Hz, {} ch, {} frames",
        path,
        format.sample_rate,
        format.channels,
        samples.len() / format.channels as usize
    );
    Ok(AudioSource::new(
        source_name(path),
        samples,
        format.sample_rate,
        format.channels,
    ))
}

/// Parse a RIFF/WAVE stream holding 16-bit PCM
///
/// Unknown chunks are skipped, odd-sized chunks are padded to a word
/// boundary. A data chunk shorter than its declared size is accepted and
/// truncated to whole frames.
pub fn parse_wav_pcm16<R: Read + Seek>(
    reader: &mut R,
) -> Result<(WavFormat, Vec<i16>), AudioFileError> {
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .map_err(|_| AudioFileError::InvalidFormat("file too short for a RIFF header".into()))?;
    if &header[0..4] != b"RIFF" {
        return Err(AudioFileError::InvalidFormat("Not a RIFF file".into()));
    }
    if &header[8..12] != b"WAVE" {
        return Err(AudioFileError::InvalidFormat("Not a WAVE file".into()));
    }

    let mut format: Option<WavFormat> = None;
    let mut data: Option<Vec<u8>> = None;

    loop {
        let mut chunk_header = [0u8; 8];
        if reader.read_exact(&mut chunk_header).is_err() {
            break;
        }
        let chunk_id = [chunk_header[0], chunk_header[1], chunk_header[2], chunk_header[3]];
        let chunk_size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]) as u64;

        match &chunk_id {
            b"fmt " => {
                if chunk_size > MAX_FMT_CHUNK {
                    return Err(AudioFileError::Corrupted(format!(
                        "fmt chunk of {} bytes",
                        chunk_size
                    )));
                }
                let mut fmt_data = vec![0u8; chunk_size as usize];
                reader
                    .read_exact(&mut fmt_data)
                    .map_err(|_| AudioFileError::Corrupted("truncated fmt chunk".into()))?;
                format = Some(WavFormat::parse(&fmt_data)?);
            }
            b"data" => {
                let mut bytes = Vec::new();
                reader.by_ref().take(chunk_size).read_to_end(&mut bytes)?;
                if (bytes.len() as u64) < chunk_size {
                    log::warn!(
                        "parse_wav_pcm16: data chunk truncated ({} of {} bytes)",
                        bytes.len(),
                        chunk_size
                    );
                }
                data = Some(bytes);
            }
            _ => {
                reader.seek(SeekFrom::Current(chunk_size as i64))?;
            }
        }

        // Pad to word boundary
        if chunk_size % 2 != 0 {
            reader.seek(SeekFrom::Current(1))?;
        }
    }

    let format = format.ok_or(AudioFileError::MissingChunk("fmt"))?;
    format.validate()?;
    let data = data.ok_or(AudioFileError::MissingChunk("data"))?;

    let frame_bytes = 2 * format.channels as usize;
    let whole = data.len() / frame_bytes * frame_bytes;
    let samples = data[..whole]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    Ok((format, samples))
}

/// Decode any supported file to interleaved PCM16
///
/// `.wav` goes through the PCM16 parser first; WAVs it can't handle
/// (float, 24-bit) and all other extensions go through symphonia. More than
/// two channels are folded down to stereo.
pub fn decode_pcm16<P: AsRef<Path>>(path: P) -> Result<AudioSource, AudioFileError> {
    let path = path.as_ref();
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if is_wav {
        match read_wav_pcm16(path) {
            Ok(source) => return Ok(source),
            Err(e) if e.is_unsupported_encoding() => {
                log::info!("decode_pcm16: {} in {:?}, using the generic decoder", e, path);
            }
            Err(e) => return Err(e),
        }
    }

    let (samples, sample_rate, channels) = decode_with_symphonia(path)?;
    let (samples, channels) = fold_to_stereo(&samples, channels);
    let pcm: Vec<i16> = samples.iter().map(|&x| norm_to_pcm16(x as f64)).collect();
    log::info!(
        "decode_pcm16: {:?} {} Hz, {} ch, {:.1}s",
        path,
        sample_rate,
        channels,
        pcm.len() as f64 / channels.max(1) as f64 / sample_rate.max(1) as f64
    );
    Ok(AudioSource::new(source_name(path), pcm, sample_rate, channels))
}

/// Decode to interleaved f32 with symphonia
fn decode_with_symphonia(path: &Path) -> Result<(Vec<f32>, u32, u16), AudioFileError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioFileError::Decode(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioFileError::Decode("No audio track found".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioFileError::Decode("Unknown sample rate".into()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioFileError::Decode(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("decode_pcm16: error reading packet: {}", e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_pcm16: error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(AudioFileError::Decode("no audio decoded".into()));
    }
    Ok((samples, sample_rate, channels))
}

/// Fold interleaved audio with more than two channels down to stereo
///
/// Even channels average into the left, odd channels into the right.
/// Mono and stereo pass through.
fn fold_to_stereo(samples: &[f32], channels: u16) -> (Vec<f32>, u16) {
    if channels <= 2 {
        return (samples.to_vec(), channels.max(1));
    }
    let ch = channels as usize;
    let lefts = ch.div_ceil(2) as f32;
    let rights = (ch / 2) as f32;
    let mut out = Vec::with_capacity(samples.len() / ch * 2);
    for frame in samples.chunks_exact(ch) {
        let (mut l, mut r) = (0.0f32, 0.0f32);
        for (i, &s) in frame.iter().enumerate() {
            if i % 2 == 0 {
                l += s;
            } else {
                r += s;
            }
        }
        out.push(l / lefts);
        out.push(r / rights);
    }
    (out, 2)
}

/// Load the separator's stem files from a directory
///
/// Looks for `vocals.wav`, `drums.wav`, `bass.wav` and `other.wav`; a
/// missing file leaves its slot empty, an unreadable one is an error.
pub fn load_stems<P: AsRef<Path>>(
    dir: P,
) -> Result<[Option<AudioSource>; NUM_STEMS], AudioFileError> {
    let dir = dir.as_ref();
    let mut stems: [Option<AudioSource>; NUM_STEMS] = Default::default();
    for stem in Stem::ALL {
        let path = dir.join(format!("{}.wav", stem.file_stem()));
        if !path.exists() {
            log::debug!("load_stems: no {} stem at {:?}", stem.name(), path);
            continue;
        }
        let source = decode_pcm16(&path)?;
        log::info!(
            "load_stems: {} stem {:.1}s at {} Hz",
            stem.name(),
            source.duration_secs(),
            source.sample_rate()
        );
        stems[stem.index()] = Some(source);
    }
    Ok(stems)
}

/// Write interleaved PCM16 to a WAV file
pub fn write_wav_pcm16<P: AsRef<Path>>(
    path: P,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<(), AudioFileError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Average a source's channels into normalized mono for analysis
pub fn mono_f64(source: &AudioSource) -> Vec<f64> {
    let ch = source.channels() as usize;
    if ch == 0 {
        return Vec::new();
    }
    source
        .samples()
        .chunks_exact(ch)
        .map(|frame| frame.iter().map(|&s| pcm16_to_norm(s)).sum::<f64>() / ch as f64)
        .collect()
}
