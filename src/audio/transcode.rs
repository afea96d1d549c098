//! Format conversion for captured audio.
//!
//! The audio-chat endpoint requires a fixed input format: **mono, 16 kHz,
//! WAV** ([`TargetSpec::chat_wav`]).  [`WavTranscoder`] reads the captured
//! container with `hound`, downmixes and resamples with the helpers from
//! [`crate::audio::resample`], and writes the converted file next to the
//! input.  The decode/encode work runs under `spawn_blocking` so the async
//! pipeline never stalls on file I/O.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::resample::{downmix_to_mono, resample};

// ---------------------------------------------------------------------------
// TargetSpec
// ---------------------------------------------------------------------------

/// Desired output format of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Container name, e.g. `"wav"`.
    pub format: String,
}

impl TargetSpec {
    /// The fixed format the audio-chat service accepts: mono 16 kHz WAV.
    pub fn chat_wav() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            format: "wav".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscodeError
// ---------------------------------------------------------------------------

/// Errors from the conversion step.  Every variant carries a descriptive
/// reason so failures can be logged with a diagnostic instead of a bare
/// status.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to read source audio: {0}")]
    Read(String),

    #[error("failed to write converted audio: {0}")]
    Write(String),

    #[error("unsupported target container: {0}")]
    UnsupportedFormat(String),

    #[error("conversion task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// Transcoder trait
// ---------------------------------------------------------------------------

/// Async conversion of a captured asset into a target format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert the file at `input` to `spec`, returning the output path.
    async fn convert(&self, input: &Path, spec: &TargetSpec) -> Result<PathBuf, TranscodeError>;
}

// ---------------------------------------------------------------------------
// WavTranscoder
// ---------------------------------------------------------------------------

/// WAV-to-WAV converter: downmix to the requested channel count, linear
/// resample to the requested rate, re-encode as 16-bit PCM.
pub struct WavTranscoder;

impl WavTranscoder {
    pub fn new() -> Self {
        Self
    }

    fn convert_blocking(input: &Path, spec: &TargetSpec) -> Result<PathBuf, TranscodeError> {
        if spec.format != "wav" {
            return Err(TranscodeError::UnsupportedFormat(spec.format.clone()));
        }

        let mut reader =
            hound::WavReader::open(input).map_err(|e| TranscodeError::Read(e.to_string()))?;
        let in_spec = reader.spec();

        // Normalise whatever sample format the source uses to f32.
        let samples: Vec<f32> = match in_spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| TranscodeError::Read(e.to_string()))?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (in_spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max))
                    .collect::<Result<_, _>>()
                    .map_err(|e| TranscodeError::Read(e.to_string()))?
            }
        };

        let mono = downmix_to_mono(&samples, in_spec.channels);
        let converted = resample(&mono, in_spec.sample_rate, spec.sample_rate);

        let output = input.with_extension(format!("{}hz.wav", spec.sample_rate));
        let out_spec = hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&output, out_spec)
            .map_err(|e| TranscodeError::Write(e.to_string()))?;
        for s in &converted {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| TranscodeError::Write(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| TranscodeError::Write(e.to_string()))?;

        Ok(output)
    }
}

impl Default for WavTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for WavTranscoder {
    async fn convert(&self, input: &Path, spec: &TargetSpec) -> Result<PathBuf, TranscodeError> {
        let input = input.to_path_buf();
        let spec = spec.clone();

        tokio::task::spawn_blocking(move || Self::convert_blocking(&input, &spec))
            .await
            .map_err(|e| TranscodeError::Task(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
