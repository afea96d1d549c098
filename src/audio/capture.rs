//! Microphone capture via `cpal`.
//!
//! The cpal input stream runs for the lifetime of the process; whether its
//! samples are kept is gated by the recording flag inside
//! [`RecordingBuffer`].  [`MicRecorder`] implements [`CaptureController`] on
//! top of that buffer: `start_capture` clears it and raises the flag,
//! `stop_capture` drains it and writes the utterance to a WAV file in the
//! cache directory, returning a [`CapturedAsset`] handle.
//!
//! Keeping the stream alive and gating with a flag avoids re-negotiating the
//! device on every utterance; the returned [`InputStream`] is a RAII guard
//! whose drop stops the underlying hardware stream.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CapturedAsset
// ---------------------------------------------------------------------------

/// Opaque handle to a finished recording.
///
/// Created on capture-stop, consumed by exactly one pipeline run, and
/// eligible for deletion once that run completes.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAsset {
    /// Location of the written audio container.
    pub path: PathBuf,
    /// Rough duration of the utterance in seconds.
    pub duration_secs: f32,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or finalising audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to write captured audio: {0}")]
    WavWrite(#[from] hound::Error),

    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// RecordingBuffer
// ---------------------------------------------------------------------------

/// Thread-shared accumulation buffer between the cpal callback, the
/// recorder, and the live recognizer.
///
/// Samples are interleaved `f32` at the device's native rate; they are only
/// appended while a recording is active.
#[derive(Clone, Default)]
pub struct RecordingBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

#[derive(Default)]
struct BufferInner {
    samples: Vec<f32>,
    active: bool,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard leftovers from the previous utterance and start accumulating.
    pub fn begin(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.samples.clear();
        inner.active = true;
    }

    /// Stop accumulating and drain everything captured so far.
    pub fn end(&self) -> Vec<f32> {
        let mut inner = self.inner.lock().unwrap();
        inner.active = false;
        std::mem::take(&mut inner.samples)
    }

    /// Append a chunk; dropped silently while no recording is active.
    pub fn append(&self, chunk: &[f32]) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active {
            inner.samples.extend_from_slice(chunk);
        }
    }

    /// Copy of the in-flight samples (the live recognizer polls this).
    pub fn snapshot(&self) -> Vec<f32> {
        self.inner.lock().unwrap().samples.clone()
    }

    /// True while a recording is in progress.
    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active
    }
}

// ---------------------------------------------------------------------------
// CaptureController trait
// ---------------------------------------------------------------------------

/// Audio-recording device lifecycle as seen by the orchestrator.
///
/// Single outstanding capture at a time: `start_capture` while already
/// capturing is a no-op, and `stop_capture` returns `None` when nothing
/// usable was recorded (device unavailable, zero samples).
pub trait CaptureController: Send {
    fn start_capture(&mut self);
    fn stop_capture(&mut self) -> Option<CapturedAsset>;
}

// ---------------------------------------------------------------------------
// MicRecorder
// ---------------------------------------------------------------------------

/// Production [`CaptureController`] backed by a [`RecordingBuffer`] that a
/// cpal input stream fills (see [`start_input_stream`]).
pub struct MicRecorder {
    buffer: RecordingBuffer,
    /// Native device sample rate in Hz.
    sample_rate: u32,
    /// Native interleaved channel count.
    channels: u16,
    /// Directory that receives the per-utterance WAV files.
    out_dir: PathBuf,
}

impl MicRecorder {
    pub fn new(
        buffer: RecordingBuffer,
        sample_rate: u32,
        channels: u16,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            buffer,
            sample_rate,
            channels,
            out_dir: out_dir.into(),
        }
    }

    fn write_wav(&self, samples: &[f32]) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.out_dir)?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = self.out_dir.join(format!("utterance_{stamp}.wav"));

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(&path, spec)?;
        for &s in samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;

        Ok(path)
    }
}

impl CaptureController for MicRecorder {
    fn start_capture(&mut self) {
        if self.buffer.is_active() {
            log::debug!("capture: start ignored, already recording");
            return;
        }
        log::debug!("capture: recording started");
        self.buffer.begin();
    }

    fn stop_capture(&mut self) -> Option<CapturedAsset> {
        let samples = self.buffer.end();
        if samples.is_empty() {
            log::warn!("capture: stop with no audio accumulated");
            return None;
        }

        let frames = samples.len() / self.channels.max(1) as usize;
        let duration_secs = frames as f32 / self.sample_rate as f32;

        match self.write_wav(&samples) {
            Ok(path) => {
                log::debug!("capture: wrote {} ({duration_secs:.2}s)", path.display());
                Some(CapturedAsset {
                    path,
                    duration_secs,
                })
            }
            Err(e) => {
                // Treated downstream as nothing-to-process, not a user-facing
                // error.
                log::error!("capture: failed to write utterance: {e}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InputStream
// ---------------------------------------------------------------------------

/// RAII guard for the running cpal input stream plus its native format.
pub struct InputStream {
    _stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Open the input device (by name, or the system default) and start a
/// stream that feeds `buffer` while a recording is active.
///
/// # Errors
///
/// [`CaptureError::NoDevice`] when no matching input device exists, or a
/// cpal error when the stream cannot be configured or started.
pub fn start_input_stream(
    buffer: RecordingBuffer,
    device_name: Option<&str>,
) -> Result<InputStream, CaptureError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|_| CaptureError::NoDevice)?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(CaptureError::NoDevice)?,
        None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
    };

    let supported = device.default_input_config()?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let config: cpal::StreamConfig = supported.into();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _| buffer.append(data),
        |e| log::warn!("capture: stream error: {e}"),
        None,
    )?;
    stream.play()?;

    log::info!("capture: input stream running ({sample_rate} Hz, {channels} ch)");

    Ok(InputStream {
        _stream: stream,
        sample_rate,
        channels,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
