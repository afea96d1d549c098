//! On-device live transcription via `whisper-rs`.
//!
//! In `LiveTranscribe` mode no server round trip happens: while the user is
//! speaking, [`WhisperLiveRecognizer`] periodically snapshots the shared
//! [`RecordingBuffer`], converts it to 16 kHz mono, runs Whisper over it,
//! and publishes the text to `SessionState::last_transcription`.  The
//! stop-recording step only has to call [`LiveRecognizer::stop`].
//!
//! A missing GGML model file degrades to a logged warning: the recognizer
//! stays inert and every other mode keeps working.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::{downmix_to_mono, resample, RecordingBuffer};
use crate::session::SessionHandle;

/// Whisper input format.
const WHISPER_RATE: u32 = 16_000;
/// Minimum audio before an inference pass is worthwhile: 0.5 s at 16 kHz.
const MIN_LIVE_SAMPLES: usize = 8_000;

// ---------------------------------------------------------------------------
// LiveError
// ---------------------------------------------------------------------------

/// Errors from the on-device recognizer.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or state.
    #[error("whisper initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("live transcription error: {0}")]
    Transcription(String),
}

// ---------------------------------------------------------------------------
// LiveRecognizer trait
// ---------------------------------------------------------------------------

/// Streaming recognizer lifecycle as seen by the orchestrator.
///
/// `start` while already running is a no-op; `stop` only halts the polling
/// loop — published transcriptions stay in session state.
pub trait LiveRecognizer: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// LiveEngine
// ---------------------------------------------------------------------------

/// Thin wrapper around a `whisper_rs::WhisperContext` tuned for repeated
/// short inference passes.  A fresh `WhisperState` is created per call so
/// the engine needs no locking.
struct LiveEngine {
    ctx: WhisperContext,
    language: String,
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send`/`Sync` in whisper-rs; the weights are read-only after
// loading and `language` is plain owned data.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for LiveEngine {}
unsafe impl Sync for LiveEngine {}

impl LiveEngine {
    fn load(model_path: &Path, language: &str) -> Result<Self, LiveError> {
        if !model_path.exists() {
            return Err(LiveError::ModelNotFound(model_path.display().to_string()));
        }

        let path_str = model_path.to_str().ok_or_else(|| {
            LiveError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                model_path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| LiveError::ContextInit(e.to_string()))?;

        Ok(Self {
            ctx,
            language: language.to_string(),
        })
    }

    fn transcribe(&self, audio: &[f32]) -> Result<String, LiveError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang: Option<&str> = if self.language == "auto" {
            None
        } else {
            Some(self.language.as_str())
        };
        params.set_language(lang);
        params.set_print_progress(false);
        params.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| LiveError::ContextInit(e.to_string()))?;

        state
            .full(params, audio)
            .map_err(|e| LiveError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| LiveError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg = state
                .full_get_segment_text(i)
                .map_err(|e| LiveError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&seg);
        }

        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// WhisperLiveRecognizer
// ---------------------------------------------------------------------------

/// Polling live recognizer over the shared capture buffer.
pub struct WhisperLiveRecognizer {
    engine: Option<Arc<LiveEngine>>,
    buffer: RecordingBuffer,
    native_rate: u32,
    native_channels: u16,
    session: SessionHandle,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl WhisperLiveRecognizer {
    /// Build a recognizer; a missing or unloadable model leaves it inert.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model_path: &Path,
        language: &str,
        buffer: RecordingBuffer,
        native_rate: u32,
        native_channels: u16,
        session: SessionHandle,
        interval: Duration,
    ) -> Self {
        let engine = match LiveEngine::load(model_path, language) {
            Ok(engine) => {
                log::info!("live: whisper model loaded: {}", model_path.display());
                Some(Arc::new(engine))
            }
            Err(e) => {
                log::warn!("live: recognizer disabled ({e})");
                None
            }
        };

        Self {
            engine,
            buffer,
            native_rate,
            native_channels,
            session,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl LiveRecognizer for WhisperLiveRecognizer {
    fn start(&mut self) {
        let Some(engine) = self.engine.clone() else {
            log::debug!("live: start ignored, no model loaded");
            return;
        };

        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("live: start ignored, already running");
            return;
        }

        let buffer = self.buffer.clone();
        let session = self.session.clone();
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let rate = self.native_rate;
        let channels = self.native_channels;

        // Whisper inference is blocking work; a plain thread keeps it off
        // the async runtime entirely.
        std::thread::Builder::new()
            .name("live-recognizer".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }

                    let raw = buffer.snapshot();
                    let mono = downmix_to_mono(&raw, channels);
                    let audio = resample(&mono, rate, WHISPER_RATE);
                    if audio.len() < MIN_LIVE_SAMPLES {
                        continue;
                    }

                    match engine.transcribe(&audio) {
                        Ok(text) if !text.is_empty() => {
                            log::debug!("live: partial transcription: {text:?}");
                            session.update(|s| s.last_transcription = text.clone());
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("live: inference failed: {e}"),
                    }
                }
                log::debug!("live: recognizer loop stopped");
            })
            .expect("failed to spawn live-recognizer thread");
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
