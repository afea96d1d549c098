//! On-device speech synthesis.
//!
//! [`SystemSynthesizer`] drives the platform TTS engine (via the `tts`
//! crate) on a dedicated thread fed by an mpsc channel, so
//! [`SpeechSynthesizer::speak`] returns immediately and never gates the
//! pipeline's busy flag.  A new request interrupts whatever is currently
//! being spoken, matching flush-queue semantics.

use std::sync::mpsc;

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Fire-and-forget text-to-speech as seen by the orchestrator.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str);
}

// ---------------------------------------------------------------------------
// SystemSynthesizer
// ---------------------------------------------------------------------------

/// Production [`SpeechSynthesizer`] backed by the platform TTS engine.
///
/// If the engine cannot be initialised (headless system, missing speech
/// service) every request is logged and dropped; the pipeline itself is
/// unaffected.
pub struct SystemSynthesizer {
    tx: mpsc::Sender<String>,
}

impl SystemSynthesizer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<String>();

        std::thread::Builder::new()
            .name("speech-synth".into())
            .spawn(move || synth_loop(&rx))
            .expect("failed to spawn speech-synth thread");

        Self { tx }
    }
}

impl Default for SystemSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for SystemSynthesizer {
    fn speak(&self, text: &str) {
        if self.tx.send(text.to_string()).is_err() {
            log::warn!("synth: speech thread is gone, dropping utterance");
        }
    }
}

/// Runs on the synthesis thread; owns the platform TTS handle.
fn synth_loop(rx: &mpsc::Receiver<String>) {
    let mut engine = match tts::Tts::default() {
        Ok(engine) => engine,
        Err(e) => {
            log::warn!("synth: platform TTS unavailable: {e}");
            // Keep draining so senders never block or error.
            while rx.recv().is_ok() {}
            return;
        }
    };

    while let Ok(text) = rx.recv() {
        log::debug!("synth: speaking {} chars", text.len());
        // interrupt=true flushes anything still being spoken.
        if let Err(e) = engine.speak(&text, true) {
            log::warn!("synth: speak failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
