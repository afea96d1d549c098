//! Reply-audio playback via `rodio`.
//!
//! [`RodioPlayer`] keeps the rodio `OutputStream` (which is not `Send`) on a
//! dedicated playback thread and feeds it paths over an mpsc channel, so the
//! orchestrator side of the player is `Send` and `play` returns immediately
//! (fire-and-forget).
//!
//! Invariant: at most one sink is ever live.  A new play request stops and
//! drops the previous sink before a new one is created.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors surfaced when a playback request cannot be submitted.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playback thread is no longer running")]
    ThreadGone,
}

// ---------------------------------------------------------------------------
// AudioPlayer trait
// ---------------------------------------------------------------------------

/// Fire-and-forget audio playback as seen by the orchestrator.
///
/// Submitting a new file implicitly stops whatever was playing before.
pub trait AudioPlayer: Send {
    fn play(&mut self, path: &Path) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// RodioPlayer
// ---------------------------------------------------------------------------

/// Production [`AudioPlayer`] backed by a dedicated rodio thread.
pub struct RodioPlayer {
    tx: mpsc::Sender<PathBuf>,
}

impl RodioPlayer {
    /// Spawn the playback thread.
    ///
    /// Opening the output device happens on that thread; if no device is
    /// available every play request is logged and dropped, matching the
    /// silent-degrade policy of the rest of the pipeline.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<PathBuf>();

        std::thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || playback_loop(&rx))
            .expect("failed to spawn audio-playback thread");

        Self { tx }
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayer for RodioPlayer {
    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.tx
            .send(path.to_path_buf())
            .map_err(|_| PlaybackError::ThreadGone)
    }
}

/// Runs on the playback thread; owns the output stream and the single sink.
fn playback_loop(rx: &mpsc::Receiver<PathBuf>) {
    let stream = match rodio::OutputStream::try_default() {
        Ok(pair) => Some(pair),
        Err(e) => {
            log::warn!("playback: no output device available: {e}");
            None
        }
    };

    let mut current: Option<rodio::Sink> = None;

    while let Ok(path) = rx.recv() {
        let Some((_, handle)) = stream.as_ref() else {
            log::warn!("playback: dropping {} (no output device)", path.display());
            continue;
        };

        // Release the previous playback before acquiring a new sink.
        if let Some(sink) = current.take() {
            sink.stop();
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log::error!("playback: cannot open {}: {e}", path.display());
                continue;
            }
        };

        let source = match rodio::Decoder::new(BufReader::new(file)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("playback: cannot decode {}: {e}", path.display());
                continue;
            }
        };

        match rodio::Sink::try_new(handle) {
            Ok(sink) => {
                sink.append(source);
                log::debug!("playback: playing {}", path.display());
                current = Some(sink);
            }
            Err(e) => log::error!("playback: failed to create sink: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
