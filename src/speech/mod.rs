//! On-device speech engines.
//!
//! * [`SpeechSynthesizer`] / [`SystemSynthesizer`] — fire-and-forget TTS for
//!   the spoken-reply mode.
//! * [`LiveRecognizer`] / [`WhisperLiveRecognizer`] — streaming on-device
//!   transcription for the live mode (no server round trip).

pub mod live;
pub mod synth;

pub use live::{LiveError, LiveRecognizer, WhisperLiveRecognizer};
pub use synth::{SpeechSynthesizer, SystemSynthesizer};
