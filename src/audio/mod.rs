//! Audio subsystem — capture, format conversion, and playback.
//!
//! ```text
//! Microphone → cpal callback → RecordingBuffer ──stop──▶ CapturedAsset (WAV)
//!                                   │                         │
//!                                   │ (live recognizer         │ WavTranscoder
//!                                   ▼  polls snapshots)        ▼
//!                            downmix + resample        mono 16 kHz WAV
//!
//! reply audio (decoded base64) ──▶ RodioPlayer (single live sink)
//! ```

pub mod capture;
pub mod playback;
pub mod resample;
pub mod transcode;

pub use capture::{
    start_input_stream, CaptureController, CapturedAsset, CaptureError, InputStream, MicRecorder,
    RecordingBuffer,
};
pub use playback::{AudioPlayer, PlaybackError, RodioPlayer};
pub use resample::{downmix_to_mono, resample};
pub use transcode::{TargetSpec, TranscodeError, Transcoder, WavTranscoder};
