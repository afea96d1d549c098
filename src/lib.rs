//! Voice Assistant — a voice-interaction front end for OpenAI-compatible
//! speech and chat services.
//!
//! Press-to-record audio capture with five output modes:
//!
//! * **Transcribe** — show the remote transcription of the utterance.
//! * **Interpret** — transcribe, then ask the chat model for a contextual
//!   reply informed by the conversation history.
//! * **Spoken reply** — like Interpret, plus on-device text-to-speech.
//! * **Audio chat** — send the audio itself to an audio-capable chat model
//!   and play back the audio it answers with.
//! * **Live transcribe** — on-device streaming recognition, no server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  commands   ┌──────────────┐  snapshots   ┌──────────────┐
//! │ front    │ ──────────▶ │ Orchestrator │ ───────────▶ │ SessionState │
//! │ end      │   (mpsc)    │  (pipeline)  │   (watch)    │  observers   │
//! └──────────┘             └──────┬───────┘              └──────────────┘
//!                                 │
//!              ┌──────────┬───────┼────────┬───────────┐
//!              ▼          ▼       ▼        ▼           ▼
//!          capture   transcode  gateway  speech     playback
//!          (cpal)    (hound)  (reqwest) (tts/whisper) (rodio)
//! ```
//!
//! The orchestrator owns every collaborator behind a trait seam, which keeps
//! the pipeline fully testable with in-process doubles and the platform
//! integrations (`cpal`, `rodio`, `tts`, `whisper-rs`) swappable.

pub mod api;
pub mod audio;
pub mod config;
pub mod pipeline;
pub mod session;
pub mod speech;
