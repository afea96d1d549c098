//! Remote service gateway: wire DTOs and the OpenAI-compatible client.
//!
//! This module provides:
//! * [`ServiceGateway`] — async trait covering the three remote operations
//!   (transcribe, interpret, audio chat).
//! * [`OpenAiGateway`] — reqwest-backed production implementation.
//! * [`ApiError`] — typed failure taxonomy for the remote calls.
//! * `types` — request/response DTOs matching the wire contracts.

pub mod gateway;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use gateway::{ApiError, OpenAiGateway, ServiceGateway};
pub use types::{
    AudioChatRequest, AudioChatResponse, AudioMessage, ChatMessage, ContentPart, InputAudio,
    InterpretRequest, InterpretResponse, ReplyAudio, Role, TranscribeResponse, VoiceSpec,
};
