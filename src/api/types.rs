//! Wire DTOs for the remote transcription / chat-completions endpoints.
//!
//! The shapes here match the OpenAI-style contracts the gateway talks to:
//!
//! * transcription: multipart request, `{ "text": … }` response.
//! * interpret: standard chat-completions request/response.
//! * audio chat: chat-completions with `modalities`, an `audio` output
//!   config, and typed content parts (`text` | `input_audio`), returning an
//!   `audio` object whose `data` field carries the base64 reply audio.
//!
//! Field renames (`max_completion_tokens`, `n`) are handled with serde
//! attributes so the Rust names stay readable.

use serde::{Deserialize, Serialize};

use crate::session::Speaker;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Chat role as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<Speaker> for Role {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::System => Role::System,
            Speaker::User => Role::User,
            Speaker::Assistant => Role::Assistant,
        }
    }
}

impl From<Role> for Speaker {
    fn from(role: Role) -> Self {
        match role {
            Role::System => Speaker::System,
            Role::User => Speaker::User,
            Role::Assistant => Speaker::Assistant,
        }
    }
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

/// Response body of the transcription endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Interpret (text chat completions)
// ---------------------------------------------------------------------------

/// A plain text chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat-completions request for the interpret step.
#[derive(Debug, Clone, Serialize)]
pub struct InterpretRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "max_completion_tokens")]
    pub max_tokens: u32,
    #[serde(rename = "n")]
    pub choice_count: u32,
}

/// Chat-completions response; the pipeline picks the first choice.
#[derive(Debug, Clone, Deserialize)]
pub struct InterpretResponse {
    pub choices: Vec<InterpretChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterpretChoice {
    pub message: ChatMessage,
}

impl InterpretResponse {
    /// First usable choice, or `None` for a valid-but-empty response.
    pub fn first_message(&self) -> Option<&ChatMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

// ---------------------------------------------------------------------------
// Audio chat
// ---------------------------------------------------------------------------

/// Output-audio configuration sent with an audio-chat request.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSpec {
    pub voice: String,
    pub format: String,
}

/// Base64 audio input attached to a user message.
#[derive(Debug, Clone, Serialize)]
pub struct InputAudio {
    /// Base64-encoded audio bytes.
    pub data: String,
    /// Container name, e.g. `"wav"`.
    pub format: String,
}

/// One typed part of an audio-chat message body.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    InputAudio { input_audio: InputAudio },
}

/// A message whose content is a list of typed parts.
#[derive(Debug, Clone, Serialize)]
pub struct AudioMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

/// Chat-completions request carrying audio input and requesting audio output.
#[derive(Debug, Clone, Serialize)]
pub struct AudioChatRequest {
    pub model: String,
    pub modalities: Vec<String>,
    pub audio: VoiceSpec,
    pub messages: Vec<AudioMessage>,
    #[serde(rename = "max_completion_tokens")]
    pub max_tokens: u32,
    #[serde(rename = "n")]
    pub choice_count: u32,
}

/// The reply audio payload: `data` is base64, `transcript` is the spoken text.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyAudio {
    pub id: String,
    pub data: String,
    pub transcript: String,
}

/// Assistant message of an audio-chat response.
///
/// `content` is null when the model answers with audio only; `audio` is
/// absent when the model answers with text only, so both are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioReplyMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub audio: Option<ReplyAudio>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioChatChoice {
    pub message: AudioReplyMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioChatResponse {
    pub choices: Vec<AudioChatChoice>,
}

impl AudioChatResponse {
    /// First usable choice, or `None` for a valid-but-empty response.
    pub fn first_message(&self) -> Option<&AudioReplyMessage> {
        self.choices.first().map(|c| &c.message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
