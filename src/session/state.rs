//! Session state — the single source of truth observed by the presentation
//! layer.
//!
//! [`SessionState`] is a plain data aggregate; nothing in it is derived or
//! cached.  Writers go through [`SessionHandle::update`], which mutates the
//! state in place under the `tokio::sync::watch` channel's lock and then
//! publishes, so concurrent writers (the orchestrator task and the live
//! recognizer thread) never lose each other's updates, and readers always
//! see a consistent, immutable copy of the latest snapshot.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// OutputMode
// ---------------------------------------------------------------------------

/// How a finished utterance is turned into a response.
///
/// Selected by the user before recording; the orchestrator snapshots the mode
/// at capture-stop, so changing it mid-pipeline does not affect the run that
/// is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Show the raw transcription only.
    Transcribe,
    /// Transcribe, then ask the chat model for a contextual reply.
    Interpret,
    /// Like [`Interpret`](Self::Interpret), additionally speak the reply via
    /// on-device text-to-speech.
    SpokenReply,
    /// Skip transcription; send the converted audio straight to the
    /// audio-chat model and play back the returned audio.
    AudioChat,
    /// Use the on-device streaming recognizer; no server round trip.
    LiveTranscribe,
}

impl OutputMode {
    /// Parse a CLI / config word into a mode.  Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transcribe" => Some(Self::Transcribe),
            "interpret" => Some(Self::Interpret),
            "spoken" | "spoken-reply" => Some(Self::SpokenReply),
            "audio" | "audio-chat" => Some(Self::AudioChat),
            "live" | "live-transcribe" => Some(Self::LiveTranscribe),
            _ => None,
        }
    }

    /// Short human-readable label for status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transcribe => "Transcribe",
            Self::Interpret => "Interpret",
            Self::SpokenReply => "Spoken reply",
            Self::AudioChat => "Audio chat",
            Self::LiveTranscribe => "Live transcribe",
        }
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Transcribe
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Speaker / ConversationTurn
// ---------------------------------------------------------------------------

/// Who produced a given turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    System,
    Assistant,
}

/// One attributed utterance in the conversation history.
///
/// Turns are append-only: they are never mutated or removed, and history
/// order is insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: SystemTime,
}

impl ConversationTurn {
    /// Build a turn stamped with the current time.
    pub fn now(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: SystemTime::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Everything the presentation layer needs to render, in one aggregate.
///
/// `is_busy` is true strictly between capture-stop and pipeline completion;
/// `is_panel_open` is set once a text result is ready to display.  Both are
/// explicit flags written by the orchestrator, never inferred.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Mode the next pipeline run will execute under.
    pub selected_mode: OutputMode,
    /// Chronological conversation history (user / assistant turns).
    pub history: Vec<ConversationTurn>,
    /// Most recent transcription result (remote or live recognizer).
    pub last_transcription: String,
    /// Most recent assistant reply text.
    pub last_reply: String,
    /// True while exactly one pipeline run is in flight.
    pub is_busy: bool,
    /// True once a result is ready to display for text-rendering modes.
    pub is_panel_open: bool,
}

impl SessionState {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            selected_mode: mode,
            history: Vec::new(),
            last_transcription: String::new(),
            last_reply: String::new(),
            is_busy: false,
            is_panel_open: false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(OutputMode::default())
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Clonable publisher of [`SessionState`] snapshots.
///
/// The orchestrator and the live recognizer call [`update`](Self::update);
/// observers hold the `watch::Receiver` returned by
/// [`subscribe`](Self::subscribe) and re-render whenever a new snapshot
/// lands.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    /// Create a handle publishing an initial state with `mode` selected.
    pub fn new(mode: OutputMode) -> Self {
        let (tx, _rx) = watch::channel(SessionState::new(mode));
        Self { tx: Arc::new(tx) }
    }

    /// Apply `f` to the current state and publish the result.
    ///
    /// The mutation runs under the channel's lock, so two writers can never
    /// clobber each other's fields: a flag cleared by one writer stays
    /// cleared even if another writer publishes concurrently.
    pub fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.tx.send_modify(f);
    }

    /// Owned copy of the latest snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// New observer of published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(OutputMode::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
