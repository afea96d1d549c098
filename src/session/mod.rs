//! Session state model and reactive handle.
//!
//! This module provides:
//! * [`OutputMode`] — the user-selectable response mode for each utterance.
//! * [`Speaker`] / [`ConversationTurn`] — attributed history entries.
//! * [`SessionState`] — the single UI-observable state aggregate.
//! * [`SessionHandle`] — snapshot publisher built on `tokio::sync::watch`.

pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use state::{ConversationTurn, OutputMode, SessionHandle, SessionState, Speaker};
