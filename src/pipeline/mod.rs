//! Pipeline orchestration: the mode-dispatching state machine that turns a
//! finished recording into a transcription, a reply, speech, or played-back
//! audio.
//!
//! The [`Orchestrator`] runs on a tokio task and receives
//! [`PipelineCommand`]s from the front end over an mpsc channel; all
//! observable results land in the shared session state.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, OrchestratorSettings, PipelineCommand};
