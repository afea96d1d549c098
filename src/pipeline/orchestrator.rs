//! Recording → response orchestration — the core state machine.
//!
//! [`Orchestrator`] owns every collaborator behind a trait object and drives
//! one pipeline run per capture-stop:
//!
//! ```text
//! PipelineCommand::StartRecording
//!   └─▶ start live recognizer + capture                     [Capturing]
//!
//! PipelineCommand::StopRecording                            [Processing]
//!   ├─ no asset        → back to idle, no network calls
//!   ├─ Transcribe      → transcribe, open panel
//!   ├─ Interpret       → transcribe → interpret → history + reply, open panel
//!   ├─ SpokenReply     → transcribe → interpret → history + reply → speak
//!   ├─ AudioChat       → transcode → audio chat → decode + play reply audio
//!   └─ LiveTranscribe  → stop the on-device recognizer (text already live)
//! ```
//!
//! Guarantees, regardless of how a branch exits (success, empty result, or
//! failure at any step):
//!
//! * `is_busy` is raised exactly once per run and cleared as the final step.
//! * A second stop-recording while a run is in flight is rejected, not
//!   queued.
//! * The mode is snapshotted at capture-stop; changing it mid-run does not
//!   change which branch executes.
//! * Dependent calls are strictly sequential: transcription completes before
//!   interpretation starts, interpretation before synthesis.
//! * Remote failures never escape to the caller; the only user-visible
//!   effect is that the expected state simply does not update.

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::{
    ApiError, AudioChatRequest, AudioMessage, ChatMessage, ContentPart, InputAudio,
    InterpretRequest, Role, ServiceGateway, VoiceSpec,
};
use crate::audio::{
    AudioPlayer, CaptureController, CapturedAsset, TargetSpec, TranscodeError, Transcoder,
};
use crate::config::{ApiConfig, AppPaths};
use crate::session::{ConversationTurn, OutputMode, SessionHandle, Speaker};
use crate::speech::{LiveRecognizer, SpeechSynthesizer};

/// Lead-in text part sent alongside the audio in an audio-chat request.
const AUDIO_CHAT_LEAD_IN: &str = "Please answer based on the following audio.";

/// File name of the decoded reply audio inside the cache directory.
const REPLY_AUDIO_FILE: &str = "reply_audio.wav";

// ---------------------------------------------------------------------------
// PipelineCommand
// ---------------------------------------------------------------------------

/// User intents delivered to the orchestrator over its command channel.
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Begin capturing an utterance.
    StartRecording,
    /// Finish capturing and run the mode-specific pipeline.
    StopRecording,
    /// Select the mode for the *next* pipeline run.
    SetMode(OutputMode),
}

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Stage-tagged failures inside one pipeline run.
///
/// Never escapes [`Orchestrator::stop_recording`]; the variants exist so the
/// failure log can say which stage gave up.
#[derive(Debug, Error)]
enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcribe(ApiError),

    #[error("interpretation failed: {0}")]
    Interpret(ApiError),

    #[error("audio chat failed: {0}")]
    AudioChat(ApiError),

    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("asset I/O failed: {0}")]
    Asset(#[from] std::io::Error),

    #[error("reply audio is not valid base64: {0}")]
    ReplyAudio(String),
}

// ---------------------------------------------------------------------------
// OrchestratorSettings
// ---------------------------------------------------------------------------

/// The slice of configuration the pipeline needs at run time.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub interpret_model: String,
    pub audio_chat_model: String,
    pub voice: String,
    pub reply_format: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Receives the decoded reply audio; also where converted assets land.
    pub cache_dir: PathBuf,
}

impl OrchestratorSettings {
    pub fn from_config(api: &ApiConfig) -> Self {
        Self {
            interpret_model: api.interpret_model.clone(),
            audio_chat_model: api.audio_chat_model.clone(),
            voice: api.voice.clone(),
            reply_format: api.reply_format.clone(),
            max_tokens: api.max_tokens,
            system_prompt: api.system_prompt.clone(),
            cache_dir: AppPaths::new().cache_dir,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives the complete record → convert → remote call → render pipeline.
///
/// Create with [`Orchestrator::new`], then either call the intent handlers
/// directly or spawn [`run`](Self::run) with a command channel.
pub struct Orchestrator {
    session: SessionHandle,
    capture: Box<dyn CaptureController>,
    transcoder: Arc<dyn Transcoder>,
    gateway: Arc<dyn ServiceGateway>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Box<dyn AudioPlayer>,
    live: Box<dyn LiveRecognizer>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: SessionHandle,
        capture: Box<dyn CaptureController>,
        transcoder: Arc<dyn Transcoder>,
        gateway: Arc<dyn ServiceGateway>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Box<dyn AudioPlayer>,
        live: Box<dyn LiveRecognizer>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            session,
            capture,
            transcoder,
            gateway,
            synthesizer,
            player,
            live,
            settings,
        }
    }

    /// The shared session handle (presentation layers subscribe to it).
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the orchestrator until `command_rx` is closed.
    ///
    /// Spawn as a tokio task from `main()`; it never returns while the
    /// channel is open.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<PipelineCommand>) {
        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                PipelineCommand::StartRecording => self.start_recording(),
                PipelineCommand::StopRecording => self.stop_recording().await,
                PipelineCommand::SetMode(mode) => self.set_mode(mode),
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Intent handlers
    // -----------------------------------------------------------------------

    /// Select the mode the next run will execute under.
    pub fn set_mode(&self, mode: OutputMode) {
        log::debug!("pipeline: mode set to {mode}");
        self.session.update(|s| s.selected_mode = mode);
    }

    /// Begin capturing.  Ignored while a pipeline run is in flight.
    ///
    /// The live recognizer listens in parallel with the recorder for every
    /// mode; only `LiveTranscribe` runs read its output.
    pub fn start_recording(&mut self) {
        if self.session.snapshot().is_busy {
            log::debug!("pipeline: start-recording ignored while busy");
            return;
        }
        self.live.start();
        self.capture.start_capture();
    }

    /// Finish capturing and run the pipeline for the snapshotted mode.
    ///
    /// `is_busy` is cleared on every exit path, including failures at any
    /// intermediate step.
    pub async fn stop_recording(&mut self) {
        if self.session.snapshot().is_busy {
            log::warn!("pipeline: stop-recording ignored, a run is already in flight");
            return;
        }
        self.session.update(|s| s.is_busy = true);

        // Snapshot: mode changes after this point apply to the next run.
        let mode = self.session.snapshot().selected_mode;

        let Some(asset) = self.capture.stop_capture() else {
            // Nothing to process; return to idle silently.
            self.session.update(|s| {
                s.is_busy = false;
                s.is_panel_open = false;
            });
            return;
        };

        log::debug!(
            "pipeline: {mode} run over {:.2}s utterance",
            asset.duration_secs
        );

        let outcome = match mode {
            OutputMode::Transcribe | OutputMode::Interpret | OutputMode::SpokenReply => {
                self.run_text_pipeline(&asset, mode).await
            }
            OutputMode::AudioChat => self.run_audio_chat(&asset).await,
            OutputMode::LiveTranscribe => {
                self.live.stop();
                Ok(())
            }
        };

        if let Err(err) = outcome {
            match err {
                // The interpret path degrades silently; it gets a debug-level
                // diagnostic only, unlike every other stage.
                PipelineError::Interpret(e) => {
                    log::debug!("pipeline: interpretation failed: {e}");
                }
                other => log::error!("pipeline: {other}"),
            }
        }

        // The asset belongs to exactly one run; discard it now.
        if let Err(e) = tokio::fs::remove_file(&asset.path).await {
            log::debug!("pipeline: could not remove {}: {e}", asset.path.display());
        }

        // Unconditional: every path above funnels through here.
        self.session.update(|s| s.is_busy = false);
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Transcribe / Interpret / SpokenReply: remote transcription first,
    /// then (for the latter two) a contextual reply, then optional speech.
    async fn run_text_pipeline(
        &mut self,
        asset: &CapturedAsset,
        mode: OutputMode,
    ) -> Result<(), PipelineError> {
        let audio = tokio::fs::read(&asset.path).await?;
        let file_name = asset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("utterance.wav")
            .to_string();

        let response = self
            .gateway
            .transcribe(audio, file_name)
            .await
            .map_err(PipelineError::Transcribe)?;
        let transcription = response.text;

        log::debug!("pipeline: transcription = {transcription:?}");

        self.session.update(|s| {
            s.last_transcription = transcription.clone();
            s.is_panel_open = matches!(mode, OutputMode::Transcribe | OutputMode::Interpret);
        });

        if mode == OutputMode::Transcribe {
            return Ok(());
        }

        // History + system prompt + the fresh user turn, oldest first.
        let mut messages =
            vec![ChatMessage::new(Role::System, self.settings.system_prompt.clone())];
        for turn in &self.session.snapshot().history {
            messages.push(ChatMessage::new(turn.speaker.into(), turn.text.clone()));
        }
        messages.push(ChatMessage::new(Role::User, transcription.clone()));

        let request = InterpretRequest {
            model: self.settings.interpret_model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            choice_count: 1,
        };

        let response = self
            .gateway
            .interpret(request)
            .await
            .map_err(PipelineError::Interpret)?;

        let Some(message) = response.first_message() else {
            // Valid-but-empty: end quietly, reply and history untouched.
            log::debug!("pipeline: interpretation returned no choices");
            return Ok(());
        };

        let reply = message.content.clone();
        let speaker = Speaker::from(message.role);

        log::debug!("pipeline: reply = {reply:?}");

        self.session.update(|s| {
            s.last_reply = reply.clone();
            s.history
                .push(ConversationTurn::now(Speaker::User, transcription.clone()));
            s.history.push(ConversationTurn::now(speaker, reply.clone()));
        });

        if mode == OutputMode::SpokenReply {
            // Detached from pipeline completion; does not gate is_busy.
            self.synthesizer.speak(&reply);
        }

        Ok(())
    }

    /// AudioChat: transcode to the fixed format, single audio-in/audio-out
    /// call, play the decoded reply.  No panel, no history.
    ///
    /// The converted file is as transient as the raw asset; it is removed
    /// here whether the chat turn succeeds or fails.
    async fn run_audio_chat(&mut self, asset: &CapturedAsset) -> Result<(), PipelineError> {
        let spec = TargetSpec::chat_wav();
        let converted = self.transcoder.convert(&asset.path, &spec).await?;

        let outcome = self.send_audio_chat(&converted, &spec).await;

        if let Err(e) = tokio::fs::remove_file(&converted).await {
            log::debug!("pipeline: could not remove {}: {e}", converted.display());
        }

        outcome
    }

    async fn send_audio_chat(
        &mut self,
        converted: &std::path::Path,
        spec: &TargetSpec,
    ) -> Result<(), PipelineError> {
        let audio = tokio::fs::read(converted).await?;
        let encoded = BASE64.encode(&audio);

        let request = AudioChatRequest {
            model: self.settings.audio_chat_model.clone(),
            modalities: vec!["text".into(), "audio".into()],
            audio: VoiceSpec {
                voice: self.settings.voice.clone(),
                format: self.settings.reply_format.clone(),
            },
            messages: vec![AudioMessage {
                role: Role::User,
                content: vec![
                    ContentPart::Text {
                        text: AUDIO_CHAT_LEAD_IN.into(),
                    },
                    ContentPart::InputAudio {
                        input_audio: InputAudio {
                            data: encoded,
                            format: spec.format.clone(),
                        },
                    },
                ],
            }],
            max_tokens: self.settings.max_tokens,
            choice_count: 1,
        };

        let response = self
            .gateway
            .audio_chat(request)
            .await
            .map_err(PipelineError::AudioChat)?;

        let Some(data) = response
            .first_message()
            .and_then(|m| m.audio.as_ref())
            .map(|a| a.data.clone())
        else {
            // No reply audio is a quiet end, not an error.
            log::debug!("pipeline: audio chat returned no reply audio");
            return Ok(());
        };

        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| PipelineError::ReplyAudio(e.to_string()))?;

        tokio::fs::create_dir_all(&self.settings.cache_dir).await?;
        let out = self.settings.cache_dir.join(REPLY_AUDIO_FILE);
        tokio::fs::write(&out, &bytes).await?;

        // Playback is fire-and-forget; a failed handoff is logged only.
        if let Err(e) = self.player.play(&out) {
            log::warn!("pipeline: could not hand reply audio to player: {e}");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};

    use crate::api::{AudioChatResponse, InterpretResponse, TranscribeResponse};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Scripted gateway: fixed per-operation behaviour plus a call log.
    #[derive(Default)]
    struct MockGateway {
        transcribe_text: Option<String>,
        fail_transcribe: bool,
        interpret_reply: Option<String>,
        interpret_empty: bool,
        fail_interpret: bool,
        audio_reply_data: Option<String>,
        audio_reply_empty: bool,
        calls: Mutex<Vec<&'static str>>,
        /// Invoked inside `transcribe`, before it returns (used to mutate
        /// session state mid-pipeline).
        on_transcribe: Option<Box<dyn Fn() + Send + Sync>>,
    }

    impl MockGateway {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn transport_error() -> ApiError {
            ApiError::Request("connection refused".into())
        }
    }

    #[async_trait]
    impl ServiceGateway for MockGateway {
        async fn transcribe(
            &self,
            _audio: Vec<u8>,
            _file_name: String,
        ) -> Result<TranscribeResponse, ApiError> {
            self.calls.lock().unwrap().push("transcribe");
            if let Some(hook) = &self.on_transcribe {
                hook();
            }
            if self.fail_transcribe {
                return Err(Self::transport_error());
            }
            Ok(TranscribeResponse {
                text: self.transcribe_text.clone().unwrap_or_default(),
            })
        }

        async fn interpret(
            &self,
            _request: InterpretRequest,
        ) -> Result<InterpretResponse, ApiError> {
            self.calls.lock().unwrap().push("interpret");
            if self.fail_interpret {
                return Err(Self::transport_error());
            }
            if self.interpret_empty {
                return Ok(serde_json::from_str(r#"{"choices":[]}"#).unwrap());
            }
            let reply = self.interpret_reply.clone().unwrap_or_default();
            let json = serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": reply } }]
            });
            Ok(serde_json::from_value(json).unwrap())
        }

        async fn audio_chat(
            &self,
            _request: AudioChatRequest,
        ) -> Result<AudioChatResponse, ApiError> {
            self.calls.lock().unwrap().push("audio_chat");
            let json = if self.audio_reply_empty {
                serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "text only" } }]
                })
            } else if let Some(data) = &self.audio_reply_data {
                serde_json::json!({
                    "choices": [{ "message": {
                        "role": "assistant",
                        "audio": { "id": "a1", "data": data, "transcript": "spoken" }
                    }}]
                })
            } else {
                return Err(Self::transport_error());
            };
            Ok(serde_json::from_value(json).unwrap())
        }
    }

    /// Capture double returning a pre-baked asset (or none) and counting
    /// stop calls.
    struct MockCapture {
        asset: Mutex<Option<CapturedAsset>>,
        stops: Arc<AtomicU32>,
    }

    impl CaptureController for MockCapture {
        fn start_capture(&mut self) {}

        fn stop_capture(&mut self) -> Option<CapturedAsset> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.asset.lock().unwrap().take()
        }
    }

    /// Transcoder double returning a fixed output path.
    struct MockTranscoder {
        output: Option<PathBuf>,
    }

    #[async_trait]
    impl Transcoder for MockTranscoder {
        async fn convert(
            &self,
            _input: &Path,
            _spec: &TargetSpec,
        ) -> Result<PathBuf, TranscodeError> {
            self.output
                .clone()
                .ok_or_else(|| TranscodeError::Read("scripted failure".into()))
        }
    }

    #[derive(Default)]
    struct MockSynth {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSynthesizer for MockSynth {
        fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    struct MockPlayer {
        played: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl AudioPlayer for MockPlayer {
        fn play(&mut self, path: &Path) -> Result<(), crate::audio::PlaybackError> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockLive {
        starts: Arc<AtomicU32>,
        stops: Arc<AtomicU32>,
    }

    impl LiveRecognizer for MockLive {
        fn start(&mut self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    // -----------------------------------------------------------------------
    // Fixture
    // -----------------------------------------------------------------------

    struct Fixture {
        orchestrator: Orchestrator,
        session: SessionHandle,
        gateway: Arc<MockGateway>,
        capture_stops: Arc<AtomicU32>,
        live_starts: Arc<AtomicU32>,
        live_stops: Arc<AtomicU32>,
        played: Arc<Mutex<Vec<PathBuf>>>,
        synth: Arc<MockSynth>,
        _dir: TempDir,
    }

    /// Build an orchestrator around a real temp asset file and the given
    /// doubles.  `with_asset=false` simulates a capture that yields nothing.
    fn fixture(mode: OutputMode, gateway: MockGateway, with_asset: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let asset_path = dir.path().join("utterance_1.wav");
        std::fs::write(&asset_path, b"fake-audio-bytes").unwrap();

        // A pre-converted file for the audio-chat branch.
        let converted_path = dir.path().join("utterance_1.16000hz.wav");
        std::fs::write(&converted_path, b"converted-audio-bytes").unwrap();

        let asset = with_asset.then(|| CapturedAsset {
            path: asset_path,
            duration_secs: 1.2,
        });

        let session = SessionHandle::new(mode);
        let gateway = Arc::new(gateway);
        let capture_stops = Arc::new(AtomicU32::new(0));
        let played = Arc::new(Mutex::new(Vec::new()));
        let synth = Arc::new(MockSynth::default());
        let live = MockLive::default();
        let live_starts = Arc::clone(&live.starts);
        let live_stops = Arc::clone(&live.stops);

        let settings = OrchestratorSettings {
            interpret_model: "gpt-4o-mini".into(),
            audio_chat_model: "gpt-4o-audio-preview".into(),
            voice: "ballad".into(),
            reply_format: "wav".into(),
            max_tokens: 100,
            system_prompt: "You are a helpful assistant.".into(),
            cache_dir: dir.path().join("cache"),
        };

        let orchestrator = Orchestrator::new(
            session.clone(),
            Box::new(MockCapture {
                asset: Mutex::new(asset),
                stops: Arc::clone(&capture_stops),
            }),
            Arc::new(MockTranscoder {
                output: Some(converted_path),
            }),
            Arc::clone(&gateway) as Arc<dyn ServiceGateway>,
            Arc::clone(&synth) as Arc<dyn SpeechSynthesizer>,
            Box::new(MockPlayer {
                played: Arc::clone(&played),
            }),
            Box::new(live),
            settings,
        );

        Fixture {
            orchestrator,
            session,
            gateway,
            capture_stops,
            live_starts,
            live_stops,
            played,
            synth,
            _dir: dir,
        }
    }

    fn b64(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// mode=Transcribe, transcribe → "hello": transcription stored, panel
    /// open, no interpret call.
    #[tokio::test]
    async fn transcribe_mode_stores_text_and_opens_panel() {
        let mut fx = fixture(
            OutputMode::Transcribe,
            MockGateway {
                transcribe_text: Some("hello".into()),
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert_eq!(state.last_transcription, "hello");
        assert!(state.is_panel_open);
        assert!(!state.is_busy);
        assert_eq!(fx.gateway.calls(), vec!["transcribe"]);
    }

    /// mode=Interpret, the book-a-table exchange: history gains exactly the
    /// user turn then the assistant turn, reply stored.
    #[tokio::test]
    async fn interpret_mode_appends_exactly_two_turns() {
        let mut fx = fixture(
            OutputMode::Interpret,
            MockGateway {
                transcribe_text: Some("book a table".into()),
                interpret_reply: Some("Sure, for how many?".into()),
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].speaker, Speaker::User);
        assert_eq!(state.history[0].text, "book a table");
        assert_eq!(state.history[1].speaker, Speaker::Assistant);
        assert_eq!(state.history[1].text, "Sure, for how many?");
        assert_eq!(state.last_reply, "Sure, for how many?");
        assert!(state.is_panel_open);
        assert!(!state.is_busy);
        assert_eq!(fx.gateway.calls(), vec!["transcribe", "interpret"]);
    }

    /// SpokenReply speaks the reply and does not open the panel.
    #[tokio::test]
    async fn spoken_reply_speaks_without_opening_panel() {
        let mut fx = fixture(
            OutputMode::SpokenReply,
            MockGateway {
                transcribe_text: Some("weather today".into()),
                interpret_reply: Some("Sunny all day.".into()),
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert!(!state.is_panel_open);
        assert_eq!(state.history.len(), 2);
        assert_eq!(*fx.synth.spoken.lock().unwrap(), vec!["Sunny all day."]);
        assert!(!state.is_busy);
    }

    /// No asset from the capture controller: no network call, panel closed,
    /// busy cleared.
    #[tokio::test]
    async fn missing_asset_short_circuits_without_network() {
        let mut fx = fixture(OutputMode::Interpret, MockGateway::default(), false);

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert!(!state.is_busy);
        assert!(!state.is_panel_open);
        assert!(fx.gateway.calls().is_empty());
    }

    /// Transport error from interpret: reply and history unchanged, busy
    /// cleared (the error is only logged).
    #[tokio::test]
    async fn interpret_transport_error_leaves_state_unchanged() {
        let mut fx = fixture(
            OutputMode::Interpret,
            MockGateway {
                transcribe_text: Some("book a table".into()),
                fail_interpret: true,
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert!(state.last_reply.is_empty());
        assert!(state.history.is_empty());
        assert!(!state.is_busy);
    }

    /// Empty choice list from interpret is a quiet end, not an error.
    #[tokio::test]
    async fn interpret_empty_choices_end_quietly() {
        let mut fx = fixture(
            OutputMode::Interpret,
            MockGateway {
                transcribe_text: Some("anyone there".into()),
                interpret_empty: true,
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert_eq!(state.last_transcription, "anyone there");
        assert!(state.last_reply.is_empty());
        assert!(state.history.is_empty());
        assert!(!state.is_busy);
    }

    /// Transcription failure clears busy and leaves everything untouched.
    #[tokio::test]
    async fn transcribe_failure_clears_busy() {
        let mut fx = fixture(
            OutputMode::Transcribe,
            MockGateway {
                fail_transcribe: true,
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert!(state.last_transcription.is_empty());
        assert!(!state.is_panel_open);
        assert!(!state.is_busy);
    }

    /// AudioChat end-to-end: converted asset is sent, reply audio decoded,
    /// persisted and handed to the player; history and panel untouched.
    #[tokio::test]
    async fn audio_chat_plays_reply_and_skips_history() {
        let mut fx = fixture(
            OutputMode::AudioChat,
            MockGateway {
                audio_reply_data: Some(b64(b"reply-pcm")),
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        let state = fx.session.snapshot();
        assert!(state.history.is_empty());
        assert!(!state.is_panel_open);
        assert!(!state.is_busy);
        assert_eq!(fx.gateway.calls(), vec!["audio_chat"]);

        let played = fx.played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert_eq!(std::fs::read(&played[0]).unwrap(), b"reply-pcm");

        // The converted upload copy does not outlive the run.
        assert!(!fx._dir.path().join("utterance_1.16000hz.wav").exists());
    }

    /// A failed audio-chat call still removes the converted file; nothing
    /// accumulates in the cache dir across failed runs.
    #[tokio::test]
    async fn audio_chat_failure_still_removes_converted_file() {
        let mut fx = fixture(OutputMode::AudioChat, MockGateway::default(), true);
        let converted = fx._dir.path().join("utterance_1.16000hz.wav");
        assert!(converted.exists());

        fx.orchestrator.stop_recording().await;

        assert!(!converted.exists());
        assert!(fx.played.lock().unwrap().is_empty());
        assert!(!fx.session.snapshot().is_busy);
    }

    /// AudioChat without an `audio.data` field: no playback, no error.
    #[tokio::test]
    async fn audio_chat_without_reply_audio_skips_playback() {
        let mut fx = fixture(
            OutputMode::AudioChat,
            MockGateway {
                audio_reply_empty: true,
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        assert!(fx.played.lock().unwrap().is_empty());
        assert!(!fx.session.snapshot().is_busy);
    }

    /// Transcode failure terminates the AudioChat branch before any network
    /// call; busy still cleared.
    #[tokio::test]
    async fn transcode_failure_prevents_audio_chat_call() {
        let mut fx = fixture(
            OutputMode::AudioChat,
            MockGateway {
                audio_reply_data: Some(b64(b"unused")),
                ..Default::default()
            },
            true,
        );
        // Swap in a failing transcoder.
        fx.orchestrator.transcoder = Arc::new(MockTranscoder { output: None });

        fx.orchestrator.stop_recording().await;

        assert!(fx.gateway.calls().is_empty());
        assert!(fx.played.lock().unwrap().is_empty());
        assert!(!fx.session.snapshot().is_busy);
    }

    /// LiveTranscribe: stop the recognizer, no gateway traffic.
    #[tokio::test]
    async fn live_mode_stops_recognizer_without_network() {
        let mut fx = fixture(OutputMode::LiveTranscribe, MockGateway::default(), true);

        fx.orchestrator.stop_recording().await;

        assert_eq!(fx.live_stops.load(Ordering::SeqCst), 1);
        assert!(fx.gateway.calls().is_empty());
        assert!(!fx.session.snapshot().is_busy);
    }

    /// A stop while a run is (supposedly) in flight is rejected: the capture
    /// controller is never asked to finalize.
    #[tokio::test]
    async fn stop_is_rejected_while_busy() {
        let mut fx = fixture(OutputMode::Transcribe, MockGateway::default(), true);

        fx.session.update(|s| s.is_busy = true);
        fx.orchestrator.stop_recording().await;

        assert_eq!(fx.capture_stops.load(Ordering::SeqCst), 0);
        assert!(fx.gateway.calls().is_empty());
        // The guard does not clear a busy flag it did not set.
        assert!(fx.session.snapshot().is_busy);
    }

    /// Mode is snapshotted at capture-stop: switching to Interpret while the
    /// transcribe call is in flight must not trigger an interpret call.
    #[tokio::test]
    async fn mode_is_snapshotted_at_capture_stop() {
        let mut fx = fixture(OutputMode::Transcribe, MockGateway::default(), true);
        let session = fx.session.clone();

        let gateway = MockGateway {
            transcribe_text: Some("hello".into()),
            on_transcribe: Some(Box::new(move || {
                session.update(|s| s.selected_mode = OutputMode::Interpret);
            })),
            ..Default::default()
        };
        fx.gateway = Arc::new(gateway);
        fx.orchestrator.gateway = Arc::clone(&fx.gateway) as Arc<dyn ServiceGateway>;

        fx.orchestrator.stop_recording().await;

        // Still the Transcribe branch: no interpret call, panel open.
        assert_eq!(fx.gateway.calls(), vec!["transcribe"]);
        let state = fx.session.snapshot();
        assert!(state.is_panel_open);
        assert_eq!(state.selected_mode, OutputMode::Interpret); // for the next run
        assert!(!state.is_busy);
    }

    /// start-recording starts both the recorder and the live recognizer,
    /// and is ignored while busy.
    #[tokio::test]
    async fn start_recording_starts_live_recognizer() {
        let mut fx = fixture(OutputMode::Transcribe, MockGateway::default(), true);

        fx.orchestrator.start_recording();
        assert_eq!(fx.live_starts.load(Ordering::SeqCst), 1);

        fx.session.update(|s| s.is_busy = true);
        fx.orchestrator.start_recording();
        assert_eq!(fx.live_starts.load(Ordering::SeqCst), 1);
    }

    /// The captured asset is deleted once the run completes.
    #[tokio::test]
    async fn asset_is_deleted_after_the_run() {
        let mut fx = fixture(
            OutputMode::Transcribe,
            MockGateway {
                transcribe_text: Some("hello".into()),
                ..Default::default()
            },
            true,
        );
        let asset_path = fx._dir.path().join("utterance_1.wav");
        assert!(asset_path.exists());

        fx.orchestrator.stop_recording().await;

        assert!(!asset_path.exists());
    }

    /// Corrupt reply audio (bad base64) still clears busy.
    #[tokio::test]
    async fn corrupt_reply_audio_still_clears_busy() {
        let mut fx = fixture(
            OutputMode::AudioChat,
            MockGateway {
                audio_reply_data: Some("!!!not-base64!!!".into()),
                ..Default::default()
            },
            true,
        );

        fx.orchestrator.stop_recording().await;

        assert!(fx.played.lock().unwrap().is_empty());
        assert!(!fx.session.snapshot().is_busy);
    }

    /// Driving the orchestrator through the command channel works end to
    /// end and shuts down when the channel closes.
    #[tokio::test]
    async fn run_loop_processes_commands_until_closed() {
        let fx = fixture(
            OutputMode::Transcribe,
            MockGateway {
                transcribe_text: Some("hello".into()),
                ..Default::default()
            },
            true,
        );
        let session = fx.session.clone();
        let (tx, rx) = mpsc::channel(8);

        tx.send(PipelineCommand::SetMode(OutputMode::Transcribe))
            .await
            .unwrap();
        tx.send(PipelineCommand::StartRecording).await.unwrap();
        tx.send(PipelineCommand::StopRecording).await.unwrap();
        drop(tx);

        fx.orchestrator.run(rx).await;

        let state = session.snapshot();
        assert_eq!(state.last_transcription, "hello");
        assert!(!state.is_busy);
    }
}
