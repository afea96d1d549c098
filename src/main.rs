//! Application entry point — Voice Assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Start the cpal input stream (degrades gracefully without a mic).
//! 4. Create the tokio runtime (multi-thread, 2 workers).
//! 5. Build the collaborators: recorder, transcoder, gateway, synthesizer,
//!    player, live recognizer.
//! 6. Spawn the pipeline [`Orchestrator`] and a session observer that prints
//!    results as they land.
//! 7. Run the interactive prompt loop on the main thread — blocks until the
//!    user quits.
//!
//! The cpal stream is `!Send`, so it lives on the main thread for the whole
//! process lifetime; recording is gated by the shared [`RecordingBuffer`]
//! flag rather than by starting and stopping the stream.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use voice_assistant::{
    api::OpenAiGateway,
    audio::{start_input_stream, MicRecorder, RecordingBuffer, RodioPlayer, WavTranscoder},
    config::{AppConfig, AppPaths},
    pipeline::{Orchestrator, OrchestratorSettings, PipelineCommand},
    session::{OutputMode, SessionHandle, SessionState},
    speech::{SystemSynthesizer, WhisperLiveRecognizer},
};

// ---------------------------------------------------------------------------
// Session observer
// ---------------------------------------------------------------------------

/// Print every user-visible state change as it is published.
///
/// Runs until the orchestrator (the only sender) is dropped.
async fn observe_session(mut rx: tokio::sync::watch::Receiver<SessionState>) {
    let mut previous = rx.borrow().clone();

    while rx.changed().await.is_ok() {
        let state = rx.borrow().clone();

        if state.last_transcription != previous.last_transcription {
            println!(">> {}", state.last_transcription);
        }
        if state.last_reply != previous.last_reply {
            println!("<< {}", state.last_reply);
        }
        if state.is_busy && !previous.is_busy {
            println!("   … processing ({})", state.selected_mode);
        }

        previous = state;
    }
}

// ---------------------------------------------------------------------------
// Interactive prompt loop
// ---------------------------------------------------------------------------

/// Read commands from stdin on the main thread.
///
/// * empty line — toggle recording (start, then stop-and-process)
/// * `mode <name>` — select the output mode for the next recording
/// * `quit` / `exit` — shut down
fn prompt_loop(command_tx: mpsc::Sender<PipelineCommand>) {
    println!("Modes: transcribe, interpret, spoken, audio-chat, live");
    println!("Press Enter to start/stop recording, `mode <name>` to switch, `quit` to exit.");

    let stdin = std::io::stdin();
    let mut recording = false;
    let mut line = String::new();

    loop {
        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let input = line.trim();

        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            break;
        }

        if let Some(word) = input.strip_prefix("mode ") {
            match OutputMode::parse(word) {
                Some(mode) => {
                    println!("Mode: {mode}");
                    if command_tx
                        .blocking_send(PipelineCommand::SetMode(mode))
                        .is_err()
                    {
                        break;
                    }
                }
                None => println!("Unknown mode: {word}"),
            }
            continue;
        }

        if !input.is_empty() {
            println!("Unrecognised input (Enter toggles recording, `quit` exits).");
            continue;
        }

        let command = if recording {
            println!("Recording stopped.");
            PipelineCommand::StopRecording
        } else {
            println!("Recording… press Enter again to stop.");
            PipelineCommand::StartRecording
        };
        recording = !recording;

        if command_tx.blocking_send(command).is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Voice Assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();
    std::fs::create_dir_all(&paths.cache_dir)?;

    // 3. cpal input stream — stays on the main thread; the shared buffer
    //    decides whether incoming frames are kept.
    let buffer = RecordingBuffer::new();
    let (_stream, native_rate, native_channels) =
        match start_input_stream(buffer.clone(), config.audio.input_device.as_deref()) {
            Ok(stream) => {
                let (rate, channels) = (stream.sample_rate, stream.channels);
                (Some(stream), rate, channels)
            }
            Err(e) => {
                log::warn!("No usable input device ({e}); recordings will be empty");
                (None, 16_000, 1)
            }
        };

    // 4. Tokio runtime (2 workers — pipeline + blocking conversions)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 5. Collaborators
    let session = SessionHandle::new(config.default_mode);

    let recorder = MicRecorder::new(
        buffer.clone(),
        native_rate,
        native_channels,
        paths.cache_dir.clone(),
    );

    let model_path = config
        .audio
        .live_model_path
        .clone()
        .unwrap_or_else(|| paths.models_dir.join("ggml-base.bin"));
    let live = WhisperLiveRecognizer::new(
        &model_path,
        &config.audio.live_language,
        buffer.clone(),
        native_rate,
        native_channels,
        session.clone(),
        Duration::from_millis(config.audio.live_interval_ms),
    );

    let orchestrator = Orchestrator::new(
        session.clone(),
        Box::new(recorder),
        std::sync::Arc::new(WavTranscoder::new()),
        std::sync::Arc::new(OpenAiGateway::from_config(&config.api)),
        std::sync::Arc::new(SystemSynthesizer::new()),
        Box::new(RodioPlayer::new()),
        Box::new(live),
        OrchestratorSettings::from_config(&config.api),
    );

    // 6. Pipeline + observer tasks
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(16);
    rt.spawn(orchestrator.run(command_rx));
    rt.spawn(observe_session(session.subscribe()));

    // 7. Interactive loop — blocks the main thread until quit/EOF.
    prompt_loop(command_tx);

    log::info!("Voice Assistant shutting down");
    rt.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}
