//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::session::OutputMode;

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Settings for the remote AI endpoints (transcription + chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API endpoint, without a trailing slash.
    ///
    /// - OpenAI: `https://api.openai.com`
    /// - Any OpenAI-compatible server works as long as it exposes
    ///   `/v1/audio/transcriptions` and `/v1/chat/completions`.
    pub base_url: String,
    /// API key — `None` or empty for unauthenticated local servers.
    pub api_key: Option<String>,
    /// Model id for the transcription endpoint.
    pub transcribe_model: String,
    /// Model id for text interpretation.
    pub interpret_model: String,
    /// Model id for the audio-in / audio-out chat endpoint.
    pub audio_chat_model: String,
    /// Voice requested for synthesized reply audio.
    pub voice: String,
    /// Container format requested for reply audio (e.g. `"wav"`).
    pub reply_format: String,
    /// Completion token cap sent with both chat requests.
    pub max_tokens: u32,
    /// Maximum seconds to wait for any remote call before timing out.
    pub timeout_secs: u64,
    /// System prompt prepended to every interpret request.
    pub system_prompt: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            transcribe_model: "whisper-1".into(),
            interpret_model: "gpt-4o-mini".into(),
            audio_chat_model: "gpt-4o-audio-preview".into(),
            voice: "ballad".into(),
            reply_format: "wav".into(),
            max_tokens: 100,
            timeout_secs: 30,
            system_prompt: "You are a helpful assistant for a tourism app. \
                            Interpret user requests and provide contextual \
                            answers in less than 30 words"
                .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

/// Settings for audio capture and the on-device live recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Audio input device name — `None` means the system default.
    pub input_device: Option<String>,
    /// Path to the GGML model used by the live recognizer.  `None` means
    /// `<models_dir>/ggml-base.bin`.
    pub live_model_path: Option<PathBuf>,
    /// Live-recognition language as an ISO-639-1 code, or `"auto"`.
    pub live_language: String,
    /// How often the live recognizer re-transcribes the in-flight buffer.
    pub live_interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            live_model_path: None,
            live_language: "en".into(),
            live_interval_ms: 1_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_assistant::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output mode selected at startup.
    pub default_mode: OutputMode,
    /// Remote endpoint settings.
    pub api: ApiConfig,
    /// Capture / live-recognition settings.
    pub audio: AudioSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_mode: OutputMode::default(),
            api: ApiConfig::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
