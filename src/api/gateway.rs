//! `ServiceGateway` trait and the OpenAI-compatible implementation.
//!
//! [`OpenAiGateway`] talks to any endpoint that speaks the OpenAI wire
//! formats: multipart `/v1/audio/transcriptions` for speech-to-text and JSON
//! `/v1/chat/completions` for both the text and the audio-chat variants.
//! All connection details come from [`ApiConfig`]; nothing is hardcoded.
//!
//! A non-2xx status surfaces as [`ApiError::Status`] with the response body
//! attached for diagnostics.  A 2xx response with zero choices is *not* an
//! error here; callers treat it as a valid-but-empty result.

use async_trait::async_trait;
use thiserror::Error;

use crate::api::types::{
    AudioChatRequest, AudioChatResponse, InterpretRequest, InterpretResponse, TranscribeResponse,
};
use crate::config::ApiConfig;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the remote services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be parsed as the expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceGateway trait
// ---------------------------------------------------------------------------

/// Uniform async interface to the three remote AI operations.
///
/// Implementors must be `Send + Sync` so the orchestrator can hold them
/// behind an `Arc<dyn ServiceGateway>` and call them from a tokio task.
#[async_trait]
pub trait ServiceGateway: Send + Sync {
    /// Speech-to-text on a finished recording.
    ///
    /// `audio` is the raw container bytes; `file_name` carries the extension
    /// the server uses for container detection (e.g. `"utterance.wav"`).
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: String,
    ) -> Result<TranscribeResponse, ApiError>;

    /// Contextual text reply for a message history.
    async fn interpret(&self, request: InterpretRequest) -> Result<InterpretResponse, ApiError>;

    /// Audio-in / audio-out chat turn.
    async fn audio_chat(&self, request: AudioChatRequest)
        -> Result<AudioChatResponse, ApiError>;
}

// Compile-time assertion: Box<dyn ServiceGateway> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ServiceGateway>) {}
};

// ---------------------------------------------------------------------------
// OpenAiGateway
// ---------------------------------------------------------------------------

/// Production gateway calling an OpenAI-compatible API over `reqwest`.
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: ApiConfig,
}

impl OpenAiGateway {
    /// Build a gateway from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A default client is the last-resort fallback
    /// if the builder fails (should never happen in practice).
    pub fn from_config(config: &ApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Attach `Authorization: Bearer …` only when a non-empty key is
    /// configured, so local OpenAI-compatible servers work unauthenticated.
    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.config.api_key.as_deref().unwrap_or("");
        if key.is_empty() {
            req
        } else {
            req.bearer_auth(key)
        }
    }

    /// Check the status, returning [`ApiError::Status`] with the body text
    /// for any non-2xx response.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ServiceGateway for OpenAiGateway {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: String,
    ) -> Result<TranscribeResponse, ApiError> {
        log::debug!("gateway: transcribing {} bytes", audio.len());

        let mime = mime_for(&file_name);
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| ApiError::Request(e.to_string()))?,
            )
            .text("model", self.config.transcribe_model.clone());

        let url = format!("{}/v1/audio/transcriptions", self.config.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        response
            .json::<TranscribeResponse>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn interpret(&self, request: InterpretRequest) -> Result<InterpretResponse, ApiError> {
        log::debug!(
            "gateway: interpreting {} message(s) with {}",
            request.messages.len(),
            request.model
        );

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        response
            .json::<InterpretResponse>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn audio_chat(
        &self,
        request: AudioChatRequest,
    ) -> Result<AudioChatResponse, ApiError> {
        log::debug!("gateway: audio chat with {}", request.model);

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&request)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        response
            .json::<AudioChatResponse>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }
}

/// MIME type for the multipart file part, derived from the file extension.
fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/m4a",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> ApiConfig {
        ApiConfig {
            api_key: api_key.map(|s| s.to_string()),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _gateway = OpenAiGateway::from_config(&make_config(None));
    }

    #[test]
    fn from_config_accepts_empty_api_key() {
        let _gateway = OpenAiGateway::from_config(&make_config(Some("")));
    }

    /// Verify that `OpenAiGateway` is usable as `dyn ServiceGateway`.
    #[test]
    fn gateway_is_object_safe() {
        let gateway: Box<dyn ServiceGateway> =
            Box::new(OpenAiGateway::from_config(&make_config(Some("sk-test"))));
        drop(gateway);
    }

    #[test]
    fn mime_for_known_extensions() {
        assert_eq!(mime_for("utterance.wav"), "audio/wav");
        assert_eq!(mime_for("utterance.m4a"), "audio/m4a");
        assert_eq!(mime_for("clip.mp3"), "audio/mpeg");
        assert_eq!(mime_for("blob"), "application/octet-stream");
    }

    #[test]
    fn timeout_maps_to_timeout_variant() {
        // Can't fabricate a reqwest::Error directly; check the non-timeout
        // mapping via Display on the enum instead.
        let err = ApiError::Status {
            status: 401,
            body: "unauthorized".into(),
        };
        assert!(err.to_string().contains("401"));
    }
}
