//! Whisper transcription client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::info;
use zeroize::Zeroize;

use super::messages::{TranscriptionResponse, describe_error};
use crate::core::stt::{Recording, Transcriber, TranscriptionError};

/// Default base URL of the OpenAI REST API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Uploads recordings to `POST {base}/audio/transcriptions`.
pub struct WhisperTranscriber {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(api_key: impl Into<String>) -> Result<Self, TranscriptionError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(TranscriptionError::Configuration(
                "API key is required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(120)) // Whisper can take time for long audio
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                TranscriptionError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            language: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// ISO-639-1 hint for the spoken language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    fn api_url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

impl Drop for WhisperTranscriber {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, recording: &Recording) -> Result<String, TranscriptionError> {
        if recording.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let wav_data = recording
            .to_wav()
            .map_err(|e| TranscriptionError::Encoding(e.to_string()))?;
        info!(
            "Sending {} bytes ({} ms) of audio to OpenAI Whisper API",
            wav_data.len(),
            recording.duration_ms()
        );

        let file_part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Configuration(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .http_client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_error(status, &response_text);
            return Err(if status.as_u16() == 401 {
                TranscriptionError::AuthenticationFailed(message)
            } else {
                TranscriptionError::Provider {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let transcription: TranscriptionResponse = serde_json::from_str(&response_text)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        info!(
            "Transcription complete: {} characters",
            transcription.text.len()
        );
        Ok(transcription.text)
    }
}
