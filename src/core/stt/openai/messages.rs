//! Message types for the OpenAI REST APIs.
//!
//! API Reference: https://platform.openai.com/docs/api-reference/audio/createTranscription

use serde::{Deserialize, Serialize};

/// Transcription response (`json` format).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    /// The transcribed text.
    pub text: String,
}

/// OpenAI API error response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIErrorResponse {
    /// Error details.
    pub error: OpenAIError,
}

/// OpenAI API error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIError {
    /// Human-readable error message.
    pub message: String,

    /// Error type identifier.
    #[serde(rename = "type", default)]
    pub error_type: String,

    /// Parameter that caused the error (if applicable).
    #[serde(default)]
    pub param: Option<String>,

    /// Error code (if applicable).
    #[serde(default)]
    pub code: Option<String>,
}

impl std::fmt::Display for OpenAIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.error_type)
    }
}

/// Human-readable message for a failed OpenAI REST call.
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(error_response) => format!("OpenAI API error: {}", error_response.error),
        Err(_) => format!("OpenAI API error ({}): {}", status, body),
    }
}
