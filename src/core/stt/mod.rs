//! Speech-to-text collaborators.
//!
//! A capture produces one [`Recording`]; a [`Transcriber`] turns it into the
//! text that opens the conversation turn. Transcription is single-shot: the
//! whole recording is uploaded once and the final text comes back.

pub mod openai;
mod recording;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{DEFAULT_TRANSCRIPTION_MODEL, WhisperTranscriber};
pub use recording::Recording;

/// Transcription failures.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Nothing was recorded
    #[error("Recording contains no audio")]
    EmptyAudio,

    /// The recording could not be encoded for upload
    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    /// Request could not be sent or the response could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// The service rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The service answered with an error status
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The response body was not a transcription
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Turns a finished recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording: &Recording) -> Result<String, TranscriptionError>;
}
