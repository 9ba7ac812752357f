//! OpenAI Speech-to-Text (Whisper) API integration.
//!
//! Whisper is a REST batch API: the recording is uploaded as a WAV file in a
//! multipart form and the final transcript is returned in one response.

mod client;
pub mod messages;

pub use client::{DEFAULT_TRANSCRIPTION_MODEL, OPENAI_API_BASE, WhisperTranscriber};
pub use messages::{OpenAIError, OpenAIErrorResponse, TranscriptionResponse};
