//! Advisory content moderation of transcripts.
//!
//! Results are observed and logged. They never block or alter the text sent
//! to the model.

mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::{DEFAULT_MODERATION_MODEL, OpenAIModerator};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Outcome of classifying one text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModerationResult {
    pub flagged: bool,
    /// Names of the categories that were flagged, sorted
    pub categories: Vec<String>,
}

#[async_trait]
pub trait Moderator: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ModerationResult, ModerationError>;
}
