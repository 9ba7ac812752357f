//! Session error type
//!
//! Aggregates the errors of every stage a session passes through.

use thiserror::Error;

use crate::core::audio::{CaptureError, PlaybackError};
use crate::core::realtime::RealtimeError;
use crate::core::stt::TranscriptionError;
use crate::core::tools::ToolError;

/// Every way a session can fail. None of these is retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    /// The model called a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(ToolError),

    #[error("Connection error: {0}")]
    Connection(#[from] RealtimeError),

    #[error("Playback failed: {0}")]
    Playback(#[from] PlaybackError),

    /// The operator cancelled the session
    #[error("Session cancelled")]
    Cancelled,
}

impl From<ToolError> for SessionError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::UnknownTool(name) => SessionError::UnknownTool(name),
            other => SessionError::ToolExecution(other),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_mapping() {
        let err: SessionError = ToolError::UnknownTool("nope".to_string()).into();
        assert!(matches!(err, SessionError::UnknownTool(name) if name == "nope"));

        let err: SessionError = ToolError::execution("calculate_sum", "overflow").into();
        assert!(matches!(err, SessionError::ToolExecution(_)));
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_connection_error_display() {
        let err: SessionError = RealtimeError::ClosedUnexpectedly("eof".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Connection error: Connection closed unexpectedly: eof"
        );
    }
}
