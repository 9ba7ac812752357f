pub mod audio;
pub mod moderation;
pub mod realtime;
pub mod session;
pub mod stt;
pub mod tools;

// Re-export commonly used types for convenience
pub use audio::{
    AudioFormat, AudioOutput, CaptureDevice, CaptureError, CaptureStream, CommandCapture,
    CommandPlayback, PlaybackError,
};

pub use moderation::{ModerationError, ModerationResult, Moderator, OpenAIModerator};

pub use realtime::{
    ClientEvent, ConversationItem, RealtimeConnector, RealtimeError, RealtimeResult,
    RealtimeTransport, ResponseConfig, ServerEvent, WebSocketConnector,
};

pub use session::{
    AudioPlaybackSink, CaptureSession, ConversationEventRouter, RouteOutcome, SessionError,
    SessionOrchestrator, SessionResult, TurnState,
};

pub use stt::{Recording, Transcriber, TranscriptionError, WhisperTranscriber};

pub use tools::{
    FnTool, ToolError, ToolHandler, ToolRegistry, ToolResult, ToolSchema, calculate_sum_tool,
};
