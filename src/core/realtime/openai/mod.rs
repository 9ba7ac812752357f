//! OpenAI Realtime API module.
//!
//! Typed wire events and the WebSocket transport for a single
//! request/response voice turn.
//!
//! # Supported Models
//!
//! - `gpt-4o-realtime-preview`
//! - `gpt-4o-realtime-preview-2024-12-17`
//! - `gpt-4o-mini-realtime-preview`
//! - `gpt-4o-mini-realtime-preview-2024-12-17` (default)
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Output audio is PCM 16-bit signed little-endian at 24kHz, base64 encoded
//! inside `response.audio.delta` events.

mod client;
pub mod config;
pub mod messages;

pub use client::{WebSocketConnector, WebSocketTransport};
pub use config::{
    Modality, OPENAI_REALTIME_BETA, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeModel, OpenAIRealtimeVoice, ToolChoice,
};
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, OutputItem, ResponseConfig, Role,
    ServerEvent,
};
