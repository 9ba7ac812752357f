//! OpenAI Realtime API WebSocket message types.
//!
//! This module defines the client and server event types for the OpenAI Realtime API.
//! All events are JSON-encoded and sent over WebSocket.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - conversation.item.create - Add a user message or a function call result
//! - response.create - Ask the model to respond to the conversation so far
//!
//! Server events acted upon:
//! - response.audio.delta - Audio data chunk (base64 PCM16)
//! - response.audio.done - Audio generation complete
//! - response.function_call_arguments.done - Tool call with complete arguments
//!
//! Server events observed for logging only:
//! - error, session.created, response.created, response.done,
//!   response.output_item.added, response.audio_transcript.done, response.text.done
//!
//! Every other `type` deserializes to [`ServerEvent::Unknown`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::{Modality, ToolChoice};
use crate::core::tools::ToolSchema;

// =============================================================================
// Conversation Items
// =============================================================================

/// Role of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person speaking
    User,
    /// Out-of-band context such as tool results
    System,
    /// The model
    Assistant,
}

/// Typed content part within a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    /// User-provided text
    #[serde(rename = "input_text")]
    InputText {
        /// Text content
        text: String,
    },
    /// User-provided audio
    #[serde(rename = "input_audio")]
    InputAudio {
        /// Base64-encoded PCM16 audio
        audio: String,
    },
    /// Model text
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },
    /// Model audio
    #[serde(rename = "audio")]
    Audio {
        /// Base64-encoded audio
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        /// Transcript of the audio
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
}

/// Conversation item sent with `conversation.item.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    /// A message with ordered content parts
    #[serde(rename = "message")]
    Message {
        /// Item role
        role: Role,
        /// Content parts
        content: Vec<ContentPart>,
    },
    /// The stringified result of a tool invocation
    #[serde(rename = "function_call_output")]
    FunctionCallOutput {
        /// Item role
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        /// Call ID this output answers
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        /// Tool output
        output: String,
    },
}

impl ConversationItem {
    /// A user message carrying a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        ConversationItem::Message {
            role: Role::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    /// A `function_call_output` item with role `system`.
    pub fn function_output(call_id: Option<String>, output: impl Into<String>) -> Self {
        ConversationItem::FunctionCallOutput {
            role: Some(Role::System),
            call_id,
            output: output.into(),
        }
    }
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Response configuration for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Response modalities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modalities: Vec<Modality>,
    /// Instructions for this response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Voice for audio output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Tools offered to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
    /// Tool choice policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        /// Item to create
        item: ConversationItem,
    },

    /// Create a response; a bare event continues with session defaults
    #[serde(rename = "response.create")]
    ResponseCreate {
        /// Response configuration
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl ClientEvent {
    /// Wrap an item in a `conversation.item.create` event.
    pub fn create_item(item: ConversationItem) -> Self {
        ClientEvent::ConversationItemCreate { item }
    }

    /// A bare `{"type": "response.create"}`.
    pub fn continue_response() -> Self {
        ClientEvent::ResponseCreate { response: None }
    }

    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate { .. } => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error reported by the server
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: SessionInfo,
    },

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated {
        /// Response information
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    /// Response generation finished
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    /// Output item added to a response
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// The added item
        item: OutputItem,
    },

    /// Audio data chunk
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded PCM16 audio
        delta: String,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
        /// Response ID
        #[serde(default)]
        response_id: Option<String>,
    },

    /// Audio output complete
    #[serde(rename = "response.audio.done")]
    AudioDone {
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
        /// Response ID
        #[serde(default)]
        response_id: Option<String>,
    },

    /// Transcript of the spoken response
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        /// Full transcript
        #[serde(default)]
        transcript: String,
    },

    /// Text response complete
    #[serde(rename = "response.text.done")]
    TextDone {
        /// Full text
        #[serde(default)]
        text: String,
    },

    /// Tool call arguments complete
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Tool name (may be absent, see `OutputItemAdded`)
        #[serde(default)]
        name: Option<String>,
        /// JSON-encoded arguments
        arguments: String,
        /// Call ID
        #[serde(default)]
        call_id: Option<String>,
        /// Item ID
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Any event type this client does not act upon
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }

    /// Wire name of the event, `"unknown"` for unrecognised types.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Error { .. } => "error",
            ServerEvent::SessionCreated { .. } => "session.created",
            ServerEvent::ResponseCreated { .. } => "response.created",
            ServerEvent::ResponseDone { .. } => "response.done",
            ServerEvent::OutputItemAdded { .. } => "response.output_item.added",
            ServerEvent::AudioDelta { .. } => "response.audio.delta",
            ServerEvent::AudioDone { .. } => "response.audio.done",
            ServerEvent::AudioTranscriptDone { .. } => "response.audio_transcript.done",
            ServerEvent::TextDone { .. } => "response.text.done",
            ServerEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            ServerEvent::Unknown => "unknown",
        }
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Session information.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
}

/// Response information.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseInfo {
    /// Response ID
    pub id: String,
    /// Response status
    #[serde(default)]
    pub status: Option<String>,
}

/// Output item as announced by `response.output_item.added`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputItem {
    /// Item ID
    #[serde(default)]
    pub id: Option<String>,
    /// Item type (message, function_call, ...)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Call ID for function_call items
    #[serde(default)]
    pub call_id: Option<String>,
    /// Function name for function_call items
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
