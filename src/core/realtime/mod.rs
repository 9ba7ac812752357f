//! Realtime duplex connection to the conversational model.
//!
//! # Architecture
//!
//! - [`RealtimeConnector`] opens the connection
//! - [`RealtimeTransport`] carries typed [`ClientEvent`]s out and
//!   [`ServerEvent`]s in
//! - [`openai`] implements both over the OpenAI Realtime WebSocket API
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_talk::core::realtime::{ClientEvent, ConversationItem, RealtimeConnector, WebSocketConnector};
//!
//! let connector = WebSocketConnector::for_model(Default::default(), "sk-...");
//! let mut transport = connector.connect().await?;
//! transport
//!     .send(ClientEvent::create_item(ConversationItem::user_text("hello")))
//!     .await?;
//! while let Some(event) = transport.recv().await {
//!     println!("{}", event?.kind());
//! }
//! ```

mod base;
pub mod openai;

pub use base::{
    BoxedTransport, RealtimeConnector, RealtimeError, RealtimeResult, RealtimeTransport,
};
pub use openai::{
    ClientEvent, ContentPart, ConversationItem, Modality, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice, ResponseConfig, Role,
    ServerEvent, ToolChoice, WebSocketConnector, WebSocketTransport,
};
