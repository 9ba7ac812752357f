//! Base traits and types for the realtime duplex connection.
//!
//! A session talks to the remote conversational model over exactly one
//! persistent connection. The connection is split into two seams:
//!
//! - [`RealtimeConnector`] opens a connection (the `Connecting` phase)
//! - [`RealtimeTransport`] is the open connection: typed events out, typed
//!   events in, and an explicit close

use async_trait::async_trait;
use thiserror::Error;

use super::openai::messages::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by the duplex connection.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The connection is already closed
    #[error("Not connected")]
    NotConnected,

    /// The remote side closed the connection before the session finished
    #[error("Connection closed unexpectedly: {0}")]
    ClosedUnexpectedly(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Transport Traits
// =============================================================================

/// An open duplex connection to the realtime model.
///
/// Implementations must deliver inbound events in the order they were
/// received. `recv` returning `None` means the remote side closed the
/// connection.
#[async_trait]
pub trait RealtimeTransport: Send {
    /// Serialize and send one client event.
    async fn send(&mut self, event: ClientEvent) -> RealtimeResult<()>;

    /// Wait for the next inbound event.
    async fn recv(&mut self) -> Option<RealtimeResult<ServerEvent>>;

    /// Close the connection. Closing an already closed transport is a no-op.
    async fn close(&mut self) -> RealtimeResult<()>;
}

/// Boxed transport handed from a connector to the session.
pub type BoxedTransport = Box<dyn RealtimeTransport>;

/// Opens realtime connections.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// Open a new connection with the connector's credentials.
    async fn connect(&self) -> RealtimeResult<BoxedTransport>;
}
