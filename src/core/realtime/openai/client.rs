//! OpenAI Realtime API WebSocket transport.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events, one event per text frame
//! - Headers: `Authorization: Bearer <key>`, `OpenAI-Beta: realtime=v1`
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use zeroize::Zeroize;

use super::config::{OPENAI_REALTIME_BETA, OPENAI_REALTIME_URL, OpenAIRealtimeModel};
use super::messages::{ClientEvent, ServerEvent};
use crate::core::realtime::base::{
    BoxedTransport, RealtimeConnector, RealtimeError, RealtimeResult, RealtimeTransport,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Connector
// =============================================================================

/// Opens authenticated WebSocket connections to the realtime endpoint.
pub struct WebSocketConnector {
    url: String,
    api_key: String,
}

impl WebSocketConnector {
    /// Create a connector for a full endpoint URL (including the `model` query).
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Create a connector for the public OpenAI endpoint and the given model.
    pub fn for_model(model: OpenAIRealtimeModel, api_key: impl Into<String>) -> Self {
        Self::new(
            format!("{}?model={}", OPENAI_REALTIME_URL, model.as_str()),
            api_key,
        )
    }

    /// Endpoint URL this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(&self) -> RealtimeResult<tungstenite::handshake::client::Request> {
        if self.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("OpenAI-Beta", HeaderValue::from_static(OPENAI_REALTIME_BETA));

        Ok(request)
    }
}

impl std::fmt::Debug for WebSocketConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnector")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Drop for WebSocketConnector {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[async_trait]
impl RealtimeConnector for WebSocketConnector {
    async fn connect(&self) -> RealtimeResult<BoxedTransport> {
        let request = self.build_request()?;

        tracing::debug!("Connecting to realtime endpoint {}", self.url);
        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(response)
                    if response.status() == StatusCode::UNAUTHORIZED =>
                {
                    RealtimeError::AuthenticationFailed("Invalid API key".to_string())
                }
                other => RealtimeError::ConnectionFailed(other.to_string()),
            })?;

        tracing::info!("Connected to OpenAI Realtime API");
        let transport: BoxedTransport = Box::new(WebSocketTransport { ws: Some(ws) });
        Ok(transport)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// An open realtime WebSocket.
pub struct WebSocketTransport {
    ws: Option<WsStream>,
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn send(&mut self, event: ClientEvent) -> RealtimeResult<()> {
        let ws = self.ws.as_mut().ok_or(RealtimeError::NotConnected)?;

        let json = serde_json::to_string(&event)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        tracing::debug!("Sending {}", event.kind());

        ws.send(Message::Text(json.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    async fn recv(&mut self) -> Option<RealtimeResult<ServerEvent>> {
        let ws = self.ws.as_mut()?;

        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_server_event(&text) {
                        return Some(event);
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = ws.send(Message::Pong(data)).await {
                        tracing::error!("Failed to send pong: {}", e);
                        return Some(Err(RealtimeError::WebSocketError(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed by server: {:?}", frame);
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => return None,
                Some(Err(e)) => {
                    tracing::error!("WebSocket error: {}", e);
                    return Some(Err(RealtimeError::WebSocketError(e.to_string())));
                }
            }
        }
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        let Some(mut ws) = self.ws.take() else {
            return Ok(());
        };

        match ws.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => {
                tracing::info!("Disconnected from OpenAI Realtime API");
                Ok(())
            }
            Err(e) => Err(RealtimeError::WebSocketError(e.to_string())),
        }
    }
}

/// Decode one text frame.
///
/// Frames that are not JSON objects with a `type` are skipped (`None`). A
/// recognised type whose payload does not match is an error, since dropping
/// it could leave the turn waiting forever.
fn parse_server_event(text: &str) -> Option<RealtimeResult<ServerEvent>> {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(ServerEvent::Unknown) => {
            tracing::trace!("Unhandled server event: {}", text);
            Some(Ok(ServerEvent::Unknown))
        }
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            let kind = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("type")?.as_str().map(str::to_string));
            match kind {
                Some(kind) => {
                    tracing::error!("Malformed {} event: {}", kind, e);
                    Some(Err(RealtimeError::SerializationError(format!(
                        "malformed {kind} event: {e}"
                    ))))
                }
                None => {
                    tracing::warn!("Failed to parse server event: {} - {}", e, text);
                    None
                }
            }
        }
    }
}
