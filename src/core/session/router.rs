//! Conversation event router
//!
//! Dispatches inbound realtime events for the active turn: audio deltas go to
//! the playback sink, tool calls are answered through the registry, and
//! `response.audio.done` ends the turn.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::error::{SessionError, SessionResult};
use super::sink::AudioPlaybackSink;
use super::state::TurnState;
use crate::core::realtime::{
    ClientEvent, ConversationItem, RealtimeError, RealtimeTransport, ServerEvent,
};
use crate::core::tools::{ToolError, ToolRegistry};

/// What the session should do after an event was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Keep reading events
    Continue,
    /// The connection has been closed; stop reading
    Closed,
}

/// Interprets inbound events for one session, strictly in arrival order.
///
/// The router owns the turn state machine. The connection and the playback
/// sink stay owned by the orchestrator and are lent to each call.
pub struct ConversationEventRouter {
    tools: Arc<ToolRegistry>,
    state: TurnState,
    /// call_id -> tool name, from `response.output_item.added`
    pending_calls: HashMap<String, String>,
    tool_calls: usize,
}

impl ConversationEventRouter {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            state: TurnState::default(),
            pending_calls: HashMap::new(),
            tool_calls: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Number of tool calls answered so far.
    pub fn tool_calls(&self) -> usize {
        self.tool_calls
    }

    pub(crate) fn set_state(&mut self, state: TurnState) {
        if self.state != state {
            debug!("Session state: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Route one inbound event.
    ///
    /// Once the router reached a terminal state every event is ignored.
    pub async fn on_event(
        &mut self,
        event: ServerEvent,
        transport: &mut dyn RealtimeTransport,
        sink: &mut AudioPlaybackSink,
    ) -> SessionResult<RouteOutcome> {
        if self.state.is_terminal() {
            trace!("Ignoring {} after session end", event.kind());
            return Ok(RouteOutcome::Closed);
        }

        match event {
            ServerEvent::AudioDelta { delta, .. } => {
                // A chunk that cannot be decoded would leave a gap in playback
                let pcm = ServerEvent::decode_audio_delta(&delta).map_err(|e| {
                    RealtimeError::SerializationError(format!("invalid audio delta: {e}"))
                })?;
                self.set_state(TurnState::StreamingAudio);
                sink.write(&pcm).await?;
            }

            ServerEvent::AudioDone { .. } => {
                info!("Audio response complete");
                sink.end().await?;
                transport.close().await?;
                self.set_state(TurnState::Closed);
                return Ok(RouteOutcome::Closed);
            }

            ServerEvent::FunctionCallArgumentsDone {
                name,
                arguments,
                call_id,
                ..
            } => {
                self.handle_tool_call(name, arguments, call_id, transport)
                    .await?;
            }

            ServerEvent::OutputItemAdded { item } => {
                if item.item_type == "function_call" {
                    if let (Some(call_id), Some(name)) = (item.call_id, item.name) {
                        debug!("Tracking function call: call_id={}, name={}", call_id, name);
                        self.pending_calls.insert(call_id, name);
                    }
                }
            }

            ServerEvent::Error { error } => {
                error!(
                    "OpenAI Realtime error: {} ({})",
                    error.message, error.error_type
                );
            }

            ServerEvent::SessionCreated { session } => {
                info!("OpenAI Realtime session created: {}", session.id);
            }

            ServerEvent::AudioTranscriptDone { transcript } => {
                info!("Assistant transcript: {}", transcript);
            }

            ServerEvent::TextDone { text } => {
                info!("Assistant text: {}", text);
            }

            ServerEvent::ResponseCreated { .. } | ServerEvent::ResponseDone { .. } => {
                debug!("Observed {}", event.kind());
            }

            ServerEvent::Unknown => trace!("Unhandled server event"),
        }

        Ok(RouteOutcome::Continue)
    }

    async fn handle_tool_call(
        &mut self,
        name: Option<String>,
        arguments: String,
        call_id: Option<String>,
        transport: &mut dyn RealtimeTransport,
    ) -> SessionResult<()> {
        let tracked = call_id
            .as_deref()
            .and_then(|id| self.pending_calls.remove(id));
        let name = name.or(tracked).unwrap_or_default();
        info!("Using function {} with arguments {}", name, arguments);

        if !self.tools.contains(&name) {
            return Err(SessionError::UnknownTool(name));
        }

        let args = parse_arguments(&name, &arguments)?;
        let output = self.tools.invoke(&name, args).await?;
        self.tool_calls += 1;

        self.set_state(TurnState::TurnInFlight);
        transport
            .send(ClientEvent::create_item(ConversationItem::function_output(
                call_id, output,
            )))
            .await?;
        transport.send(ClientEvent::continue_response()).await?;
        Ok(())
    }
}

/// Empty payloads count as an empty argument object.
fn parse_arguments(tool: &str, arguments: &str) -> Result<Value, ToolError> {
    if arguments.trim().is_empty() {
        warn!("Tool {} called without arguments", tool);
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments).map_err(|e| ToolError::invalid_arguments(tool, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AudioOutput, PlaybackError};
    use crate::core::realtime::{RealtimeResult, openai::messages::OutputItem};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<ClientEvent>,
        closes: usize,
    }

    #[async_trait]
    impl RealtimeTransport for RecordingTransport {
        async fn send(&mut self, event: ClientEvent) -> RealtimeResult<()> {
            self.sent.push(event);
            Ok(())
        }

        async fn recv(&mut self) -> Option<RealtimeResult<ServerEvent>> {
            None
        }

        async fn close(&mut self) -> RealtimeResult<()> {
            self.closes += 1;
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Speaker {
        written: Arc<Mutex<Vec<u8>>>,
        ends: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl AudioOutput for Speaker {
        async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
            self.written.lock().unwrap().extend_from_slice(pcm);
            Ok(())
        }

        async fn end(&mut self) -> Result<(), PlaybackError> {
            *self.ends.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn router() -> ConversationEventRouter {
        let mut router = ConversationEventRouter::new(Arc::new(ToolRegistry::with_builtins()));
        router.set_state(TurnState::TurnInFlight);
        router
    }

    fn tool_call(name: Option<&str>, arguments: &str, call_id: Option<&str>) -> ServerEvent {
        ServerEvent::FunctionCallArgumentsDone {
            name: name.map(str::to_string),
            arguments: arguments.to_string(),
            call_id: call_id.map(str::to_string),
            item_id: None,
        }
    }

    #[tokio::test]
    async fn test_audio_delta_streams_to_sink() {
        let speaker = Speaker::default();
        let mut sink = AudioPlaybackSink::new(speaker.clone());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        let outcome = router
            .on_event(
                ServerEvent::AudioDelta {
                    delta: "AQID".to_string(),
                    item_id: None,
                    response_id: None,
                },
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(outcome, RouteOutcome::Continue);
        assert_eq!(*speaker.written.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(router.state(), TurnState::StreamingAudio);
    }

    #[tokio::test]
    async fn test_undecodable_audio_delta_fails_turn() {
        let speaker = Speaker::default();
        let mut sink = AudioPlaybackSink::new(speaker.clone());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        let err = router
            .on_event(
                ServerEvent::AudioDelta {
                    delta: "not base64!".to_string(),
                    item_id: None,
                    response_id: None,
                },
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Connection(RealtimeError::SerializationError(_))
        ));
        assert!(speaker.written.lock().unwrap().is_empty());
        assert_eq!(router.state(), TurnState::TurnInFlight);
    }

    #[tokio::test]
    async fn test_tool_call_by_tracked_call_id() {
        let mut sink = AudioPlaybackSink::new(Speaker::default());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        router
            .on_event(
                ServerEvent::OutputItemAdded {
                    item: OutputItem {
                        id: Some("item_1".to_string()),
                        item_type: "function_call".to_string(),
                        call_id: Some("call_1".to_string()),
                        name: Some("calculate_sum".to_string()),
                    },
                },
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap();
        router
            .on_event(
                tool_call(None, r#"{"a":1,"b":2}"#, Some("call_1")),
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(transport.sent.len(), 2);
        let item = serde_json::to_value(&transport.sent[0]).unwrap();
        assert_eq!(item["item"]["call_id"], "call_1");
        assert_eq!(item["item"]["output"], "3");
        assert_eq!(router.tool_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_without_sending() {
        let mut sink = AudioPlaybackSink::new(Speaker::default());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        let err = router
            .on_event(
                tool_call(Some("calculate_sum"), "{not json", None),
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::ToolExecution(ToolError::InvalidArguments { .. })));
        assert!(transport.sent.is_empty());
    }

    #[tokio::test]
    async fn test_events_after_close_are_ignored() {
        let speaker = Speaker::default();
        let mut sink = AudioPlaybackSink::new(speaker.clone());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        let outcome = router
            .on_event(
                ServerEvent::AudioDone {
                    item_id: None,
                    response_id: None,
                },
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Closed);

        let outcome = router
            .on_event(
                tool_call(Some("calculate_sum"), r#"{"a":1,"b":2}"#, None),
                &mut transport,
                &mut sink,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::Closed);
        assert!(transport.sent.is_empty());
        assert_eq!(transport.closes, 1);
        assert_eq!(*speaker.ends.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_error_events_are_no_ops() {
        let mut sink = AudioPlaybackSink::new(Speaker::default());
        let mut transport = RecordingTransport::default();
        let mut router = router();

        let error: ServerEvent = serde_json::from_value(json!({
            "type": "error",
            "error": {"type": "server_error", "message": "hiccup"}
        }))
        .unwrap();
        for event in [error, ServerEvent::Unknown] {
            let outcome = router
                .on_event(event, &mut transport, &mut sink)
                .await
                .unwrap();
            assert_eq!(outcome, RouteOutcome::Continue);
        }
        assert_eq!(router.state(), TurnState::TurnInFlight);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_parse_empty_arguments() {
        assert_eq!(parse_arguments("t", "  ").unwrap(), json!({}));
        assert!(parse_arguments("t", "[").is_err());
    }
}
