//! Session orchestration
//!
//! Runs one turn end to end: capture and transcription, connect, opening
//! turn, event routing and teardown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::capture::CaptureSession;
use super::error::{SessionError, SessionResult};
use super::router::{ConversationEventRouter, RouteOutcome};
use super::sink::AudioPlaybackSink;
use super::state::TurnState;
use crate::core::audio::AudioOutput;
use crate::core::realtime::{
    BoxedTransport, ClientEvent, ConversationItem, Modality, RealtimeConnector, RealtimeError,
    ResponseConfig, ToolChoice,
};
use crate::core::tools::ToolRegistry;

/// Response instructions used when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "Please assist the user. Keep answers concise.";

/// Drives one voice session from connect to close.
///
/// The orchestrator exclusively owns the connection, the capture session and
/// the playback sink. Teardown (capture device, connection, output device)
/// runs exactly once, whichever way the session ends.
pub struct SessionOrchestrator {
    connector: Box<dyn RealtimeConnector>,
    capture: CaptureSession,
    sink: AudioPlaybackSink,
    tools: Arc<ToolRegistry>,
    router: ConversationEventRouter,
    transport: Option<BoxedTransport>,
    instructions: String,
    voice: Option<String>,
    cancel: CancellationToken,
    started: bool,
    torn_down: bool,
}

impl SessionOrchestrator {
    pub fn new(
        connector: impl RealtimeConnector + 'static,
        capture: CaptureSession,
        output: impl AudioOutput + 'static,
        tools: ToolRegistry,
    ) -> Self {
        Self::from_parts(
            Box::new(connector),
            capture,
            AudioPlaybackSink::new(output),
            Arc::new(tools),
        )
    }

    pub fn from_parts(
        connector: Box<dyn RealtimeConnector>,
        capture: CaptureSession,
        sink: AudioPlaybackSink,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            connector,
            capture,
            sink,
            router: ConversationEventRouter::new(Arc::clone(&tools)),
            tools,
            transport: None,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            voice: None,
            cancel: CancellationToken::new(),
            started: false,
            torn_down: false,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the session from outside.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TurnState {
        self.router.state()
    }

    /// Number of tool calls answered in this session.
    pub fn tool_calls(&self) -> usize {
        self.router.tool_calls()
    }

    /// Run the session. `stop` ends the recording.
    ///
    /// Returns once the model signalled the end of its audio, or with the
    /// first fatal error. A session runs at most once.
    pub async fn start(&mut self, stop: CancellationToken) -> SessionResult<()> {
        if self.started {
            return Err(RealtimeError::InvalidConfiguration(
                "session already started".to_string(),
            )
            .into());
        }
        self.started = true;

        let result = self.run(&stop).await;
        self.teardown().await;

        match result {
            Ok(()) => {
                info!("Session closed");
                Ok(())
            }
            Err(e) => {
                self.router.set_state(TurnState::Failed);
                error!("Session failed: {}", e);
                Err(e)
            }
        }
    }

    fn response_config(&self) -> ResponseConfig {
        ResponseConfig {
            modalities: vec![Modality::Text, Modality::Audio],
            instructions: Some(self.instructions.clone()),
            voice: self.voice.clone(),
            tools: Some(self.tools.schemas()),
            tool_choice: Some(ToolChoice::Auto),
        }
    }

    async fn run(&mut self, stop: &CancellationToken) -> SessionResult<()> {
        let cancel = self.cancel.clone();
        let response = self.response_config();

        self.router.set_state(TurnState::Connecting);
        let transport = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            connected = self.connector.connect() => connected?,
        };
        let transport = self.transport.insert(transport);
        self.router.set_state(TurnState::AwaitingCapture);

        // Inbound events keep being routed while the user speaks.
        let text = {
            let capture = self.capture.run(stop);
            tokio::pin!(capture);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                    captured = &mut capture => break captured?,
                    event = transport.recv() => match event {
                        Some(Ok(event)) => {
                            let outcome = self
                                .router
                                .on_event(event, &mut **transport, &mut self.sink)
                                .await?;
                            if outcome == RouteOutcome::Closed {
                                warn!("Connection closed before the turn started");
                                return Ok(());
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            return Err(RealtimeError::ClosedUnexpectedly(
                                "connection closed during capture".to_string(),
                            )
                            .into());
                        }
                    },
                }
            }
        };

        self.router.set_state(TurnState::TurnInFlight);
        info!("Sending message to OpenAI: {}", text);
        transport
            .send(ClientEvent::create_item(ConversationItem::user_text(text)))
            .await?;
        transport
            .send(ClientEvent::ResponseCreate {
                response: Some(response),
            })
            .await?;

        loop {
            let event = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                event = transport.recv() => event,
            };

            match event {
                Some(Ok(event)) => {
                    let outcome = self
                        .router
                        .on_event(event, &mut **transport, &mut self.sink)
                        .await?;
                    if outcome == RouteOutcome::Closed {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(RealtimeError::ClosedUnexpectedly(
                        "connection closed before response.audio.done".to_string(),
                    )
                    .into());
                }
            }
        }
    }

    /// Release the capture device, the connection and the output device.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Err(e) = self.capture.release().await {
            warn!("Failed to stop capture device: {}", e);
        }

        if let Some(mut transport) = self.transport.take() {
            // A clean close already happened on response.audio.done
            if self.router.state() != TurnState::Closed {
                if let Err(e) = transport.close().await {
                    warn!("Failed to close connection: {}", e);
                }
            }
        }

        if let Err(e) = self.sink.end().await {
            warn!("Failed to release output device: {}", e);
        }
    }
}
