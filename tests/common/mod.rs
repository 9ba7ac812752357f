//! Scripted collaborators for session tests.
//!
//! Every fake writes into one shared [`Journal`], so tests can assert the
//! relative order of inbound events, outbound events and device calls.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use waav_talk::core::audio::{
    AudioFormat, AudioOutput, CaptureDevice, CaptureError, CaptureStream, PlaybackError,
};
use waav_talk::core::realtime::{BoxedTransport, RealtimeConnector};
use waav_talk::{
    ClientEvent, RealtimeError, RealtimeResult, RealtimeTransport, Recording, ServerEvent,
    Transcriber, TranscriptionError,
};

/// One observable step of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Sent(Value),
    Received(&'static str),
    Closed,
    Played(Vec<u8>),
    Ended,
    DeviceStopped,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Value> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Sent(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Played(pcm) => Some(pcm),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, entry: &Entry) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn has_sent(&self, kind: &str) -> bool {
        self.sent().iter().any(|v| v["type"] == kind)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Inbound script of a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver this event
    Event(ServerEvent),
    /// Hold back the rest of the script until `n` `response.create` events
    /// have been sent
    AfterResponseCreates(usize),
    /// The server drops the connection
    Disconnect,
}

struct Shared {
    steps: VecDeque<Step>,
    response_creates: usize,
}

/// In-memory connection replaying a script. When the script runs dry the
/// connection stays open and silent.
pub struct ScriptedTransport {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
    journal: Journal,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>, journal: Journal) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                steps: steps.into(),
                response_creates: 0,
            })),
            notify: Arc::new(Notify::new()),
            journal,
        }
    }

    fn next_ready(&self) -> Option<Option<ServerEvent>> {
        let mut shared = self.shared.lock().unwrap();
        loop {
            match shared.steps.front().cloned() {
                Some(Step::Event(event)) => {
                    shared.steps.pop_front();
                    return Some(Some(event));
                }
                Some(Step::AfterResponseCreates(n)) if shared.response_creates >= n => {
                    shared.steps.pop_front();
                }
                Some(Step::Disconnect) => return Some(None),
                Some(Step::AfterResponseCreates(_)) | None => return None,
            }
        }
    }
}

#[async_trait]
impl RealtimeTransport for ScriptedTransport {
    async fn send(&mut self, event: ClientEvent) -> RealtimeResult<()> {
        if matches!(event, ClientEvent::ResponseCreate { .. }) {
            self.shared.lock().unwrap().response_creates += 1;
        }
        self.journal
            .push(Entry::Sent(serde_json::to_value(&event).unwrap()));
        self.notify.notify_one();
        Ok(())
    }

    async fn recv(&mut self) -> Option<RealtimeResult<ServerEvent>> {
        loop {
            match self.next_ready() {
                Some(Some(event)) => {
                    self.journal.push(Entry::Received(event.kind()));
                    return Some(Ok(event));
                }
                Some(None) => return None,
                None => self.notify.notified().await,
            }
        }
    }

    async fn close(&mut self) -> RealtimeResult<()> {
        self.journal.push(Entry::Closed);
        Ok(())
    }
}

/// Hands out one scripted transport.
pub struct ScriptedConnector {
    transport: Mutex<Option<ScriptedTransport>>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>, journal: Journal) -> Self {
        Self {
            transport: Mutex::new(Some(ScriptedTransport::new(steps, journal))),
        }
    }

    /// A connector whose endpoint refuses connections.
    pub fn refusing() -> Self {
        Self {
            transport: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RealtimeConnector for ScriptedConnector {
    async fn connect(&self) -> RealtimeResult<BoxedTransport> {
        match self.transport.lock().unwrap().take() {
            Some(transport) => {
                let transport: BoxedTransport = Box::new(transport);
                Ok(transport)
            }
            None => Err(RealtimeError::ConnectionFailed(
                "connection refused".to_string(),
            )),
        }
    }
}

// =============================================================================
// Capture device
// =============================================================================

/// Capture device backed by a channel the test controls.
pub struct ScriptedDevice {
    stream: Option<CaptureStream>,
    journal: Journal,
}

impl ScriptedDevice {
    pub fn from_stream(stream: CaptureStream, journal: Journal) -> Self {
        Self {
            stream: Some(stream),
            journal,
        }
    }

    /// Emits `chunks`, then ends the stream.
    pub fn finite(chunks: &[&[u8]], journal: Journal) -> Self {
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            tx.try_send(Ok(Bytes::copy_from_slice(chunk))).unwrap();
        }
        Self::from_stream(rx, journal)
    }

    /// Fails to open.
    pub fn unavailable(journal: Journal) -> Self {
        Self {
            stream: None,
            journal,
        }
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn start(&mut self, _format: AudioFormat) -> Result<CaptureStream, CaptureError> {
        self.stream
            .take()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no microphone".to_string()))
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.journal.push(Entry::DeviceStopped);
        Ok(())
    }
}

// =============================================================================
// Transcriber and output
// =============================================================================

/// Returns a fixed text and remembers what it was given.
pub struct FixedTranscriber {
    text: String,
    seen: Arc<Mutex<Vec<Bytes>>>,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> (Arc<Self>, Arc<Mutex<Vec<Bytes>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(Self {
                text: text.to_string(),
                seen: seen.clone(),
            }),
            seen,
        )
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, recording: &Recording) -> Result<String, TranscriptionError> {
        self.seen.lock().unwrap().push(recording.pcm().clone());
        Ok(self.text.clone())
    }
}

/// Output device that journals every call.
pub struct JournalOutput {
    journal: Journal,
}

impl JournalOutput {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

#[async_trait]
impl AudioOutput for JournalOutput {
    async fn write(&mut self, pcm: &[u8]) -> Result<(), PlaybackError> {
        self.journal.push(Entry::Played(pcm.to_vec()));
        Ok(())
    }

    async fn end(&mut self) -> Result<(), PlaybackError> {
        self.journal.push(Entry::Ended);
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

pub fn audio_delta(pcm: &[u8]) -> Step {
    Step::Event(ServerEvent::AudioDelta {
        delta: BASE64_STANDARD.encode(pcm),
        item_id: None,
        response_id: None,
    })
}

pub fn audio_done() -> Step {
    Step::Event(ServerEvent::AudioDone {
        item_id: None,
        response_id: None,
    })
}

pub fn tool_call(name: &str, arguments: &str, call_id: &str) -> Step {
    Step::Event(ServerEvent::FunctionCallArgumentsDone {
        name: Some(name.to_string()),
        arguments: arguments.to_string(),
        call_id: Some(call_id.to_string()),
        item_id: None,
    })
}

pub fn transcript_done(text: &str) -> Step {
    Step::Event(ServerEvent::AudioTranscriptDone {
        transcript: text.to_string(),
    })
}
