//! The voice session: one capture, one realtime connection, one turn.
//!
//! - [`CaptureSession`] records until stopped and returns the transcript
//! - [`ConversationEventRouter`] interprets inbound events in arrival order
//! - [`AudioPlaybackSink`] streams decoded audio to the output device
//! - [`SessionOrchestrator`] owns all of the above and the connection

mod capture;
mod error;
mod orchestrator;
mod router;
mod sink;
mod state;

pub use capture::CaptureSession;
pub use error::{SessionError, SessionResult};
pub use orchestrator::{DEFAULT_INSTRUCTIONS, SessionOrchestrator};
pub use router::{ConversationEventRouter, RouteOutcome};
pub use sink::AudioPlaybackSink;
pub use state::TurnState;
