//! Session lifecycle states

use std::fmt;

/// Session lifecycle.
///
/// `Connecting -> AwaitingCapture -> TurnInFlight -> (StreamingAudio)* -> Closed`.
/// Tool calls return to `TurnInFlight`. Fatal errors end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Connecting,
    AwaitingCapture,
    TurnInFlight,
    StreamingAudio,
    Closed,
    Failed,
}

impl TurnState {
    /// No further events are processed in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Closed | TurnState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Connecting => "connecting",
            TurnState::AwaitingCapture => "awaiting_capture",
            TurnState::TurnInFlight => "turn_in_flight",
            TurnState::StreamingAudio => "streaming_audio",
            TurnState::Closed => "closed",
            TurnState::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
