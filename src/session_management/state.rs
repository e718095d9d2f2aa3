use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a session.
///
/// States only ever move forward: `Pending` → `Running` →
/// `WaitingForInput` → one of the three terminal states. Any state may jump
/// directly to a terminal state, and a session never leaves a terminal state.
///
/// Variants:
/// - `Pending`: admitted, no sandbox bound yet.
/// - `Running`: sandbox active, accepting input and producing output.
/// - `WaitingForInput`: the caller closed further input; output still flows.
/// - `Finished`: the sandbox exited on its own.
/// - `Terminated`: force-stopped (cancellation, idle timeout, output
///   overflow, or admission timeout).
/// - `Closed`: explicit administrative close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Pending,
    Running,
    WaitingForInput,
    Finished,
    Terminated,
    Closed,
}

impl SessionState {
    /// Whether this state is terminal. Terminal states are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Terminated | SessionState::Closed
        )
    }

    /// Whether input writes are permitted in this state.
    ///
    /// `WaitingForInput` still passes the gate: the state only records that
    /// the caller closed the stream, so a late write surfaces a closed-stream
    /// error instead of a state error.
    pub fn accepts_input(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::WaitingForInput)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Pending => "PENDING",
            SessionState::Running => "RUNNING",
            SessionState::WaitingForInput => "WAITING_FOR_INPUT",
            SessionState::Finished => "FINISHED",
            SessionState::Terminated => "TERMINATED",
            SessionState::Closed => "CLOSED",
        };
        write!(f, "{}", name)
    }
}
