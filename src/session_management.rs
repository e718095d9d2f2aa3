//! Session management core module.
//!
//! A session is the unit of observable execution state: one submitted program,
//! one (eventual) sandbox, two bounded output buffers, and a set of timers that
//! guarantee the session always reaches a terminal state. This module provides
//! the session state machine itself plus the concurrency-safe registry that
//! indexes live sessions by id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Submodule for the concurrency-safe session registry.
pub mod registry;
/// Submodule for the session state machine and buffers.
pub mod session;
/// Submodule for session lifecycle states.
pub mod state;

pub use registry::SessionRegistry;
pub use session::{Session, SessionLimits, SessionView};
pub use state::SessionState;

/// Names one of a session's two output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}
