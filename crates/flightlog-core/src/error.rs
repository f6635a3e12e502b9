// ── Core error types ──
//
// Errors surfaced by the flightlog-core facade. Goal outcomes (rejected,
// preempted, canceled) are terminal statuses, not errors; only plumbing
// failures and send failures show up here.

use std::time::Duration;

use flightlog_link::{CommandKind, LinkError};
use thiserror::Error;

/// A single outbound command could not be handed to the link.
///
/// Never retried. The coordinator records it against the goal that
/// triggered the send; the thin services return it to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to send {command}: {reason}")]
pub struct SendFailure {
    pub command: CommandKind,
    pub reason: String,
}

impl SendFailure {
    pub fn new(command: CommandKind, err: &LinkError) -> Self {
        Self {
            command,
            reason: err.to_string(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Coordinator ──────────────────────────────────────────────────
    #[error("log transfer coordinator has stopped")]
    CoordinatorStopped,

    #[error("timed out after {}s waiting for the vehicle", .0.as_secs())]
    Timeout(Duration),

    // ── Link ─────────────────────────────────────────────────────────
    #[error(transparent)]
    Send(#[from] SendFailure),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("configuration error: {message}")]
    Config { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_names_the_command() {
        let failure = SendFailure::new(
            CommandKind::RequestEnd,
            &LinkError::QueueFull { capacity: 8 },
        );
        assert_eq!(
            failure.to_string(),
            "failed to send LOG_REQUEST_END: outbound queue full (8 frames pending)"
        );
    }
}
