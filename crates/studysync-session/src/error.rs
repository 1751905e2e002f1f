//! Error types for the session layer.
//!
//! The `Display` text of each variant is what a client sees in a
//! `join-error` or `error` message, so it stays short and never names
//! another participant.

use studysync_protocol::SessionCode;
use studysync_roster::RosterError;

/// Errors that can occur during session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session code was blank.
    #[error("Invalid session ID")]
    InvalidSessionId,

    /// No live session has this code.
    #[error("Session not found")]
    NotFound(SessionCode),

    /// The session is over: it can't be joined, started or ended again.
    #[error("Session has ended")]
    Ended,

    /// A roster rule was broken (blank participant name, unknown user).
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("Invalid session name")]
    InvalidSessionName,

    #[error("Invalid leader name")]
    InvalidLeaderName,

    #[error("Duration must be greater than zero")]
    InvalidDuration,

    /// The caller is not the session leader.
    #[error("Unauthorized")]
    Unauthorized,

    /// Pause was requested while the timer was not running.
    #[error("Timer is not active")]
    NotActive,

    /// The session actor's channel is full or closed.
    #[error("Session is unavailable")]
    Unavailable(SessionCode),

    /// Every attempt to draw a free session code collided.
    #[error("Could not allocate a session code")]
    CodeSpaceExhausted,
}

impl SessionError {
    /// Failures that best-effort paths (disconnect, status updates)
    /// swallow instead of reporting to the client.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Roster(e) if e.is_silent())
    }
}
