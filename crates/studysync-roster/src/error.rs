//! Error types for the roster layer.

use studysync_protocol::UserId;

/// Errors that can occur while changing a session's roster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// The display name was empty after trimming.
    #[error("Invalid participant name")]
    InvalidName,

    /// No participant is currently bound to this connection.
    #[error("no participant for {0}")]
    NotFound(UserId),

    /// The participant exists but is not active.
    #[error("participant {0} is not active")]
    NotActive(UserId),

    /// The connection already speaks for a different name in this session.
    #[error("Already joined under another name")]
    AlreadyBound(UserId),
}

impl RosterError {
    /// Lookup failures that disconnect and status paths swallow.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotActive(_))
    }
}
