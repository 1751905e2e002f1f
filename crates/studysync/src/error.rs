//! Unified error type for the StudySync server.

use studysync_protocol::ProtocolError;
use studysync_session::SessionError;
use studysync_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StudySyncError {
    /// Socket-level failure (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session operation was rejected.
    #[error(transparent)]
    Session(#[from] SessionError),
}
