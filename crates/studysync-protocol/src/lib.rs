//! Wire protocol for StudySync.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`], and the
//!   identity and view types they carry)
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) for turning those messages
//!   into frames and back
//! - **Errors** ([`ProtocolError`])
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session
//! core. It has no idea what a timer or a roster is; it only knows the
//! shapes that go over the wire.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientMessage>) → Session core
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Envelope, EventTag, LeaderboardEntry, ParticipantStatus, ParticipantView,
    ServerMessage, SessionCode, SessionSnapshot, SessionStatus, TimerUpdate, UserId,
};
