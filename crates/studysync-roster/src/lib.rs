//! Participant roster for StudySync.
//!
//! This crate owns everything about *who* is in a session:
//!
//! 1. **Identity**: a participant is keyed by a trimmed, case-insensitive
//!    display name ([`Participant`], [`normalize_name`])
//! 2. **Roster**: the ordered record set and its join/leave/credit
//!    mutators ([`Roster`], [`JoinKind`])
//! 3. **Leaderboard**: the ranked, active-only view ([`leaderboard::derive`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← owns one Roster per study session
//!     ↕
//! Roster Layer (this crate)  ← participant identity and time accounting
//!     ↕
//! Protocol Layer (below)  ← provides UserId, ParticipantStatus, LeaderboardEntry
//! ```

mod error;
pub mod leaderboard;
mod participant;
mod roster;

pub use error::RosterError;
pub use participant::{Participant, names_match, normalize_name};
pub use roster::{JoinKind, Roster};
