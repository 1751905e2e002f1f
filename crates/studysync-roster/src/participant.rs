//! The participant record and the name rules that identify it.
//!
//! A participant is known by two things:
//! - its **name**, trimmed and compared case-insensitively, which is the
//!   durable identity that survives reconnects
//! - its **user id**, the id of whichever connection currently speaks for
//!   that name
//!
//! ```text
//!   join("Alice", U-1) ──→ { name: "Alice", user_id: U-1, active }
//!   U-1 disconnects    ──→ { name: "Alice", user_id: U-1, left }
//!   join("alice", U-7) ──→ { name: "Alice", user_id: U-7, active }   // same record
//! ```

use studysync_protocol::{ParticipantStatus, ParticipantView, UserId};

use crate::RosterError;

/// One named member of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Connection currently bound to this name. Rebound on reconnect.
    pub user_id: UserId,

    /// Trimmed display name as first given.
    pub name: String,

    /// Milliseconds since the Unix epoch of the first join. Never changes.
    pub joined_at: u64,

    pub status: ParticipantStatus,

    /// Seconds credited while active during a running timer.
    pub time_spent: u64,
}

impl Participant {
    /// Creates a fresh, active participant with no credited time.
    pub fn new(user_id: UserId, name: String, joined_at: u64) -> Self {
        Self {
            user_id,
            name,
            joined_at,
            status: ParticipantStatus::Active,
            time_spent: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }

    /// Whether `other` names the same person as this record.
    pub fn answers_to(&self, other: &str) -> bool {
        names_match(&self.name, other)
    }

    /// Wire view of this record.
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            name: self.name.clone(),
            user_id: self.user_id,
            joined_at: self.joined_at,
            status: self.status,
            time_spent: self.time_spent,
        }
    }
}

/// Trims a display name.
///
/// # Errors
/// Returns [`RosterError::InvalidName`] if nothing is left.
pub fn normalize_name(raw: &str) -> Result<String, RosterError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RosterError::InvalidName);
    }
    Ok(name.to_owned())
}

/// Case-insensitive, whitespace-insensitive name comparison.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_trims() {
        assert_eq!(normalize_name("  Alice ").unwrap(), "Alice");
    }

    #[test]
    fn test_normalize_name_blank_is_invalid() {
        assert_eq!(normalize_name(""), Err(RosterError::InvalidName));
        assert_eq!(normalize_name(" \t\n"), Err(RosterError::InvalidName));
    }

    #[test]
    fn test_names_match_ignores_case_and_padding() {
        assert!(names_match("Alice", " alice "));
        assert!(names_match("ÉMILE", "émile"));
        assert!(!names_match("Alice", "Alicia"));
    }

    #[test]
    fn test_new_participant_is_active_with_no_time() {
        let p = Participant::new(UserId(1), "Bob".into(), 500);
        assert!(p.is_active());
        assert_eq!(p.time_spent, 0);
        assert_eq!(p.joined_at, 500);
        assert!(p.answers_to("BOB"));
    }
}
