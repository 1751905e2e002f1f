//! Maps a `(name, connection)` join request onto a session's roster.
//!
//! The name is the durable identity, the connection id is ephemeral.
//! A client that drops and comes back gets a new [`UserId`], and the
//! resolver rebinds its old record (time, rank, join time) to that id.
//!
//! Checks run in this order:
//!
//! 1. the session must not have ended
//! 2. the name must not be blank after trimming
//! 3. the roster decides between new, reconnect and duplicate, and
//!    refuses a second name from an already bound connection
//! 4. a name matching the leader's rebinds leader rights to the caller

use studysync_protocol::UserId;
use studysync_roster::{JoinKind, Participant, names_match, normalize_name};

use crate::{SessionError, StudySession};

/// Outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub kind: JoinKind,
    /// The participant record as it stands after the join.
    pub participant: Participant,
    /// Whether the caller now holds leader rights.
    pub is_leader: bool,
}

/// Resolves a join request.
///
/// # Errors
/// - [`SessionError::Ended`]: the session is over
/// - [`SessionError::Roster`] with `InvalidName`: blank name
/// - [`SessionError::Roster`] with `AlreadyBound`: the caller already
///   joined under another name
pub fn resolve(
    session: &mut StudySession,
    raw_name: &str,
    user_id: UserId,
    now_ms: u64,
) -> Result<Resolution, SessionError> {
    if session.status().is_ended() {
        return Err(SessionError::Ended);
    }
    let name = normalize_name(raw_name)?;

    let (kind, participant) = session.roster_mut().join(&name, user_id, now_ms)?;
    let participant = participant.clone();

    if names_match(session.leader_name(), &name) && !session.is_leader(user_id) {
        tracing::info!(
            code = %session.code(),
            previous = %session.leader_id(),
            %user_id,
            "leader reconnected"
        );
        session.rebind_leader(user_id);
    }

    Ok(Resolution {
        kind,
        participant,
        is_leader: session.is_leader(user_id),
    })
}
