//! Per-session participant roster.
//!
//! # Concurrency note
//!
//! `Roster` is plain data with `&mut self` mutators. It lives inside a
//! session, which is owned by exactly one actor task, so every mutation
//! is already serialized.

use studysync_protocol::{LeaderboardEntry, ParticipantStatus, ParticipantView, UserId};
use tracing::debug;

use crate::{Participant, RosterError, leaderboard, normalize_name};

/// How a join request was resolved against the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// First time this name joined the session.
    New,
    /// Known name on a new connection. History is kept, the user id is
    /// rebound.
    Reconnect,
    /// Same name from the same connection. Nothing changed.
    Duplicate,
}

/// Ordered participants of one session.
///
/// Records are never removed: leaving only flips the status, so time and
/// join order survive a reconnect.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or rebinds a participant by name.
    ///
    /// - unknown name: a new active record with `joined_at = now_ms`
    /// - known name, same connection: [`JoinKind::Duplicate`], untouched
    /// - known name, other connection: [`JoinKind::Reconnect`], the
    ///   record is rebound to `user_id` and made active again
    ///
    /// A connection speaks for at most one name.
    ///
    /// # Errors
    /// - [`RosterError::InvalidName`]: `raw_name` is blank
    /// - [`RosterError::AlreadyBound`]: `user_id` is bound to another name
    pub fn join(
        &mut self,
        raw_name: &str,
        user_id: UserId,
        now_ms: u64,
    ) -> Result<(JoinKind, &Participant), RosterError> {
        let name = normalize_name(raw_name)?;

        if let Some(bound) = self
            .participants
            .iter()
            .find(|p| p.user_id == user_id && !p.answers_to(&name))
        {
            debug!(%user_id, bound = %bound.name, requested = %name, "second name refused");
            return Err(RosterError::AlreadyBound(user_id));
        }

        let Some(idx) = self.participants.iter().position(|p| p.answers_to(&name)) else {
            debug!(%user_id, %name, "participant joined");
            self.participants.push(Participant::new(user_id, name, now_ms));
            let last = self.participants.len() - 1;
            return Ok((JoinKind::New, &self.participants[last]));
        };

        if self.participants[idx].user_id == user_id {
            return Ok((JoinKind::Duplicate, &self.participants[idx]));
        }

        let existing = &mut self.participants[idx];
        debug!(
            previous = %existing.user_id,
            %user_id,
            name = %existing.name,
            "participant reconnected"
        );
        existing.user_id = user_id;
        existing.status = ParticipantStatus::Active;
        Ok((JoinKind::Reconnect, &self.participants[idx]))
    }

    /// Marks the active participant bound to `user_id` as left.
    ///
    /// # Errors
    /// - [`RosterError::NotFound`]: no record is bound to `user_id`
    /// - [`RosterError::NotActive`]: the record already left or completed
    pub fn mark_left(&mut self, user_id: UserId) -> Result<&Participant, RosterError> {
        let p = self.find_mut(user_id)?;
        if !p.is_active() {
            return Err(RosterError::NotActive(user_id));
        }
        p.status = ParticipantStatus::Left;
        debug!(%user_id, name = %p.name, "participant left");
        Ok(&*p)
    }

    /// Overrides the status of the participant bound to `user_id`.
    ///
    /// # Errors
    /// Returns [`RosterError::NotFound`] if no record is bound to `user_id`.
    pub fn set_status(
        &mut self,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<&Participant, RosterError> {
        let p = self.find_mut(user_id)?;
        p.status = status;
        Ok(&*p)
    }

    /// Adds study seconds to one active participant. Returns the new total.
    ///
    /// # Errors
    /// - [`RosterError::NotFound`]: no record is bound to `user_id`
    /// - [`RosterError::NotActive`]: the record is not active
    pub fn credit_time(&mut self, user_id: UserId, secs: u64) -> Result<u64, RosterError> {
        let p = self.find_mut(user_id)?;
        if !p.is_active() {
            return Err(RosterError::NotActive(user_id));
        }
        p.time_spent += secs;
        Ok(p.time_spent)
    }

    /// Adds study seconds to every active participant. Returns how many
    /// were credited.
    pub fn credit_active(&mut self, secs: u64) -> usize {
        let mut credited = 0;
        for p in self.participants.iter_mut().filter(|p| p.is_active()) {
            p.time_spent += secs;
            credited += 1;
        }
        credited
    }

    /// Moves every active participant to completed. Left participants are
    /// untouched. Returns how many changed.
    pub fn complete_active(&mut self) -> usize {
        let mut completed = 0;
        for p in self.participants.iter_mut().filter(|p| p.is_active()) {
            p.status = ParticipantStatus::Completed;
            completed += 1;
        }
        completed
    }

    pub fn find_by_user(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.answers_to(name))
    }

    /// Wire views of every record, in join order.
    pub fn views(&self) -> Vec<ParticipantView> {
        self.participants.iter().map(Participant::view).collect()
    }

    /// Participants in join order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// The ranked, active-only view.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard::derive(&self.participants)
    }

    fn find_mut(&mut self, user_id: UserId) -> Result<&mut Participant, RosterError> {
        self.participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(RosterError::NotFound(user_id))
    }
}
