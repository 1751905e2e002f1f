//! One study session: the timer state machine plus its roster.
//!
//! `StudySession` is plain data. It never reads the clock or spawns
//! anything: every transition takes `now_ms` from the caller, so the same
//! code runs under a real clock in production and under a hand-driven one
//! in tests.
//!
//! ```text
//! waiting ──start──→ active ──pause──→ paused
//!    │                 ↑ └──────start─────┘│
//!    │                 │ tick (remaining > 0)
//!    └──────end──────→ ended ←────end──────┘
//!                      ↑
//!                      └── tick (remaining == 0)
//!
//! reset: any state → waiting
//! ```

use studysync_protocol::{
    LeaderboardEntry, SessionCode, SessionSnapshot, SessionStatus, TimerUpdate, UserId,
};
use studysync_roster::{Roster, normalize_name};
use studysync_tick::remaining_secs;

use crate::SessionError;

/// A leader-only timer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Pause,
    Reset,
    End,
}

/// A live study session.
#[derive(Debug, Clone)]
pub struct StudySession {
    code: SessionCode,
    name: String,
    /// Connection currently holding leader rights. Rebound when the
    /// leader rejoins under `leader_name`.
    leader_id: UserId,
    leader_name: String,
    /// Target length in seconds.
    duration: u64,
    /// Last computed remaining seconds, always within `0..=duration`.
    remaining_time: u64,
    status: SessionStatus,
    /// Set by the first start after creation or reset.
    start_time: Option<u64>,
    /// Set exactly while `status == Paused`.
    paused_at: Option<u64>,
    /// Milliseconds spent paused since the last fresh start.
    paused_duration: u64,
    roster: Roster,
    created_at: u64,
}

impl StudySession {
    /// Creates a waiting session with the leader as its first participant.
    ///
    /// # Errors
    /// - [`SessionError::InvalidSessionName`]: blank `name`
    /// - [`SessionError::InvalidDuration`]: `duration == 0`
    /// - [`SessionError::InvalidLeaderName`]: blank `leader_name`
    pub fn new(
        code: SessionCode,
        name: &str,
        duration: u64,
        leader_name: &str,
        leader_id: UserId,
        now_ms: u64,
    ) -> Result<Self, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidSessionName);
        }
        if duration == 0 {
            return Err(SessionError::InvalidDuration);
        }
        let leader_name =
            normalize_name(leader_name).map_err(|_| SessionError::InvalidLeaderName)?;

        let mut roster = Roster::new();
        roster.join(&leader_name, leader_id, now_ms)?;

        Ok(Self {
            code,
            name: name.to_owned(),
            leader_id,
            leader_name,
            duration,
            remaining_time: duration,
            status: SessionStatus::Waiting,
            start_time: None,
            paused_at: None,
            paused_duration: 0,
            roster,
            created_at: now_ms,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leader_id(&self) -> UserId {
        self.leader_id
    }

    pub fn leader_name(&self) -> &str {
        &self.leader_name
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn remaining_time(&self) -> u64 {
        self.remaining_time
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn paused_at(&self) -> Option<u64> {
        self.paused_at
    }

    pub fn paused_duration(&self) -> u64 {
        self.paused_duration
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn is_leader(&self, user_id: UserId) -> bool {
        self.leader_id == user_id
    }

    /// Hands leader rights to another connection.
    pub(crate) fn rebind_leader(&mut self, user_id: UserId) {
        self.leader_id = user_id;
    }

    // -----------------------------------------------------------------------
    // Timer state machine
    // -----------------------------------------------------------------------

    /// Runs a leader command. Returns `true` if state changed.
    ///
    /// Authorization is checked before anything else, so a rejected
    /// caller never observes or alters the state.
    ///
    /// # Errors
    /// - [`SessionError::Unauthorized`]: `caller` is not the leader
    /// - whatever the individual transition rejects
    pub fn apply(
        &mut self,
        caller: UserId,
        command: TimerCommand,
        now_ms: u64,
    ) -> Result<bool, SessionError> {
        if !self.is_leader(caller) {
            return Err(SessionError::Unauthorized);
        }
        match command {
            TimerCommand::Start => self.start(now_ms),
            TimerCommand::Pause => self.pause(now_ms),
            TimerCommand::Reset => {
                self.reset();
                Ok(true)
            }
            TimerCommand::End => self.end(),
        }
    }

    /// Starts fresh from waiting, or resumes from paused.
    ///
    /// Resuming adds the time spent paused to `paused_duration`. Starting
    /// an active timer is a no-op returning `Ok(false)`.
    ///
    /// # Errors
    /// Returns [`SessionError::Ended`] if the session is over.
    pub fn start(&mut self, now_ms: u64) -> Result<bool, SessionError> {
        match self.status {
            SessionStatus::Ended => return Err(SessionError::Ended),
            SessionStatus::Active => return Ok(false),
            SessionStatus::Paused => {
                let paused_at = self.paused_at.take().unwrap_or(now_ms);
                self.paused_duration += now_ms.saturating_sub(paused_at);
            }
            SessionStatus::Waiting => {
                self.start_time = Some(now_ms);
                self.paused_duration = 0;
            }
        }
        self.status = SessionStatus::Active;
        Ok(true)
    }

    /// Freezes the countdown at its last computed value.
    ///
    /// # Errors
    /// Returns [`SessionError::NotActive`] unless the timer is running.
    pub fn pause(&mut self, now_ms: u64) -> Result<bool, SessionError> {
        if !self.status.is_running() {
            return Err(SessionError::NotActive);
        }
        self.paused_at = Some(now_ms);
        self.status = SessionStatus::Paused;
        Ok(true)
    }

    /// Back to waiting with a full countdown. Valid from any state,
    /// including ended. Participants and their time are kept.
    pub fn reset(&mut self) {
        self.status = SessionStatus::Waiting;
        self.start_time = None;
        self.paused_at = None;
        self.paused_duration = 0;
        self.remaining_time = self.duration;
    }

    /// Ends the session: countdown to zero, every active participant
    /// becomes completed.
    ///
    /// # Errors
    /// Returns [`SessionError::Ended`] if the session is already over.
    pub fn end(&mut self) -> Result<bool, SessionError> {
        if self.status.is_ended() {
            return Err(SessionError::Ended);
        }
        self.finish();
        Ok(true)
    }

    /// One periodic recomputation. Returns `false` (and does nothing)
    /// unless the timer is running, so a stale tick can't do harm.
    ///
    /// Remaining time is re-derived from timestamps. Every active
    /// participant is credited one second, and the session ends once
    /// nothing remains.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if !self.status.is_running() {
            return false;
        }
        let start = self.start_time.unwrap_or(now_ms);
        self.remaining_time = remaining_secs(self.duration, now_ms, start, self.paused_duration);
        self.roster.credit_active(1);

        if self.remaining_time == 0 {
            self.finish();
        }
        true
    }

    fn finish(&mut self) {
        self.remaining_time = 0;
        self.paused_at = None;
        self.status = SessionStatus::Ended;
        let completed = self.roster.complete_active();
        tracing::info!(code = %self.code, completed, "session ended");
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn timer_update(&self) -> TimerUpdate {
        TimerUpdate {
            remaining_time: self.remaining_time,
            status: self.status,
        }
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.roster.leaderboard()
    }

    /// The full view for one connection, with its leader flag.
    pub fn snapshot_for(&self, viewer: UserId) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.code.clone(),
            session_name: self.name.clone(),
            duration: self.duration,
            remaining_time: self.remaining_time,
            status: self.status,
            is_leader: self.is_leader(viewer),
            participants: self.leaderboard(),
            roster: self.roster.views(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
