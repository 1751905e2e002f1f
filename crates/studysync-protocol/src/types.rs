//! Everything that travels on the wire between a study client and the server.
//!
//! Messages are adjacently tagged so the JSON keeps the event-name shape
//! browser clients already speak:
//!
//! ```text
//! { "seq": 4, "timestamp": 1700000000000,
//!   "message": { "event": "timer-update", "data": { "remainingTime": 90, "status": "active" } } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use studysync_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of one live client connection.
///
/// This is the *ephemeral* half of a participant's identity: a client that
/// reconnects gets a new `UserId`, while its display name stays the same.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

impl From<ConnectionId> for UserId {
    fn from(id: ConnectionId) -> Self {
        Self(id.into_inner())
    }
}

/// Short shareable session code, always stored upper-case.
///
/// Construct through [`SessionCode::normalize`] so that `"abc123"`,
/// `" ABC123 "` and `"Abc123"` all name the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Trims and upper-cases user input. Returns `None` for blank input.
    pub fn normalize(raw: &str) -> Option<Self> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() { None } else { Some(Self(code)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Where a session's countdown currently is.
///
/// ```text
/// waiting ──start──→ active ──pause──→ paused
///    │                 ↑ └──────start─────┘│
///    │                 │                   │
///    └──────end──────→ ended ←────end──────┘
///
/// reset: any state → waiting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Active,
    Paused,
    Ended,
}

impl SessionStatus {
    /// `true` while the countdown is running and ticks apply.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Active)
    }

    /// `true` once the session is over and no longer accepts joins.
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
        })
    }
}

/// A participant's presence in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    /// Connected and earning study time while the timer runs.
    #[default]
    Active,
    /// Disconnected; history is kept for a later reconnect.
    Left,
    /// Was active when the session ended.
    Completed,
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Left => "left",
            Self::Completed => "completed",
        })
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One ranked row of a session leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub user_id: UserId,
    /// Milliseconds since the Unix epoch of the participant's first join.
    pub joined_at: u64,
    pub status: ParticipantStatus,
    /// Accumulated study seconds.
    pub time_spent: u64,
    /// 1-based position.
    pub rank: usize,
}

/// One roster record, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub name: String,
    pub user_id: UserId,
    pub joined_at: u64,
    pub status: ParticipantStatus,
    pub time_spent: u64,
}

/// The countdown view pushed on every tick and control transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    pub remaining_time: u64,
    pub status: SessionStatus,
}

/// Full session view handed to a client when it creates or joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionCode,
    pub session_name: String,
    /// Target length in seconds.
    pub duration: u64,
    pub remaining_time: u64,
    pub status: SessionStatus,
    /// Whether the receiving connection is the session leader.
    pub is_leader: bool,
    /// Current leaderboard.
    pub participants: Vec<LeaderboardEntry>,
    /// Every participant in join order, including those who left or
    /// completed.
    pub roster: Vec<ParticipantView>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → server requests.
///
/// String fields default to empty so that a missing field is reported
/// back to the client as a validation failure instead of an unreadable
/// frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Open a new session; the sender becomes its leader.
    CreateSession {
        #[serde(default)]
        session_name: String,
        /// Target length in seconds. Signed so that a negative value is
        /// rejected as a bad duration, not as an unreadable frame.
        #[serde(default)]
        duration: i64,
        #[serde(default)]
        leader_name: String,
    },

    /// Join (or rejoin) a session under a display name.
    JoinSession {
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        participant_name: String,
    },

    StartTimer {
        #[serde(default)]
        session_id: String,
    },

    PauseTimer {
        #[serde(default)]
        session_id: String,
    },

    ResetTimer {
        #[serde(default)]
        session_id: String,
    },

    EndSession {
        #[serde(default)]
        session_id: String,
    },

    /// Override the sender's own participant status.
    UpdateStatus {
        #[serde(default)]
        session_id: String,
        status: ParticipantStatus,
    },

    /// Keep-alive; answered with [`ServerMessage::HeartbeatAck`].
    Heartbeat { client_time: u64 },

    /// Graceful disconnect.
    Leave,
}

impl ClientMessage {
    /// Every inbound event name.
    pub const EVENTS: &'static [&'static str] = &[
        "create-session",
        "join-session",
        "start-timer",
        "pause-timer",
        "reset-timer",
        "end-session",
        "update-status",
        "heartbeat",
        "leave",
    ];

    pub fn is_known_event(event: &str) -> bool {
        Self::EVENTS.contains(&event)
    }
}

/// Just the event name of an inbound message.
///
/// Used to tell a known request with a malformed payload apart from
/// noise when a frame doesn't decode as a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventTag {
    pub event: String,
}

/// Server → client notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Reply to `create-session`.
    SessionCreated {
        session_id: SessionCode,
        user_id: UserId,
        session: SessionSnapshot,
    },

    /// Reply to `join-session`.
    SessionJoined {
        session_id: SessionCode,
        user_id: UserId,
        session: SessionSnapshot,
    },

    /// Broadcast on every tick and timer transition.
    TimerUpdate(TimerUpdate),

    /// Broadcast whenever the ranked board changes.
    LeaderboardUpdate(Vec<LeaderboardEntry>),

    /// A `join-session` request was rejected.
    JoinError { message: String },

    /// Any other request was rejected.
    Error { message: String },

    HeartbeatAck {
        client_time: u64,
        server_time: u64,
        /// Number of live sessions on this server.
        sessions: usize,
    },
}

impl ServerMessage {
    pub fn join_error(message: impl fmt::Display) -> Self {
        Self::JoinError {
            message: message.to_string(),
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Outer frame around every message.
///
/// Outbound, `seq` counts up per connection and `timestamp` is server
/// wall-clock milliseconds. Inbound, both are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<M> {
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub timestamp: u64,
    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(seq: u64, timestamp: u64, message: M) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
