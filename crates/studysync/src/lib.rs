//! # StudySync
//!
//! Live study-session timer and leaderboard sync server.
//!
//! A leader opens a session and gets a short shareable code. Participants
//! join with that code and a display name. The leader starts, pauses,
//! resets or ends a shared countdown, and the server pushes the remaining
//! time and a ranked leaderboard of study time to everyone once a second.
//!
//! This crate ties the layers together:
//!
//! - [`studysync_transport`]: WebSocket listener and connections
//! - [`studysync_protocol`]: wire messages and the JSON codec
//! - [`studysync_tick`]: clocks and the countdown tick scheduler
//! - [`studysync_roster`]: participants and leaderboard ranking
//! - [`studysync_session`]: timer state machine, session actors, registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use studysync::prelude::*;
//!
//! # async fn run() -> Result<(), StudySyncError> {
//! studysync::init_tracing();
//! let server = StudySyncServer::builder()
//!     .config(ServerConfig::from_env())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::StudySyncError;
pub use server::{StudySyncServer, StudySyncServerBuilder};

pub use studysync_protocol as protocol;
pub use studysync_roster as roster;
pub use studysync_session as session;
pub use studysync_tick as tick;
pub use studysync_transport as transport;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a `tracing` subscriber that writes to stdout.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Everything needed to run a server or drive one from tests.
pub mod prelude {
    pub use crate::{ServerConfig, StudySyncError, StudySyncServer, StudySyncServerBuilder};
    pub use studysync_protocol::{
        ClientMessage, Envelope, LeaderboardEntry, ParticipantStatus, ServerMessage,
        SessionCode, SessionSnapshot, SessionStatus, TimerUpdate, UserId,
    };
    pub use studysync_session::{SessionConfig, SessionError};
    pub use studysync_tick::{Clock, ManualClock, SystemClock};
}
