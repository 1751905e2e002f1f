//! Study session core for StudySync.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns its
//! timer state machine, its roster and its subscriber list. Commands and
//! countdown ticks for one session are serialized through that task;
//! different sessions run in parallel.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: creates sessions, looks them up by code
//! - [`SessionHandle`]: sends commands to a running session actor
//! - [`StudySession`]: the timer state machine and roster as plain data
//! - [`resolve`]: maps a join request onto the roster
//! - [`SessionConfig`]: code length, channel size, tick interval

mod actor;
mod config;
mod error;
mod registry;
mod resolver;
mod session;

pub use actor::{Mutation, SessionHandle, Subscriber};
pub use config::SessionConfig;
pub use error::SessionError;
pub use registry::{Created, SessionRegistry, disconnect_everywhere};
pub use resolver::{Resolution, resolve};
pub use session::{StudySession, TimerCommand};
