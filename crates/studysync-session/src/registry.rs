//! Session registry: creates sessions and finds them by code.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use studysync_protocol::{SessionCode, SessionSnapshot, UserId};
use studysync_tick::{Clock, SystemClock};

use crate::actor::spawn_session;
use crate::{SessionConfig, SessionError, SessionHandle, StudySession, Subscriber};

/// Characters a generated session code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Result of [`SessionRegistry::create`].
#[derive(Debug)]
pub struct Created {
    pub code: SessionCode,
    /// The session as its leader sees it.
    pub snapshot: SessionSnapshot,
    pub handle: SessionHandle,
}

/// Owns every live session, keyed by its upper-case code.
///
/// The registry itself is not thread-safe: the server wraps it in a
/// mutex and only holds the lock long enough to look up or insert a
/// handle. All session work happens in the actors.
pub struct SessionRegistry {
    sessions: HashMap<SessionCode, SessionHandle>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Creates an empty registry on the system clock.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty registry on the given clock.
    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            config: config.validated(),
            clock,
        }
    }

    /// Creates a waiting session led by `leader` and spawns its actor.
    ///
    /// `subscriber` is the leader's outbound channel. It receives
    /// `session-created` first.
    ///
    /// # Errors
    /// - validation failures from [`StudySession::new`]
    /// - [`SessionError::CodeSpaceExhausted`] if no free code was found
    pub fn create(
        &mut self,
        session_name: &str,
        duration: u64,
        leader_name: &str,
        leader: UserId,
        subscriber: Subscriber,
    ) -> Result<Created, SessionError> {
        let code = self.allocate_code()?;
        let session = StudySession::new(
            code.clone(),
            session_name,
            duration,
            leader_name,
            leader,
            self.clock.now_ms(),
        )?;
        let snapshot = session.snapshot_for(leader);

        let handle = spawn_session(session, subscriber, &self.config, Arc::clone(&self.clock));
        self.sessions.insert(code.clone(), handle.clone());

        tracing::info!(%code, %leader, duration, "session created");
        Ok(Created {
            code,
            snapshot,
            handle,
        })
    }

    /// Looks a session up by code, ignoring case and padding.
    ///
    /// # Errors
    /// - [`SessionError::InvalidSessionId`]: blank code
    /// - [`SessionError::NotFound`]: no such session
    pub fn get(&self, raw_code: &str) -> Result<SessionHandle, SessionError> {
        let code = SessionCode::normalize(raw_code).ok_or(SessionError::InvalidSessionId)?;
        self.sessions
            .get(&code)
            .cloned()
            .ok_or(SessionError::NotFound(code))
    }

    /// Clones of every session handle, for work that must not hold the
    /// registry lock.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Draws random codes until one is free.
    fn allocate_code(&self) -> Result<SessionCode, SessionError> {
        for attempt in 1..=self.config.max_code_attempts {
            let Some(code) = SessionCode::normalize(&generate_code(self.config.code_length)) else {
                continue;
            };
            if !self.sessions.contains_key(&code) {
                return Ok(code);
            }
            tracing::debug!(%code, attempt, "session code collision, retrying");
        }
        tracing::warn!(
            attempts = self.config.max_code_attempts,
            sessions = self.sessions.len(),
            "could not allocate a session code"
        );
        Err(SessionError::CodeSpaceExhausted)
    }
}

/// Marks `user_id` as left in every session it belongs to. Returns how
/// many sessions had an active participant bound to it.
///
/// Sessions that are gone or don't know the user are skipped.
pub async fn disconnect_everywhere(handles: &[SessionHandle], user_id: UserId) -> usize {
    let mut left = 0;
    for handle in handles {
        match handle.disconnect(user_id).await {
            Ok(true) => left += 1,
            Ok(false) => {}
            Err(e) => tracing::debug!(code = %handle.code(), error = %e, "disconnect skipped"),
        }
    }
    left
}

fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
