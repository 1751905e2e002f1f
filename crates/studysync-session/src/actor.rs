//! Session actor: an isolated Tokio task that owns one study session.
//!
//! Each session runs in its own task and talks to the outside world
//! through an mpsc channel. Commands and ticks are handled one at a time
//! inside a single `select!` loop, so nothing else ever writes to the
//! session and a tick can never interleave with a pause.
//!
//! ```text
//!  connection tasks ──SessionCommand──→ ┌──────────────┐
//!                                       │ SessionActor │──ServerMessage──→ subscribers
//!  TickScheduler ─────────tick────────→ └──────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use studysync_protocol::{
    LeaderboardEntry, ParticipantStatus, ServerMessage, SessionCode, SessionSnapshot,
    TimerUpdate, UserId,
};
use studysync_roster::JoinKind;
use studysync_tick::{Clock, TickScheduler};
use tokio::sync::{mpsc, oneshot};

use crate::{SessionConfig, SessionError, StudySession, TimerCommand, resolve};

/// Channel sender for delivering outbound messages to one connection.
pub type Subscriber = mpsc::UnboundedSender<ServerMessage>;

/// A change applied to the session inside its actor.
pub type Mutation = Box<dyn FnOnce(&mut StudySession) + Send>;

/// Commands sent to a session actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel: the caller
/// sends a command and waits for the result on it.
enum SessionCommand {
    Join {
        user_id: UserId,
        name: String,
        subscriber: Subscriber,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },

    Control {
        caller: UserId,
        command: TimerCommand,
        reply: oneshot::Sender<Result<TimerUpdate, SessionError>>,
    },

    UpdateStatus {
        user_id: UserId,
        status: ParticipantStatus,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Marks the user's participant as left and drops its subscription.
    Disconnect {
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },

    Snapshot {
        viewer: UserId,
        reply: oneshot::Sender<SessionSnapshot>,
    },

    Leaderboard {
        reply: oneshot::Sender<Vec<LeaderboardEntry>>,
    },

    Mutate {
        mutation: Mutation,
        reply: oneshot::Sender<()>,
    },

    Shutdown,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session actor.
///
/// Cheap to clone: it's an `mpsc::Sender` plus the session code. The
/// registry keeps one per session and hands out clones.
#[derive(Clone)]
pub struct SessionHandle {
    code: SessionCode,
    sender: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Joins (or rejoins) the session under `name`.
    ///
    /// On success the actor has already queued `session-joined` and a
    /// `timer-update` on `subscriber`, in that order. The returned
    /// snapshot is the same view.
    pub async fn join(
        &self,
        user_id: UserId,
        name: impl Into<String>,
        subscriber: Subscriber,
    ) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Join {
            user_id,
            name: name.into(),
            subscriber,
            reply,
        })
        .await?
    }

    /// Runs a leader timer command and returns the resulting timer view.
    pub async fn control(
        &self,
        caller: UserId,
        command: TimerCommand,
    ) -> Result<TimerUpdate, SessionError> {
        self.request(|reply| SessionCommand::Control {
            caller,
            command,
            reply,
        })
        .await?
    }

    /// Overrides the caller's own participant status.
    pub async fn update_status(
        &self,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::UpdateStatus {
            user_id,
            status,
            reply,
        })
        .await?
    }

    /// Marks the user as left. Returns `true` if an active participant
    /// was bound to `user_id`.
    pub async fn disconnect(&self, user_id: UserId) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Disconnect { user_id, reply })
            .await
    }

    /// The session as `viewer` would see it.
    pub async fn snapshot(&self, viewer: UserId) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { viewer, reply })
            .await
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, SessionError> {
        self.request(|reply| SessionCommand::Leaderboard { reply }).await
    }

    /// Applies `f` to the session inside the actor, then pushes the new
    /// timer and leaderboard views to every subscriber.
    ///
    /// Nothing else runs between the read and the write, so `f` can
    /// never lose an update to a concurrent tick or command.
    pub async fn mutate<F>(&self, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut StudySession) + Send + 'static,
    {
        self.request(|reply| SessionCommand::Mutate {
            mutation: Box::new(f),
            reply,
        })
        .await
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable(self.code.clone()))
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// SessionActor
// ---------------------------------------------------------------------------

/// The internal actor state. Runs inside a Tokio task.
struct SessionActor {
    session: StudySession,
    /// Per-connection outbound channels.
    subscribers: HashMap<UserId, Subscriber>,
    scheduler: TickScheduler,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(code = %self.session.code(), "session actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle(cmd) {
                            break;
                        }
                    }
                    None => break,
                },
                tick = self.scheduler.wait_for_tick() => {
                    tracing::trace!(code = %self.session.code(), tick = tick.tick, "tick");
                    self.handle_tick();
                }
            }
            self.sync_scheduler();
        }

        tracing::info!(code = %self.session.code(), "session actor stopped");
    }

    /// Handles one command. Returns `false` once the actor should stop.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::Join {
                user_id,
                name,
                subscriber,
                reply,
            } => {
                let result = self.handle_join(user_id, &name, subscriber);
                let _ = reply.send(result);
            }
            SessionCommand::Control {
                caller,
                command,
                reply,
            } => {
                let result = self.handle_control(caller, command);
                let _ = reply.send(result);
            }
            SessionCommand::UpdateStatus {
                user_id,
                status,
                reply,
            } => {
                let result = self.handle_update_status(user_id, status);
                let _ = reply.send(result);
            }
            SessionCommand::Disconnect { user_id, reply } => {
                let _ = reply.send(self.handle_disconnect(user_id));
            }
            SessionCommand::Snapshot { viewer, reply } => {
                let _ = reply.send(self.session.snapshot_for(viewer));
            }
            SessionCommand::Leaderboard { reply } => {
                let _ = reply.send(self.session.leaderboard());
            }
            SessionCommand::Mutate { mutation, reply } => {
                mutation(&mut self.session);
                self.broadcast_timer();
                self.broadcast_leaderboard();
                let _ = reply.send(());
            }
            SessionCommand::Shutdown => return false,
        }
        true
    }

    fn handle_join(
        &mut self,
        user_id: UserId,
        name: &str,
        subscriber: Subscriber,
    ) -> Result<SessionSnapshot, SessionError> {
        let now = self.clock.now_ms();
        let resolution = resolve(&mut self.session, name, user_id, now)?;

        tracing::info!(
            code = %self.session.code(),
            %user_id,
            name = %resolution.participant.name,
            kind = ?resolution.kind,
            "participant joined"
        );

        let snapshot = self.session.snapshot_for(user_id);
        let _ = subscriber.send(ServerMessage::SessionJoined {
            session_id: self.session.code().clone(),
            user_id,
            session: snapshot.clone(),
        });
        let _ = subscriber.send(ServerMessage::TimerUpdate(self.session.timer_update()));
        self.subscribers.insert(user_id, subscriber);

        if resolution.kind != JoinKind::Duplicate {
            self.broadcast_leaderboard();
        }
        Ok(snapshot)
    }

    fn handle_control(
        &mut self,
        caller: UserId,
        command: TimerCommand,
    ) -> Result<TimerUpdate, SessionError> {
        let now = self.clock.now_ms();
        let changed = self.session.apply(caller, command, now)?;

        // A (re)start recomputes and credits right away instead of
        // waiting a full interval for the first tick.
        if changed && command == TimerCommand::Start {
            self.session.tick(now);
        }

        if changed {
            tracing::info!(
                code = %self.session.code(),
                ?command,
                status = %self.session.status(),
                remaining = self.session.remaining_time(),
                "timer transition"
            );
            self.broadcast_timer();
            if command != TimerCommand::Pause {
                self.broadcast_leaderboard();
            }
        }
        Ok(self.session.timer_update())
    }

    fn handle_update_status(
        &mut self,
        user_id: UserId,
        status: ParticipantStatus,
    ) -> Result<(), SessionError> {
        self.session.roster_mut().set_status(user_id, status)?;
        self.broadcast_leaderboard();
        Ok(())
    }

    fn handle_disconnect(&mut self, user_id: UserId) -> bool {
        self.subscribers.remove(&user_id);
        match self.session.roster_mut().mark_left(user_id) {
            Ok(_) => {
                self.broadcast_leaderboard();
                true
            }
            Err(_) => false,
        }
    }

    fn handle_tick(&mut self) {
        let now = self.clock.now_ms();
        if self.session.tick(now) {
            self.broadcast_timer();
            self.broadcast_leaderboard();
        }
    }

    /// Keeps the scheduler running exactly while the timer is active.
    fn sync_scheduler(&mut self) {
        if self.session.status().is_running() {
            self.scheduler.start();
        } else {
            self.scheduler.stop();
        }
    }

    fn broadcast_timer(&mut self) {
        self.broadcast(ServerMessage::TimerUpdate(self.session.timer_update()));
    }

    fn broadcast_leaderboard(&mut self) {
        self.broadcast(ServerMessage::LeaderboardUpdate(self.session.leaderboard()));
    }

    /// Sends to every subscriber, forgetting those whose connection is gone.
    fn broadcast(&mut self, msg: ServerMessage) {
        self.subscribers
            .retain(|_, subscriber| subscriber.send(msg.clone()).is_ok());
    }
}

/// Spawns a session actor and returns a handle to it.
///
/// The leader is subscribed first and receives `session-created` before
/// anything else the session sends.
pub(crate) fn spawn_session(
    session: StudySession,
    leader: Subscriber,
    config: &SessionConfig,
    clock: Arc<dyn Clock>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);
    let code = session.code().clone();
    let leader_id = session.leader_id();

    let _ = leader.send(ServerMessage::SessionCreated {
        session_id: code.clone(),
        user_id: leader_id,
        session: session.snapshot_for(leader_id),
    });

    let mut subscribers = HashMap::new();
    subscribers.insert(leader_id, leader);

    let actor = SessionActor {
        session,
        subscribers,
        scheduler: TickScheduler::new(config.tick_interval),
        clock,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle { code, sender: tx }
}
