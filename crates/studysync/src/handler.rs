//! Per-connection handler: request routing and outbound delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Derive the connection's `UserId` from its transport id
//!   2. Loop: select over inbound frames, queued outbound messages and
//!      the idle deadline
//!   3. On exit, mark the user as left in every session it touched
//!
//! Session actors never write to the socket. They push onto the
//! connection's outbound channel and this task is the only writer, so
//! frames leave in the order the actors produced them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use studysync_protocol::{
    ClientMessage, Codec, Envelope, EventTag, ProtocolError, ServerMessage, SessionCode, UserId,
};
use studysync_session::{SessionError, SessionHandle, TimerCommand, disconnect_everywhere};
use studysync_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::StudySyncError;
use crate::server::ServerState;

/// Drop guard that marks the user as left when the handler exits.
///
/// This runs even if the handler panics. Since `Drop` is synchronous,
/// the disconnect is spawned as a fire-and-forget task.
struct DisconnectGuard {
    user_id: UserId,
    sessions: HashMap<SessionCode, SessionHandle>,
}

impl DisconnectGuard {
    fn track(&mut self, handle: SessionHandle) {
        self.sessions.insert(handle.code().clone(), handle);
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let user_id = self.user_id;
        let handles: Vec<SessionHandle> = self.sessions.drain().map(|(_, h)| h).collect();
        tokio::spawn(async move {
            let left = disconnect_everywhere(&handles, user_id).await;
            tracing::debug!(%user_id, left, "disconnect processed");
        });
    }
}

/// Why the message loop stopped.
#[derive(Debug, Clone, Copy)]
enum CloseReason {
    Closed,
    Left,
    Idle,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), StudySyncError> {
    let user_id = UserId::from(conn.id());
    tracing::info!(%user_id, peer = %conn.peer_addr(), "connection accepted");

    let mut guard = DisconnectGuard {
        user_id,
        sessions: HashMap::new(),
    };
    let (outbound, mut queued) = mpsc::unbounded_channel::<ServerMessage>();
    let mut seq: u64 = 1;

    let idle_timeout = state.config.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout.unwrap_or(Duration::MAX));
    tokio::pin!(idle);

    let reason = loop {
        tokio::select! {
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => break CloseReason::Closed,
                    Err(e) => {
                        tracing::debug!(%user_id, error = %e, "recv error");
                        break CloseReason::Closed;
                    }
                };
                if let Some(timeout) = idle_timeout {
                    idle.as_mut().reset(Instant::now() + timeout);
                }

                let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
                    Ok(env) => env,
                    Err(e) => {
                        tracing::debug!(%user_id, error = %e, "failed to decode envelope");
                        if let Some(reply) = malformed_reply(&state.codec, &data) {
                            let _ = outbound.send(reply);
                        }
                        continue;
                    }
                };

                let request = Request {
                    state: &state,
                    user_id,
                    outbound: &outbound,
                };
                if request.dispatch(envelope.message, &mut guard).await {
                    break CloseReason::Left;
                }
            }
            Some(message) = queued.recv() => {
                let envelope = Envelope::new(next_seq(&mut seq), state.clock.now_ms(), message);
                let bytes = state.codec.encode(&envelope)?;
                conn.send(&bytes).await?;
            }
            _ = &mut idle, if idle_timeout.is_some() => break CloseReason::Idle,
        }
    };

    tracing::info!(%user_id, ?reason, "connection closed");
    if !matches!(reason, CloseReason::Closed) {
        if let Err(e) = conn.close().await {
            tracing::debug!(%user_id, error = %e, "close failed");
        }
    }

    // guard drops here → disconnect fires.
    Ok(())
}

/// One inbound request, with everything needed to answer it.
struct Request<'a, C: Codec> {
    state: &'a ServerState<C>,
    user_id: UserId,
    outbound: &'a mpsc::UnboundedSender<ServerMessage>,
}

impl<C: Codec> Request<'_, C> {
    /// Routes a client message. Returns `true` if the connection should close.
    async fn dispatch(&self, msg: ClientMessage, guard: &mut DisconnectGuard) -> bool {
        let user_id = self.user_id;
        match msg {
            ClientMessage::CreateSession {
                session_name,
                duration,
                leader_name,
            } => {
                // Negative durations fail validation the same way zero does.
                let duration = u64::try_from(duration).unwrap_or(0);
                let created = self.state.registry.lock().await.create(
                    &session_name,
                    duration,
                    &leader_name,
                    user_id,
                    self.outbound.clone(),
                );
                match created {
                    Ok(created) => guard.track(created.handle),
                    Err(e) => {
                        tracing::debug!(%user_id, error = %e, "create rejected");
                        self.reply(ServerMessage::error(e));
                    }
                }
            }

            ClientMessage::JoinSession {
                session_id,
                participant_name,
            } => match self.join(&session_id, participant_name).await {
                Ok(handle) => guard.track(handle),
                Err(e) => {
                    tracing::debug!(%user_id, %session_id, error = %e, "join rejected");
                    self.reply(ServerMessage::join_error(e));
                }
            },

            ClientMessage::StartTimer { session_id } => {
                self.control(&session_id, TimerCommand::Start).await;
            }
            ClientMessage::PauseTimer { session_id } => {
                self.control(&session_id, TimerCommand::Pause).await;
            }
            ClientMessage::ResetTimer { session_id } => {
                self.control(&session_id, TimerCommand::Reset).await;
            }
            ClientMessage::EndSession { session_id } => {
                self.control(&session_id, TimerCommand::End).await;
            }

            ClientMessage::UpdateStatus { session_id, status } => {
                // Unknown sessions are ignored here, not reported.
                match self.lookup(&session_id).await {
                    Ok(handle) => {
                        if let Err(e) = handle.update_status(user_id, status).await {
                            self.reject(e);
                        }
                    }
                    Err(e) => tracing::debug!(%user_id, error = %e, "status update ignored"),
                }
            }

            ClientMessage::Heartbeat { client_time } => {
                let sessions = self.state.registry.lock().await.len();
                self.reply(ServerMessage::HeartbeatAck {
                    client_time,
                    server_time: self.state.clock.now_ms(),
                    sessions,
                });
            }

            ClientMessage::Leave => {
                tracing::info!(%user_id, "client left");
                return true;
            }
        }
        false
    }

    async fn join(
        &self,
        session_id: &str,
        participant_name: String,
    ) -> Result<SessionHandle, SessionError> {
        let handle = self.lookup(session_id).await?;
        handle
            .join(self.user_id, participant_name, self.outbound.clone())
            .await?;
        Ok(handle)
    }

    async fn control(&self, session_id: &str, command: TimerCommand) {
        let result = match self.lookup(session_id).await {
            Ok(handle) => handle.control(self.user_id, command).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.reject(e);
        }
    }

    /// Clones the session's handle out of the registry. The lock is
    /// released before the caller talks to the actor.
    async fn lookup(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.state.registry.lock().await.get(session_id)
    }

    /// Reports a failed request, unless it is one that stays silent.
    fn reject(&self, error: SessionError) {
        if error.is_silent() {
            tracing::debug!(user_id = %self.user_id, error = %error, "ignored request");
            return;
        }
        tracing::debug!(user_id = %self.user_id, error = %error, "request rejected");
        self.reply(ServerMessage::error(error));
    }

    fn reply(&self, message: ServerMessage) {
        // The receiving end lives as long as the handler itself.
        let _ = self.outbound.send(message);
    }
}

/// Reply for a frame that names a known event but whose payload doesn't
/// decode. Frames that aren't recognizable requests get no reply.
fn malformed_reply<C: Codec>(codec: &C, data: &[u8]) -> Option<ServerMessage> {
    let tag: Envelope<EventTag> = codec.decode(data).ok()?;
    let event = tag.message.event;
    if !ClientMessage::is_known_event(&event) {
        return None;
    }
    let error = ProtocolError::InvalidMessage(format!("malformed {event} request"));
    Some(if event == "join-session" {
        ServerMessage::join_error(error)
    } else {
        ServerMessage::error(error)
    })
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
