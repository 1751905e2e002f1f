//! `StudySyncServer` builder and accept loop.
//!
//! This is the entry point for running a StudySync server. It ties the
//! layers together: transport → protocol → session registry → actors.

use std::sync::Arc;

use studysync_protocol::{Codec, JsonCodec};
use studysync_session::SessionRegistry;
use studysync_tick::{Clock, SystemClock};
use studysync_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::StudySyncError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// The registry lock is only held to look up or insert a session
/// handle; every session operation runs in that session's actor.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<SessionRegistry>,
    pub(crate) codec: C,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a StudySync server.
///
/// # Example
///
/// ```rust,no_run
/// use studysync::prelude::*;
///
/// # async fn run() -> Result<(), StudySyncError> {
/// let server = StudySyncServer::builder()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct StudySyncServerBuilder {
    config: ServerConfig,
    clock: Arc<dyn Clock>,
}

impl StudySyncServerBuilder {
    /// Creates a builder with default settings on the system clock.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for timer math and envelope timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<StudySyncServer<JsonCodec>, StudySyncError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let registry = SessionRegistry::with_clock(self.config.session.clone(), Arc::clone(&self.clock));
        let state = Arc::new(ServerState {
            registry: Mutex::new(registry),
            codec: JsonCodec,
            clock: self.clock,
            config: self.config,
        });

        Ok(StudySyncServer { transport, state })
    }
}

impl Default for StudySyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound StudySync server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct StudySyncServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl StudySyncServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> StudySyncServerBuilder {
        StudySyncServerBuilder::new()
    }
}

impl<C: Codec> StudySyncServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), StudySyncError> {
        tracing::info!(addr = ?self.local_addr().ok(), "studysync server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
