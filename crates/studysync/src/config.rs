//! Server settings, read from the environment by the binary.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studysync_session::SessionConfig;

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed. `None`,
    /// the default, leaves liveness to the transport.
    pub idle_timeout: Option<Duration>,

    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            idle_timeout: None,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment.
    ///
    /// | Variable | Effect |
    /// |---|---|
    /// | `STUDYSYNC_BIND` | full bind address |
    /// | `PORT` | bind `0.0.0.0:PORT` when `STUDYSYNC_BIND` is unset |
    /// | `STUDYSYNC_IDLE_TIMEOUT_SECS` | close silent connections after this many seconds, `0` keeps them open |
    /// | `STUDYSYNC_CODE_LENGTH` | length of generated session codes |
    ///
    /// Values that don't parse are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("STUDYSYNC_BIND").filter(|a| !a.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        } else if let Some(port) = parse_var::<u16>(&var, "PORT") {
            config.bind_addr = format!("0.0.0.0:{port}");
        }

        if let Some(secs) = parse_var::<u64>(&var, "STUDYSYNC_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(len) = parse_var::<usize>(&var, "STUDYSYNC_CODE_LENGTH") {
            config.session.code_length = len;
        }

        config
    }

    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}
