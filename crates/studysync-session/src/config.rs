//! Session layer settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for the session registry and its actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Characters in a generated session code.
    pub code_length: usize,

    /// How many fresh codes to draw before giving up on a collision.
    pub max_code_attempts: u32,

    /// Bound of each session actor's command channel. A full channel
    /// makes callers wait.
    pub channel_size: usize,

    /// Nominal time between countdown ticks. Each tick credits one second
    /// of study time, so this should stay at one second outside of tests.
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            max_code_attempts: 32,
            channel_size: 64,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Shortest code the registry will hand out.
    pub const MIN_CODE_LENGTH: usize = 4;

    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.code_length < Self::MIN_CODE_LENGTH {
            tracing::warn!(
                code_length = self.code_length,
                min = Self::MIN_CODE_LENGTH,
                "code_length too short, clamping"
            );
            self.code_length = Self::MIN_CODE_LENGTH;
        }
        self.max_code_attempts = self.max_code_attempts.max(1);
        self.channel_size = self.channel_size.max(1);
        self
    }
}
