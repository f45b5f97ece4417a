//! Session configuration.

use std::time::Duration;

/// Timing knobs for every session the server runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often an idle connection is pinged.
    pub keepalive_interval: Duration,

    /// How long a new connection may take to send its JoinRequest.
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}
