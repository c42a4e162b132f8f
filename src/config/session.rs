use core::time::Duration;

/// Session loop parameters
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// How long the session may stay in `Joining`, measured from loop start
    pub join_timeout: Duration,
    /// Cooperative sleep between two engine polls
    pub poll_interval: Duration,
    /// Application port of the uplink
    pub port: u8,
    /// Whether the uplink requests an acknowledgement
    pub confirmed: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(1),
            port: 1,
            confirmed: false,
        }
    }
}
