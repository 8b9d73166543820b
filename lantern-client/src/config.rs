//! Client configuration.

use lantern_protocol::{DEFAULT_HOST, DEFAULT_PORT, READ_DELAY};
use std::time::Duration;

/// Delay between connection attempts after a refused connect.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Client session configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Number of connections to process before stopping (None = unbounded).
    pub max_connections: Option<u32>,
    /// Backoff between connection attempts.
    pub reconnect_delay: Duration,
    /// Backoff between partial reads.
    pub read_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_connections: None,
            reconnect_delay: RECONNECT_DELAY,
            read_delay: READ_DELAY,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Returns the `host:port` endpoint.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
