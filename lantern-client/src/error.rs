//! Client error types.

use thiserror::Error;

/// Client errors.
///
/// Refused connections, truncated frames and handler failures are recovered
/// inside the session and never reach the caller.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the lantern device when applying a command.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unsupported command type {0:#04x}")]
    Unsupported(u8),

    #[error("malformed colour payload ({0} bytes)")]
    Malformed(usize),
}
