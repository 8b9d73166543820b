//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
///
/// Truncated frames and unknown command types are not errors: the transport
/// reports them as "no command". Only registry misuse and payloads of the
/// wrong shape for a registered type surface here.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("command type {type_byte:#04x} is already registered as {existing}")]
    DuplicateRegistration {
        type_byte: u8,
        existing: &'static str,
    },

    #[error("malformed {name} payload (type {type_byte:#04x}): expected {expected} bytes, got {actual}")]
    MalformedPayload {
        type_byte: u8,
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error indicates a peer sent bytes that do not
    /// match a registered command shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ProtocolError::MalformedPayload { .. })
    }
}
