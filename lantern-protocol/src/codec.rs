//! Binary frame encoding and decoding.
//!
//! Frame layout (3 bytes header + optional payload, big-endian):
//!
//! ```text
//! +--------+-------------+------------------+
//! | type   | length      | payload          |
//! | 1 byte | 2 bytes     | length bytes     |
//! +--------+-------------+------------------+
//! ```
//!
//! `On` encodes to `12 00 00`, `Color(1, 2, 3)` to `20 00 03 01 02 03`.

use crate::command::Command;
use crate::error::ProtocolError;
use crate::registry::Registry;
use crate::HEADER_LENGTH;
use bytes::{BufMut, Bytes, BytesMut};

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub type_byte: u8,
    pub length: u16,
}

impl FrameHeader {
    /// Parses a header from the first [`HEADER_LENGTH`] bytes of `buf`
    /// without consuming them.
    ///
    /// Returns `None` if fewer than [`HEADER_LENGTH`] bytes are available.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        match buf {
            [type_byte, hi, lo, ..] => Some(Self {
                type_byte: *type_byte,
                length: u16::from_be_bytes([*hi, *lo]),
            }),
            _ => None,
        }
    }

    /// Total frame size including the header.
    pub fn frame_length(&self) -> usize {
        HEADER_LENGTH + self.length as usize
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.type_byte);
        buf.put_u16(self.length);
    }
}

/// Encodes a command into a frame.
pub fn encode(command: &Command) -> BytesMut {
    let header = FrameHeader {
        type_byte: command.type_byte(),
        length: command.length(),
    };
    let mut buf = BytesMut::with_capacity(header.frame_length());
    header.write(&mut buf);
    if header.length > 0 {
        buf.put_slice(command.value());
    }
    buf
}

/// Decodes a frame's type and payload using the process-wide registry.
///
/// Unregistered types yield `Ok(None)`.
pub fn decode(type_byte: u8, payload: Bytes) -> Result<Option<Command>, ProtocolError> {
    Registry::global().decode(type_byte, payload)
}
