//! # lantern-protocol
//!
//! Wire protocol implementation for lantern.
//!
//! This crate provides:
//! - The command model and the built-in command variants
//! - A type-byte registry used to decode frames into commands
//! - Binary framing (1 byte type, 2 bytes big-endian length, payload)
//! - A stream transport that reconstructs frames from arbitrarily chunked reads

pub mod codec;
pub mod command;
pub mod error;
pub mod registry;
pub mod transport;

use std::time::Duration;

pub use codec::{decode, encode, FrameHeader};
pub use command::{Command, CommandKind, Rgb};
pub use error::ProtocolError;
pub use registry::{DecodeFn, Registry, RegistryEntry};
pub use transport::Transport;

/// Size of the frame header in bytes (1 type + 2 length).
pub const HEADER_LENGTH: usize = 3;

/// Maximum payload length a frame can describe.
pub const MAX_PAYLOAD_LENGTH: usize = u16::MAX as usize;

/// Default host for both server and client.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 9999;

/// Pause between partial reads while a frame is incomplete.
pub const READ_DELAY: Duration = Duration::from_millis(100);
