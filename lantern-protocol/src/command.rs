//! Command model.
//!
//! A command is a `(type, length, value)` triple. The length is derived from
//! the value, so a command can never disagree with its own payload.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_LENGTH;
use bytes::Bytes;
use std::fmt;

/// Built-in command variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Device enters the active state.
    On,
    /// Device enters the inactive state.
    Off,
    /// Device colour is set from a 3-byte RGB payload.
    Color,
    /// Placeholder type with no behaviour.
    Unknown,
}

impl CommandKind {
    /// Built-in variants in registration order.
    pub const ALL: [CommandKind; 4] = [
        CommandKind::On,
        CommandKind::Off,
        CommandKind::Color,
        CommandKind::Unknown,
    ];

    pub const fn type_byte(self) -> u8 {
        match self {
            CommandKind::On => 0x12,
            CommandKind::Off => 0x13,
            CommandKind::Color => 0x20,
            CommandKind::Unknown => 0x99,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::On => "On",
            CommandKind::Off => "Off",
            CommandKind::Color => "Color",
            CommandKind::Unknown => "Unknown",
        }
    }

    /// Exact payload length this variant carries, if fixed.
    pub const fn payload_length(self) -> Option<usize> {
        match self {
            CommandKind::On | CommandKind::Off => Some(0),
            CommandKind::Color => Some(3),
            CommandKind::Unknown => None,
        }
    }
}

impl TryFrom<u8> for CommandKind {
    type Error = u8;

    fn try_from(type_byte: u8) -> Result<Self, Self::Error> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.type_byte() == type_byte)
            .ok_or(type_byte)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// A decoded command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    type_byte: u8,
    value: Bytes,
}

impl Command {
    /// Creates a command of any type with the given payload.
    pub fn new(type_byte: u8, value: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let value = value.into();
        if value.len() > MAX_PAYLOAD_LENGTH {
            return Err(ProtocolError::PayloadTooLarge {
                size: value.len(),
                max: MAX_PAYLOAD_LENGTH,
            });
        }
        Ok(Self { type_byte, value })
    }

    /// Builds a command from a payload already bounded by a frame header.
    pub(crate) fn from_frame(type_byte: u8, value: Bytes) -> Self {
        debug_assert!(value.len() <= MAX_PAYLOAD_LENGTH);
        Self { type_byte, value }
    }

    pub fn on() -> Self {
        Self::from_frame(CommandKind::On.type_byte(), Bytes::new())
    }

    pub fn off() -> Self {
        Self::from_frame(CommandKind::Off.type_byte(), Bytes::new())
    }

    pub fn unknown() -> Self {
        Self::from_frame(CommandKind::Unknown.type_byte(), Bytes::new())
    }

    pub fn color(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgb(Rgb::new(r, g, b))
    }

    pub fn from_rgb(rgb: Rgb) -> Self {
        Self::from_frame(
            CommandKind::Color.type_byte(),
            Bytes::copy_from_slice(&rgb.to_bytes()),
        )
    }

    pub fn type_byte(&self) -> u8 {
        self.type_byte
    }

    /// Payload length as carried in the frame header.
    pub fn length(&self) -> u16 {
        self.value.len() as u16
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns the built-in variant for this command's type, if any.
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::try_from(self.type_byte).ok()
    }

    /// Returns the colour of a well-formed Color command.
    pub fn rgb(&self) -> Option<Rgb> {
        match (self.kind(), self.value.as_ref()) {
            (Some(CommandKind::Color), &[r, g, b]) => Some(Rgb::new(r, g, b)),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.rgb()) {
            (Some(CommandKind::Color), Some(rgb)) => {
                write!(f, "Color({}, {}, {})", rgb.r, rgb.g, rgb.b)
            }
            (Some(CommandKind::Color), None) | (None, _) => write!(
                f,
                "Command({:#04x}, len={})",
                self.type_byte,
                self.value.len()
            ),
            (Some(kind), _) => f.write_str(kind.name()),
        }
    }
}
