//! Command registry.
//!
//! Maps a frame's type byte to the function that turns its payload into a
//! [`Command`]. A registry is populated in one explicit step before it is
//! shared, then read without locking.

use crate::command::{Command, CommandKind};
use crate::error::ProtocolError;
use bytes::Bytes;
use std::fmt;
use std::sync::OnceLock;

/// Builds a command from a frame payload, validating its shape.
pub type DecodeFn = fn(Bytes) -> Result<Command, ProtocolError>;

/// A registered command type.
#[derive(Clone, Copy)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub decode: DecodeFn,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// Type-byte lookup table.
#[derive(Clone)]
pub struct Registry {
    table: [Option<RegistryEntry>; 256],
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { table: [None; 256] }
    }

    /// Creates a registry with the built-in commands, in order: On, Off,
    /// Color, Unknown.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in CommandKind::ALL {
            // Built-in type bytes are distinct, so this cannot collide.
            registry.table[kind.type_byte() as usize] = Some(builtin_entry(kind));
        }
        registry
    }

    /// Returns the process-wide registry holding the built-in commands.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::with_defaults)
    }

    /// Registers a decoder for `type_byte`.
    ///
    /// Fails without touching the existing mapping if the type is taken.
    pub fn register(
        &mut self,
        type_byte: u8,
        name: &'static str,
        decode: DecodeFn,
    ) -> Result<(), ProtocolError> {
        let slot = &mut self.table[type_byte as usize];
        if let Some(existing) = slot {
            return Err(ProtocolError::DuplicateRegistration {
                type_byte,
                existing: existing.name,
            });
        }
        *slot = Some(RegistryEntry { name, decode });
        tracing::debug!("Registered command {} ({:#04x})", name, type_byte);
        Ok(())
    }

    /// Registers one of the built-in variants.
    pub fn register_kind(&mut self, kind: CommandKind) -> Result<(), ProtocolError> {
        let entry = builtin_entry(kind);
        self.register(kind.type_byte(), entry.name, entry.decode)
    }

    /// Removes the decoder for `type_byte`, returning it so it can be
    /// registered again later.
    pub fn unregister(&mut self, type_byte: u8) -> Option<RegistryEntry> {
        self.table[type_byte as usize].take()
    }

    pub fn contains(&self, type_byte: u8) -> bool {
        self.table[type_byte as usize].is_some()
    }

    pub fn name_of(&self, type_byte: u8) -> Option<&'static str> {
        self.table[type_byte as usize].map(|entry| entry.name)
    }

    /// Registered type bytes in ascending order.
    pub fn types(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|t| self.contains(*t))
    }

    pub fn len(&self) -> usize {
        self.table.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes a frame.
    ///
    /// Returns `Ok(None)` for an unregistered type: the frame is dropped so
    /// that obsolete command types do not break an otherwise healthy stream.
    pub fn decode(&self, type_byte: u8, payload: Bytes) -> Result<Option<Command>, ProtocolError> {
        match self.table[type_byte as usize] {
            Some(entry) => (entry.decode)(payload).map(Some),
            None => {
                tracing::debug!(
                    "Dropping frame with unregistered type {:#04x} ({} payload bytes)",
                    type_byte,
                    payload.len()
                );
                Ok(None)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.table
                    .iter()
                    .enumerate()
                    .filter_map(|(t, slot)| slot.map(|e| (format!("{:#04x}", t), e.name))),
            )
            .finish()
    }
}

fn builtin_entry(kind: CommandKind) -> RegistryEntry {
    let decode: DecodeFn = match kind {
        CommandKind::On => decode_on,
        CommandKind::Off => decode_off,
        CommandKind::Color => decode_color,
        CommandKind::Unknown => decode_unknown,
    };
    RegistryEntry {
        name: kind.name(),
        decode,
    }
}

fn expect_length(kind: CommandKind, payload: Bytes) -> Result<Command, ProtocolError> {
    if let Some(expected) = kind.payload_length() {
        if payload.len() != expected {
            return Err(ProtocolError::MalformedPayload {
                type_byte: kind.type_byte(),
                name: kind.name(),
                expected,
                actual: payload.len(),
            });
        }
    }
    Ok(Command::from_frame(kind.type_byte(), payload))
}

fn decode_on(payload: Bytes) -> Result<Command, ProtocolError> {
    expect_length(CommandKind::On, payload)
}

fn decode_off(payload: Bytes) -> Result<Command, ProtocolError> {
    expect_length(CommandKind::Off, payload)
}

fn decode_color(payload: Bytes) -> Result<Command, ProtocolError> {
    expect_length(CommandKind::Color, payload)
}

fn decode_unknown(payload: Bytes) -> Result<Command, ProtocolError> {
    expect_length(CommandKind::Unknown, payload)
}
