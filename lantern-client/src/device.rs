//! Lantern device state.

use crate::error::DeviceError;
use lantern_protocol::{Command, CommandKind, Rgb};

/// The lantern: an on/off switch and a colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lantern {
    active: bool,
    color: Rgb,
}

impl Lantern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    /// Applies a received command.
    ///
    /// `Unknown` is accepted and ignored. Types outside the built-in set are
    /// rejected.
    pub fn apply(&mut self, command: &Command) -> Result<(), DeviceError> {
        match command.kind() {
            Some(CommandKind::On) => {
                self.active = true;
                tracing::info!("Lantern has been turned ON");
            }
            Some(CommandKind::Off) => {
                self.active = false;
                tracing::info!("Lantern has been turned OFF");
            }
            Some(CommandKind::Color) => {
                self.color = command
                    .rgb()
                    .ok_or(DeviceError::Malformed(command.value().len()))?;
                tracing::info!("Lantern is now glowing with RGB {}", self.color);
            }
            Some(CommandKind::Unknown) => {
                tracing::debug!("Ignoring {}", command);
            }
            None => return Err(DeviceError::Unsupported(command.type_byte())),
        }
        Ok(())
    }
}
