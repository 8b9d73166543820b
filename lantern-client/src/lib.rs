//! # lantern-client
//!
//! Client library for lantern.
//!
//! This crate provides:
//! - A reconnecting client session that feeds decoded commands to a handler
//! - Cooperative cancellation through a [`StopHandle`]
//! - The [`Lantern`] device state driven by received commands

pub mod client;
pub mod config;
pub mod device;
pub mod error;

pub use client::{Client, HandlerError, SessionState, SessionStats, StopHandle};
pub use config::ClientConfig;
pub use device::Lantern;
pub use error::{ClientError, DeviceError};
