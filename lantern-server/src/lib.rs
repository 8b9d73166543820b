//! # lantern-server
//!
//! Scripted TCP server for lantern.
//!
//! This crate provides:
//! - A server that plays a fixed command script to every connection
//! - Pacing between commands and an optional bound on connections served
//! - YAML script loading with environment overrides

pub mod config;
pub mod error;
pub mod server;

pub use config::{ConfigError, ScriptCommand, ScriptConfig};
pub use error::ServerError;
pub use server::{default_script, ScriptedServer, ServerConfig, ServerStats};
