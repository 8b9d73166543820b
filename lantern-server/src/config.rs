//! Command script configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values (the built-in demo script)
//! 2. YAML script file (if specified via LANTERN_SCRIPT or --script)
//! 3. Environment variables
//!
//! ```yaml
//! pacing_ms: 1000
//! max_connections: 3
//! commands:
//!   - on
//!   - color: [10, 20, 30]
//!   - off
//!   - unknown
//!   - raw: { type: 66, value: [1, 2] }
//! ```

use crate::server::default_script;
use lantern_protocol::{Command, CommandKind, ProtocolError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default delay between scripted commands, in milliseconds.
pub const DEFAULT_PACING_MS: u64 = 1000;

/// One scripted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptCommand {
    On,
    Off,
    Unknown,
    Color([u8; 3]),
    Raw {
        #[serde(rename = "type")]
        type_byte: u8,
        #[serde(default)]
        value: Vec<u8>,
    },
}

impl ScriptCommand {
    pub fn to_command(&self) -> Result<Command, ProtocolError> {
        match self {
            ScriptCommand::On => Ok(Command::on()),
            ScriptCommand::Off => Ok(Command::off()),
            ScriptCommand::Unknown => Ok(Command::unknown()),
            ScriptCommand::Color([r, g, b]) => Ok(Command::color(*r, *g, *b)),
            ScriptCommand::Raw { type_byte, value } => Command::new(*type_byte, value.clone()),
        }
    }

    pub fn from_command(command: &Command) -> Self {
        match (command.kind(), command.rgb()) {
            (Some(CommandKind::On), _) if command.length() == 0 => ScriptCommand::On,
            (Some(CommandKind::Off), _) if command.length() == 0 => ScriptCommand::Off,
            (Some(CommandKind::Unknown), _) if command.length() == 0 => ScriptCommand::Unknown,
            (Some(CommandKind::Color), Some(rgb)) => ScriptCommand::Color(rgb.to_bytes()),
            _ => ScriptCommand::Raw {
                type_byte: command.type_byte(),
                value: command.value().to_vec(),
            },
        }
    }
}

/// Scripted server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Delay between commands in milliseconds.
    pub pacing_ms: u64,
    /// Number of connections to serve before shutting down.
    pub max_connections: Option<u32>,
    /// Commands sent to every connection, in order.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub commands: Vec<ScriptCommand>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            pacing_ms: DEFAULT_PACING_MS,
            max_connections: None,
            commands: default_script()
                .iter()
                .map(ScriptCommand::from_command)
                .collect(),
        }
    }
}

impl ScriptConfig {
    /// Loads the script from `path`, or from LANTERN_SCRIPT if no path is
    /// given, then applies environment variable overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os("LANTERN_SCRIPT").map(PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads a script from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    /// Parses a script from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ScriptConfig = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the script to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(pacing) = std::env::var("LANTERN_PACING_MS") {
            if let Ok(ms) = pacing.parse() {
                self.pacing_ms = ms;
            }
        }

        if let Ok(max) = std::env::var("LANTERN_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = Some(n);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.commands()?;
        Ok(())
    }

    /// Returns pacing as Duration.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Builds the commands to send.
    pub fn commands(&self) -> Result<Vec<Command>, ConfigError> {
        self.commands
            .iter()
            .enumerate()
            .map(|(i, c)| {
                c.to_command()
                    .map_err(|e| ConfigError::ValidationError(format!("command #{}: {}", i, e)))
            })
            .collect()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read script file '{}': {}", .0.display(), .1)]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse script '{}': {}", .0.display(), .1)]
    ParseError(PathBuf, String),

    #[error("script validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_script() {
        let config = ScriptConfig::default();
        assert_eq!(config.pacing(), Duration::from_secs(1));
        assert_eq!(config.max_connections, None);
        assert_eq!(
            config.commands().unwrap(),
            vec![
                Command::color(1, 2, 10),
                Command::on(),
                Command::color(100, 2, 10),
                Command::off(),
                Command::unknown(),
            ]
        );
    }

    #[test]
    fn test_parse_script() {
        let yaml = r#"
pacing_ms: 25
max_connections: 2
commands:
  - unknown
  - color: [10, 20, 30]
  - on
  - off
  - raw:
      type: 66
      value: [1, 2]
"#;
        let config = ScriptConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.pacing(), Duration::from_millis(25));
        assert_eq!(config.max_connections, Some(2));
        assert_eq!(
            config.commands().unwrap(),
            vec![
                Command::unknown(),
                Command::color(10, 20, 30),
                Command::on(),
                Command::off(),
                Command::new(66, vec![1u8, 2]).unwrap(),
            ]
        );
    }

    #[test]
    fn test_partial_script_uses_defaults() {
        let config = ScriptConfig::from_yaml("pacing_ms: 5\n").unwrap();
        assert_eq!(config.pacing_ms, 5);
        assert_eq!(config.commands.len(), 5);
    }

    #[test]
    fn test_invalid_script() {
        let result = ScriptConfig::from_yaml("commands:\n  - blink\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));

        let result = ScriptConfig::from_yaml("commands:\n  - color: [1, 2]\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn test_oversized_raw_payload_rejected() {
        let config = ScriptConfig {
            commands: vec![ScriptCommand::Raw {
                type_byte: 0x42,
                value: vec![0u8; 70_000],
            }],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref msg) if msg.contains("#0")));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pacing_ms: 0\ncommands:\n  - on\n  - off").unwrap();

        let config = ScriptConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pacing(), Duration::ZERO);
        assert_eq!(
            config.commands().unwrap(),
            vec![Command::on(), Command::off()]
        );
    }

    #[test]
    fn test_from_file_missing() {
        let result = ScriptConfig::from_file("/nonexistent/lantern-script.yaml");
        match result {
            Err(ConfigError::IoError(path, _)) => {
                assert!(path.ends_with("lantern-script.yaml"));
            }
            other => panic!("expected IoError, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "pacing_ms: [not, a, number]").unwrap();

        let err = ScriptConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = ScriptConfig {
            pacing_ms: 10,
            max_connections: Some(1),
            commands: vec![
                ScriptCommand::Color([1, 2, 3]),
                ScriptCommand::On,
                ScriptCommand::Raw {
                    type_byte: 7,
                    value: vec![9],
                },
            ],
        };
        let yaml = config.to_yaml().unwrap();
        let parsed = ScriptConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.commands, config.commands);
        assert_eq!(parsed.max_connections, Some(1));
    }

    #[test]
    fn test_from_command() {
        assert_eq!(ScriptCommand::from_command(&Command::on()), ScriptCommand::On);
        assert_eq!(
            ScriptCommand::from_command(&Command::color(4, 5, 6)),
            ScriptCommand::Color([4, 5, 6])
        );
        let malformed = Command::new(0x20, vec![1u8]).unwrap();
        assert_eq!(
            ScriptCommand::from_command(&malformed),
            ScriptCommand::Raw {
                type_byte: 0x20,
                value: vec![1]
            }
        );
    }
}
