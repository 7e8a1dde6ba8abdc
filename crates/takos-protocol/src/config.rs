//! Protocol configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ProtocolError;

/// Environment prefix for overrides, e.g. `TAKOS__ROOM_KEY__TTL_SECS=300`
pub const ENV_PREFIX: &str = "TAKOS";

/// Complete protocol configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Room key lifecycle
    #[serde(default)]
    pub room_key: RoomKeyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Room key settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomKeyConfig {
    /// Age after which a room key should be rotated
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    600
}

impl Default for RoomKeyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl RoomKeyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl ProtocolConfig {
    /// Load from an optional TOML file, then apply `TAKOS__*` overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ProtocolError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ProtocolError> {
        Ok(toml::from_str(content)?)
    }

    /// Short-lived room keys and verbose logs for local testing
    pub fn development() -> Self {
        Self {
            room_key: RoomKeyConfig { ttl_secs: 60 },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.room_key.ttl(), Duration::from_secs(600));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_partial_toml() {
        let config = ProtocolConfig::from_toml_str("[room_key]\nttl_secs = 120\n").unwrap();
        assert_eq!(config.room_key.ttl_secs, 120);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(ProtocolConfig::from_toml_str("[room_key]\nttl_secs = \"x\"\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"\njson = true").unwrap();

        let config = ProtocolConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json);
        assert_eq!(config.room_key.ttl_secs, 600);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProtocolConfig::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }

    #[test]
    fn test_development_preset() {
        let config = ProtocolConfig::development();
        assert_eq!(config.room_key.ttl_secs, 60);
        assert_eq!(config.logging.level, "debug");
    }
}
