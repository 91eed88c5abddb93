//! Startup configuration
//!
//! Read once from a TOML file (missing file means defaults), then
//! overridden by command-line flags. Nothing here changes after startup.

use keyjoy_transport::DEFAULT_TOPIC;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Where published messages go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkConfig {
    /// One JSON datagram per message
    Udp {
        #[serde(default = "default_udp_target")]
        target: String,
    },
    /// One JSON line per message on stdout
    Stdout,
}

fn default_udp_target() -> String {
    "127.0.0.1:9870".to_string()
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Udp {
            target: default_udp_target(),
        }
    }
}

impl SinkConfig {
    /// Short human-readable description, e.g. `udp://127.0.0.1:9870`
    pub fn describe(&self) -> String {
        match self {
            SinkConfig::Udp { target } => format!("udp://{target}"),
            SinkConfig::Stdout => "stdout".to_string(),
        }
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Time between publish ticks
    #[serde(default = "default_period_ms")]
    pub publish_period_ms: u64,
    /// How long a single key read waits before re-checking for shutdown
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Topic name attached to every message
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Frame id written into the message header
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub sink: SinkConfig,
}

fn default_period_ms() -> u64 {
    100
}
fn default_poll_timeout_ms() -> u64 {
    50
}
fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            publish_period_ms: default_period_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
            topic: default_topic(),
            frame_id: String::new(),
            sink: SinkConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keyjoy")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "publish_period_ms must be greater than zero".into(),
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.topic.is_empty() {
            return Err(ConfigError::Invalid("topic must not be empty".into()));
        }
        if let SinkConfig::Udp { target } = &self.sink {
            if target.is_empty() {
                return Err(ConfigError::Invalid("UDP target must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn publish_period(&self) -> Duration {
        Duration::from_millis(self.publish_period_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
