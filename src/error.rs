//! Error types for the bridge

use std::path::PathBuf;

use thiserror::Error;

use crate::terminal::TerminalError;

/// Errors from starting or tearing down the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    #[error("Publish period must be greater than zero")]
    ZeroPeriod,

    #[error("Failed to spawn input listener: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Input listener thread panicked")]
    ListenerPanicked,
}

/// Errors from loading, validating or saving the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
