//! Error taxonomy for Paceline.
//!
//! The monitor and pipeline themselves are pure in-memory computation and
//! never fail at runtime; errors here come from the edges (configuration
//! files, serialization, closed stream channels).

use thiserror::Error;

/// Errors produced by Paceline operations.
#[derive(Error, Debug)]
pub enum PacelineError {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying IO failure while reading a config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML in a config file.
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization failure at an export boundary.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The consumer side of an event stream has gone away.
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Result type alias for Paceline operations.
pub type Result<T> = std::result::Result<T, PacelineError>;

impl PacelineError {
    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if this error is recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }

    /// Returns the error category for metrics/logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Yaml(_) | Self::Serialization(_) => "serialization",
            Self::ChannelClosed => "channel",
        }
    }
}
