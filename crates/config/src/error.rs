//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path:?}")]
    FileRead {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or internally inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// A peer public key failed to decode.
    #[error("invalid public key for peer {peer}: {reason}")]
    InvalidPeerKey {
        /// Peer whose key is malformed
        peer: String,
        /// Decode failure description
        reason: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
