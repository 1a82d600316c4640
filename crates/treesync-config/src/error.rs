//! Error types for configuration management

use std::path::PathBuf;
use thiserror::Error;
use treesync_types::Error as TreesyncError;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("I/O error reading config file '{path}': {source}")]
    Io {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Generic configuration error
    #[error("Configuration error: {message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        Self::Other {
            message: error.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        Self::Other {
            message: error.to_string(),
        }
    }
}

impl From<ConfigError> for TreesyncError {
    fn from(error: ConfigError) -> Self {
        TreesyncError::config(error.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
