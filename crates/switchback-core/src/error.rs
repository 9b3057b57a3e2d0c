//! Error types for switchback-core
//!
//! These errors cover provider construction, endpoint release and
//! configuration loading. Failures raised by a remote call are never wrapped
//! in this type; they travel back to the caller exactly as the endpoint
//! produced them.

use thiserror::Error;

/// Result type alias using switchback-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Switchback
#[derive(Error, Debug)]
pub enum Error {
    /// A provider was built without any endpoint
    #[error("Failover provider for {interface} requires at least one endpoint")]
    NoEndpoints { interface: String },

    /// An endpoint failed to release its resources on close
    #[error("Failed to release endpoint {index} of {interface}: {message}")]
    Release {
        interface: String,
        index: usize,
        message: String,
    },

    /// Invalid configuration values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file extension is not recognised
    #[error("Unsupported configuration format: {path} (expected .yaml, .yml or .json)")]
    UnsupportedConfigFormat { path: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a no endpoints error
    pub fn no_endpoints(interface: impl Into<String>) -> Self {
        Self::NoEndpoints {
            interface: interface.into(),
        }
    }

    /// Create a release error for the endpoint at `index`
    pub fn release(interface: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self::Release {
            interface: interface.into(),
            index,
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unsupported config format error
    pub fn unsupported_config_format(path: impl Into<String>) -> Self {
        Self::UnsupportedConfigFormat { path: path.into() }
    }
}
