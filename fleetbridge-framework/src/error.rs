//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Directory registration failed.
    #[error("Directory registration failed: {0}")]
    Registration(String),

    /// Could not establish a bus connection.
    #[error("Failed to connect to {address}: {message}")]
    Connection { address: String, message: String },

    /// Inbound payload could not be decoded.
    #[error("Failed to decode supply: {0}")]
    Decode(String),

    /// Outbound payload could not be encoded.
    #[error("Failed to encode supply: {0}")]
    Encode(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// Subscribe stream failed or was closed.
    #[error("Supply stream on {key} ended: {message}")]
    Stream { key: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of [`BridgeError`]s, used for per-kind counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    Encode,
    Publish,
    Stream,
    Registration,
    Connection,
    Config,
    Other,
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a registration error.
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Create a connection error.
    pub fn connection(address: impl Into<String>, msg: impl ToString) -> Self {
        Self::Connection {
            address: address.into(),
            message: msg.to_string(),
        }
    }

    /// Create a publish error.
    pub fn publish(key: impl Into<String>, msg: impl ToString) -> Self {
        Self::Publish {
            key: key.into(),
            message: msg.to_string(),
        }
    }

    /// Create a stream error.
    pub fn stream(key: impl Into<String>, msg: impl ToString) -> Self {
        Self::Stream {
            key: key.into(),
            message: msg.to_string(),
        }
    }

    /// Which kind of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Publish { .. } => ErrorKind::Publish,
            Self::Stream { .. } => ErrorKind::Stream,
            Self::Registration(_) => ErrorKind::Registration,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Config(_)
            | Self::ConfigNotFound { .. }
            | Self::ConfigParse(_)
            | Self::ConfigValidation(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
