//! Error types for family-points-core

use thiserror::Error;

use crate::status::SyncStatus;

/// Result type alias using family-points-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in family-points-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport or HTTP failure talking to the remote host
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or invalid sync configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Local document is missing or unusable
    #[error("Local state error: {0}")]
    LocalState(String),

    /// Status machine was driven through a transition it does not allow
    #[error("Invalid sync status transition: {from} -> {to}")]
    InvalidTransition { from: SyncStatus, to: SyncStatus },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used when a flow turns a failure into status.
///
/// Conflicts are not errors; they are reported through the upload outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Config,
    Parse,
    Local,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Http(_) => ErrorKind::Network,
            Self::Config(_) => ErrorKind::Config,
            Self::Parse(_) | Self::Serialization(_) => ErrorKind::Parse,
            Self::LocalState(_) | Self::InvalidTransition { .. } | Self::Io(_) => ErrorKind::Local,
        }
    }

    /// Message suitable for the status indicator, without the variant prefix.
    pub fn status_message(&self) -> String {
        match self {
            Self::Network(message)
            | Self::Config(message)
            | Self::Parse(message)
            | Self::LocalState(message) => message.clone(),
            Self::Http(error) if error.is_timeout() => "network timeout".to_string(),
            Self::Http(error) if error.is_connect() => "network error".to_string(),
            other => other.to_string(),
        }
    }
}
