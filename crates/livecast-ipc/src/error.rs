//! Errors reported by the streaming engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors the streaming engine reports, either as the result of an
/// operation or asynchronously on its error signal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EngineError {
    /// An established connection was closed by the remote end or dropped.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// A capture device failed or could not be opened.
    #[error("Capture error: {0}")]
    Capture(String),

    /// Encoder failure.
    #[error("Encoder error: {0}")]
    Encoder(String),

    /// The engine rejected a configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Returns true if this error terminates an already established link.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// The underlying message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Closed(message)
            | Self::Connect(message)
            | Self::Capture(message)
            | Self::Encoder(message)
            | Self::Config(message)
            | Self::Other(message) => message,
        }
    }
}
