//! Error types for the session controller.

use thiserror::Error;

use livecast_ipc::{ClassifiedError, ConnectionState, EngineError};
use livecast_permissions::PermissionSet;

/// Errors returned by session operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Capture permissions were not granted.
    #[error("Permissions denied: {permissions}")]
    PermissionDenied { permissions: PermissionSet },

    /// The operation is not allowed in the current connection state.
    #[error("Cannot {operation} while {state}")]
    StateConflict {
        operation: &'static str,
        state: ConnectionState,
    },

    /// Another operation is still holding the session.
    #[error("Cannot {operation} while {pending} is in progress")]
    Busy {
        operation: &'static str,
        pending: &'static str,
    },

    /// A capture source could not be acquired.
    #[error("Capture source unavailable: {0}")]
    SourceUnavailable(String),

    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// An established connection was terminated.
    #[error("Connection lost: {0}")]
    LinkClosed(String),

    /// The stream URL is malformed or uses an unsupported scheme.
    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    /// Any other engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    pub(crate) fn conflict(operation: &'static str, state: &ConnectionState) -> Self {
        Self::StateConflict {
            operation,
            state: state.clone(),
        }
    }

    pub(crate) fn busy(operation: &'static str, pending: &'static str) -> Self {
        Self::Busy { operation, pending }
    }
}

impl From<ClassifiedError> for SessionError {
    fn from(classified: ClassifiedError) -> Self {
        if classified.is_link_closed {
            return Self::LinkClosed(classified.message().to_string());
        }
        match classified.error {
            EngineError::Connect(message) => Self::ConnectFailed(message),
            error => Self::Engine(error),
        }
    }
}
