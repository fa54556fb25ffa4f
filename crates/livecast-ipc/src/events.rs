//! Error events sent from the controller to the UI.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// An engine failure tagged with the feedback channel it belongs to.
///
/// `is_link_closed` separates "connection lost" from every other error so the
/// UI can word them differently. It never influences state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// The engine-reported failure.
    pub error: EngineError,

    /// Whether an established stream was terminated.
    pub is_link_closed: bool,
}

impl ClassifiedError {
    /// Classify an engine error.
    pub fn classify(error: EngineError) -> Self {
        let is_link_closed = error.is_closed();
        Self {
            error,
            is_link_closed,
        }
    }

    /// Wrap the failure of a connection attempt.
    ///
    /// A link that was never established cannot be "closed", whatever
    /// category the engine used.
    pub fn connect_failed(error: EngineError) -> Self {
        Self {
            error,
            is_link_closed: false,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        self.error.message()
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_link_closed {
            write!(f, "Connection lost: {}", self.message())
        } else {
            write!(f, "Error: {}", self.message())
        }
    }
}
