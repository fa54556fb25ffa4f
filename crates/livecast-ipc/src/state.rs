//! Session connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The connection status of a live session.
///
/// Only the session controller transitions this value. Observers receive
/// snapshots and issue start/stop requests instead of mutating it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Idle,

    /// A start-stream call is in flight.
    Connecting {
        /// Endpoint being connected to.
        url: String,
    },

    /// The engine reports an active stream.
    Streaming,
}

impl ConnectionState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a connection attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    /// Returns true if the session is streaming.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns true while connecting or streaming.
    ///
    /// This is what a live toggle control renders as "checked".
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting { .. } => "Connecting",
            Self::Streaming => "Streaming",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting { url } => write!(f, "Connecting({url})"),
            other => f.write_str(other.name()),
        }
    }
}
