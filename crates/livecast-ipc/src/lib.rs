//! Shared session types and UI<->controller channels for livecast.
//!
//! This crate defines the vocabulary exchanged between the session
//! controller, its collaborators and the presenter that renders it.

mod error;
mod events;
mod state;
mod types;

pub use error::EngineError;
pub use events::ClassifiedError;
pub use state::ConnectionState;
pub use types::{AudioConfig, RotationAngle, SessionConfig, VideoConfig};

use tokio::sync::broadcast;

/// Channel capacity for connection state transitions (controller → UI).
pub const STATE_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for classified errors (controller → UI).
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Creates the multicast channel carrying connection state transitions.
pub fn state_channel() -> (
    broadcast::Sender<ConnectionState>,
    broadcast::Receiver<ConnectionState>,
) {
    broadcast::channel(STATE_CHANNEL_CAPACITY)
}

/// Creates the multicast channel carrying classified errors.
pub fn error_channel() -> (
    broadcast::Sender<ClassifiedError>,
    broadcast::Receiver<ClassifiedError>,
) {
    broadcast::channel(ERROR_CHANNEL_CAPACITY)
}
