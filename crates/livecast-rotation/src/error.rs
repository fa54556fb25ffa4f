//! Error types for the rotation watch.

use thiserror::Error;

/// Errors that can occur while watching device rotation.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The sensor could not be subscribed to.
    #[error("Rotation sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// The watch thread could not be spawned.
    #[error("Failed to spawn rotation thread: {0}")]
    Spawn(#[from] std::io::Error),
}
