//! Device rotation watch.
//!
//! Subscribes to a rotation sensor for as long as the owning UI is active
//! and forwards the latest angle to a [`RotationSink`].

mod error;
mod watch;

pub use error::RotationError;
pub use watch::RotationWatch;

use crossbeam_channel::Receiver;
use livecast_ipc::RotationAngle;

/// Channel capacity for rotation events.
pub const ROTATION_CHANNEL_CAPACITY: usize = 16;

/// Result type for rotation operations.
pub type RotationResult<T> = Result<T, RotationError>;

/// A source of device rotation events.
pub trait RotationSensor: Send + Sync {
    /// Start delivering rotation changes.
    ///
    /// The sensor should send the current rotation first.
    fn subscribe(&self) -> RotationResult<Receiver<RotationAngle>>;

    /// Stop delivering rotation changes.
    fn unsubscribe(&self);
}

/// Receives rotation updates from a [`RotationWatch`].
pub trait RotationSink: Send + Sync {
    /// Apply a new target rotation.
    fn set_target_rotation(&self, angle: RotationAngle);
}

/// Creates a bounded rotation event channel.
pub fn rotation_channel() -> (
    crossbeam_channel::Sender<RotationAngle>,
    Receiver<RotationAngle>,
) {
    crossbeam_channel::bounded(ROTATION_CHANNEL_CAPACITY)
}
