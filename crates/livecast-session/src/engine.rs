//! Streaming engine contract.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use livecast_ipc::{EngineError, RotationAngle, SessionConfig};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Describes how the engine should open the audio capture source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AudioSourceFactory {
    /// The default device microphone.
    #[default]
    Microphone,

    /// A named platform audio input.
    Device(String),
}

impl fmt::Display for AudioSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Microphone => f.write_str("microphone"),
            Self::Device(name) => write!(f, "device '{name}'"),
        }
    }
}

/// A surface that renders the camera preview.
pub trait PreviewSink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;
}

/// The capture and streaming engine.
///
/// Errors returned by [`start_stream`](Self::start_stream) are authoritative
/// for that attempt. If the engine also publishes the same error on
/// [`error_signal`](Self::error_signal), the controller reports it once.
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    /// Apply audio and video encoder configuration.
    async fn configure(&self, config: &SessionConfig) -> EngineResult<()>;

    /// Open the audio capture source.
    async fn set_audio_source(&self, factory: &AudioSourceFactory) -> EngineResult<()>;

    /// Close the audio capture source, if any.
    async fn release_audio_source(&self);

    /// Open the camera with the given id as video source.
    async fn set_camera_id(&self, camera_id: &str) -> EngineResult<()>;

    /// Close the video capture source, if any.
    async fn release_video_source(&self);

    /// Start rendering the video source into a preview sink.
    fn start_preview(&self, sink: Arc<dyn PreviewSink>) -> EngineResult<()>;

    /// Stop rendering the preview.
    fn stop_preview(&self);

    /// Connect to the endpoint and start publishing.
    async fn start_stream(&self, url: &str) -> EngineResult<()>;

    /// Disconnect and stop publishing.
    async fn stop_stream(&self) -> EngineResult<()>;

    /// Rotate outgoing frames.
    fn set_target_rotation(&self, angle: RotationAngle);

    /// Whether the engine is currently publishing.
    fn streaming_signal(&self) -> watch::Receiver<bool>;

    /// Failures reported outside of any operation call.
    fn error_signal(&self) -> broadcast::Receiver<EngineError>;
}
