//! In-process stand-ins for the engine, permission subsystem and rotation
//! sensor, so the client runs without capture hardware.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use livecast_ipc::{EngineError, RotationAngle, SessionConfig};
use livecast_permissions::{Permission, PermissionPlatform, PermissionSet};
use livecast_rotation::{rotation_channel, RotationResult, RotationSensor};
use livecast_session::{AudioSourceFactory, EngineResult, PreviewSink, StreamingEngine};

/// Simulated connection handshake time.
const CONNECT_DELAY: Duration = Duration::from_millis(800);

/// Endpoints whose host contains this marker refuse connections.
const REFUSING_HOST_MARKER: &str = "refuse";

/// Pretends to capture, encode and publish.
pub struct SimulatedEngine {
    streaming_tx: watch::Sender<bool>,
    error_tx: broadcast::Sender<EngineError>,
    config: Mutex<Option<SessionConfig>>,
    camera_id: Mutex<Option<String>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        let (streaming_tx, _) = watch::channel(false);
        let (error_tx, _) = broadcast::channel(16);
        Self {
            streaming_tx,
            error_tx,
            config: Mutex::new(None),
            camera_id: Mutex::new(None),
        }
    }

    /// Simulate the remote end dropping an established stream.
    pub fn drop_link(&self) {
        if !*self.streaming_tx.borrow() {
            debug!("Not streaming, nothing to drop");
            return;
        }
        warn!("Simulating remote close");
        let _ = self
            .error_tx
            .send(EngineError::Closed("remote closed".to_string()));
        self.streaming_tx.send_replace(false);
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingEngine for SimulatedEngine {
    async fn configure(&self, config: &SessionConfig) -> EngineResult<()> {
        if config.video.fps == 0 {
            return Err(EngineError::Config("fps must be positive".to_string()));
        }
        *self.config.lock() = Some(config.clone());
        Ok(())
    }

    async fn set_audio_source(&self, factory: &AudioSourceFactory) -> EngineResult<()> {
        info!(%factory, "Audio source opened");
        Ok(())
    }

    async fn release_audio_source(&self) {
        info!("Audio source released");
    }

    async fn set_camera_id(&self, camera_id: &str) -> EngineResult<()> {
        *self.camera_id.lock() = Some(camera_id.to_string());
        info!(camera_id, "Camera opened");
        Ok(())
    }

    async fn release_video_source(&self) {
        self.camera_id.lock().take();
        info!("Camera released");
    }

    fn start_preview(&self, sink: Arc<dyn PreviewSink>) -> EngineResult<()> {
        if self.camera_id.lock().is_none() {
            return Err(EngineError::Capture("camera not open".to_string()));
        }
        info!(sink = sink.name(), "Preview started");
        Ok(())
    }

    fn stop_preview(&self) {
        info!("Preview stopped");
    }

    async fn start_stream(&self, url: &str) -> EngineResult<()> {
        tokio::time::sleep(CONNECT_DELAY).await;

        if url.contains(REFUSING_HOST_MARKER) {
            return Err(EngineError::Connect(format!("{url} refused the connection")));
        }

        self.streaming_tx.send_replace(true);
        Ok(())
    }

    async fn stop_stream(&self) -> EngineResult<()> {
        self.streaming_tx.send_replace(false);
        Ok(())
    }

    fn set_target_rotation(&self, angle: RotationAngle) {
        debug!(%angle, "Encoder rotation");
    }

    fn streaming_signal(&self) -> watch::Receiver<bool> {
        self.streaming_tx.subscribe()
    }

    fn error_signal(&self) -> broadcast::Receiver<EngineError> {
        self.error_tx.subscribe()
    }
}

/// Grants every permission the first time it is asked.
#[derive(Default)]
pub struct SimulatedPermissions {
    granted: Mutex<HashSet<Permission>>,
}

impl SimulatedPermissions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionPlatform for SimulatedPermissions {
    fn check_granted(&self, permission: &Permission) -> bool {
        self.granted.lock().contains(permission)
    }

    fn should_show_rationale(&self, _permission: &Permission) -> bool {
        false
    }

    async fn request(&self, permissions: &PermissionSet) -> HashMap<Permission, bool> {
        let mut granted = self.granted.lock();
        permissions
            .iter()
            .map(|permission| {
                info!(%permission, "Permission granted");
                granted.insert(permission.clone());
                (permission.clone(), true)
            })
            .collect()
    }
}

/// Rotation sensor driven by console commands.
#[derive(Default)]
pub struct SimulatedRotationSensor {
    current: Mutex<RotationAngle>,
    subscriber: Mutex<Option<Sender<RotationAngle>>>,
}

impl SimulatedRotationSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the simulated device.
    pub fn rotate(&self, angle: RotationAngle) {
        *self.current.lock() = angle;
        if let Some(subscriber) = self.subscriber.lock().as_ref() {
            if subscriber.try_send(angle).is_err() {
                warn!(%angle, "Rotation event dropped");
            }
        }
    }
}

impl RotationSensor for SimulatedRotationSensor {
    fn subscribe(&self) -> RotationResult<Receiver<RotationAngle>> {
        let (tx, rx) = rotation_channel();
        let _ = tx.try_send(*self.current.lock());
        *self.subscriber.lock() = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.subscriber.lock().take();
    }
}

/// Preview surface that only logs.
pub struct ConsolePreview;

impl PreviewSink for ConsolePreview {
    fn name(&self) -> &str {
        "console"
    }
}
