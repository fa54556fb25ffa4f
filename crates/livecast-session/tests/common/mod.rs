#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use livecast_ipc::{ConnectionState, EngineError, RotationAngle, SessionConfig};
use livecast_session::{
    AudioSourceFactory, EngineResult, PreviewSink, SessionController, StreamingEngine,
};

pub const URL: &str = "rtmp://my.server.url:1935/app/streamKey";

/// What the next `start_stream` call does.
#[derive(Debug, Clone)]
pub enum Connect {
    /// Raise the streaming signal and return Ok.
    Succeed,
    /// Return the error without touching the signal.
    Fail(EngineError),
    /// Never resolve.
    Hang,
    /// Wait, then succeed.
    Delay(Duration),
    /// Raise the streaming signal but never resolve.
    RaiseThenHang,
    /// Publish the error on the error signal as well as returning it.
    FailAndReport(EngineError),
}

/// An engine whose outcomes are scripted by the test.
pub struct ScriptedEngine {
    streaming_tx: watch::Sender<bool>,
    error_tx: broadcast::Sender<EngineError>,
    connects: Mutex<VecDeque<Connect>>,
    audio_failure: Mutex<Option<EngineError>>,
    configure_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
    rotation: Mutex<Option<RotationAngle>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        let (streaming_tx, _) = watch::channel(false);
        let (error_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            streaming_tx,
            error_tx,
            connects: Mutex::new(VecDeque::new()),
            audio_failure: Mutex::new(None),
            configure_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            rotation: Mutex::new(None),
        })
    }

    pub fn script(&self, step: Connect) {
        self.connects.lock().push_back(step);
    }

    pub fn fail_audio(&self, error: EngineError) {
        *self.audio_failure.lock() = Some(error);
    }

    pub fn delay_configure(&self, delay: Duration) {
        *self.configure_delay.lock() = Some(delay);
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.streaming_tx.send_replace(streaming);
    }

    pub fn report_error(&self, error: EngineError) {
        let _ = self.error_tx.send(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn rotation(&self) -> Option<RotationAngle> {
        *self.rotation.lock()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl StreamingEngine for ScriptedEngine {
    async fn configure(&self, _config: &SessionConfig) -> EngineResult<()> {
        self.record("configure");
        let delay = self.configure_delay.lock().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn set_audio_source(&self, _factory: &AudioSourceFactory) -> EngineResult<()> {
        self.record("set_audio_source");
        match self.audio_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn release_audio_source(&self) {
        self.record("release_audio_source");
    }

    async fn set_camera_id(&self, _camera_id: &str) -> EngineResult<()> {
        self.record("set_camera_id");
        Ok(())
    }

    async fn release_video_source(&self) {
        self.record("release_video_source");
    }

    fn start_preview(&self, _sink: Arc<dyn PreviewSink>) -> EngineResult<()> {
        self.record("start_preview");
        Ok(())
    }

    fn stop_preview(&self) {
        self.record("stop_preview");
    }

    async fn start_stream(&self, _url: &str) -> EngineResult<()> {
        self.record("start_stream");
        let step = self.connects.lock().pop_front().unwrap_or(Connect::Succeed);
        match step {
            Connect::Succeed => {
                self.streaming_tx.send_replace(true);
                Ok(())
            }
            Connect::Fail(error) => Err(error),
            Connect::Hang => std::future::pending().await,
            Connect::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.streaming_tx.send_replace(true);
                Ok(())
            }
            Connect::RaiseThenHang => {
                self.streaming_tx.send_replace(true);
                std::future::pending().await
            }
            Connect::FailAndReport(error) => {
                let _ = self.error_tx.send(error.clone());
                Err(error)
            }
        }
    }

    async fn stop_stream(&self) -> EngineResult<()> {
        self.record("stop_stream");
        self.streaming_tx.send_replace(false);
        Ok(())
    }

    fn set_target_rotation(&self, angle: RotationAngle) {
        *self.rotation.lock() = Some(angle);
    }

    fn streaming_signal(&self) -> watch::Receiver<bool> {
        self.streaming_tx.subscribe()
    }

    fn error_signal(&self) -> broadcast::Receiver<EngineError> {
        self.error_tx.subscribe()
    }
}

pub struct NamedPreview(pub &'static str);

impl PreviewSink for NamedPreview {
    fn name(&self) -> &str {
        self.0
    }
}

pub fn controller(engine: &Arc<ScriptedEngine>) -> Arc<SessionController> {
    Arc::new(SessionController::new(engine.clone(), URL))
}

/// Everything currently queued on a broadcast receiver.
pub fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

/// Wait until the controller reaches a state matching `predicate`.
pub async fn wait_for_state(
    controller: &SessionController,
    predicate: impl Fn(&ConnectionState) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !predicate(&controller.state()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state not reached in time");
}

/// Wait until the engine has seen `call` at least `times` times.
pub async fn wait_for_calls(engine: &ScriptedEngine, call: &str, times: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while engine.count(call) < times {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("engine call not seen in time");
}

pub fn connecting() -> ConnectionState {
    ConnectionState::Connecting {
        url: URL.to_string(),
    }
}
