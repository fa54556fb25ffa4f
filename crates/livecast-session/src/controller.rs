//! Session lifecycle controller.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use livecast_ipc::{
    error_channel, state_channel, ClassifiedError, ConnectionState, EngineError, RotationAngle,
    SessionConfig,
};
use livecast_permissions::PermissionOutcome;
use livecast_rotation::RotationSink;

use crate::engine::{AudioSourceFactory, EngineResult, PreviewSink, StreamingEngine};
use crate::error::SessionError;
use crate::SessionResult;

/// URL schemes the engine can publish to.
pub const SUPPORTED_SCHEMES: &[&str] = &["rtmp", "rtmps", "srt"];

const ENGINE_STOPPED: &str = "engine stopped streaming";

/// Why an in-flight connection attempt was cut short.
#[derive(Debug, Clone)]
enum AbortReason {
    UserStop,
    Engine(EngineError),
    EngineStopped,
}

struct Inner {
    state: ConnectionState,
    /// Id of the latest connection attempt.
    attempt: u64,
    /// Present while the latest attempt is unresolved.
    abort_tx: Option<watch::Sender<Option<AbortReason>>>,
    /// An error was emitted while the latest attempt was unresolved.
    attempt_reported: bool,
    /// Failure the latest attempt reported from its own engine call.
    reported_failure: Option<EngineError>,
    /// A `configure` call is waiting on the engine.
    configuring: bool,
    config: Option<SessionConfig>,
    audio_source: Option<AudioSourceFactory>,
    camera_id: Option<String>,
    preview: Option<Arc<dyn PreviewSink>>,
}

impl Inner {
    fn is_live(&self, attempt: u64) -> bool {
        self.attempt == attempt && self.abort_tx.is_some()
    }

    fn abort(&mut self, reason: AbortReason) {
        if let Some(abort_tx) = self.abort_tx.take() {
            debug!(attempt = self.attempt, ?reason, "Aborting connection attempt");
            let _ = abort_tx.send(Some(reason));
        }
    }
}

struct Shared {
    engine: Arc<dyn StreamingEngine>,
    endpoint: String,
    inner: Mutex<Inner>,
    state_tx: broadcast::Sender<ConnectionState>,
    error_tx: broadcast::Sender<ClassifiedError>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Move to a new state and notify observers. Must be called with the lock held.
    fn transition(&self, inner: &mut Inner, next: ConnectionState) {
        if inner.state == next {
            return;
        }

        let previous = std::mem::replace(&mut inner.state, next.clone());

        debug!(
            previous = %previous,
            current = %next,
            "State transition"
        );

        if self.state_tx.send(next).is_err() {
            trace!("No state subscribers");
        }
    }

    /// Publish a classified error. Must be called with the lock held.
    fn emit(&self, _inner: &mut Inner, error: ClassifiedError) {
        warn!(
            link_closed = error.is_link_closed,
            error = %error.error,
            "Session error"
        );

        if self.error_tx.send(error).is_err() {
            trace!("No error subscribers");
        }
    }

    fn on_engine_error(&self, error: EngineError) {
        let mut inner = self.inner.lock();

        if inner.state.is_idle() && inner.reported_failure.as_ref() == Some(&error) {
            inner.reported_failure = None;
            debug!(error = %error, "Failure already reported by its connection attempt");
            return;
        }

        if inner.state.is_connecting() {
            self.emit(&mut inner, ClassifiedError::connect_failed(error.clone()));
            inner.abort(AbortReason::Engine(error));
            self.transition(&mut inner, ConnectionState::Idle);
        } else {
            if inner.abort_tx.is_some() {
                inner.attempt_reported = true;
            }
            self.emit(&mut inner, ClassifiedError::classify(error));
        }
    }

    fn on_streaming_signal(&self, streaming: bool) {
        let mut inner = self.inner.lock();
        trace!(streaming, state = %inner.state, "Streaming signal");

        // The signal only rises once an attempt connects, and a rise moves a
        // connecting session to `Streaming`. A fall seen while connecting is
        // therefore left over from the previous stream.
        let next = match (streaming, &inner.state) {
            (true, ConnectionState::Idle | ConnectionState::Connecting { .. }) => {
                Some(ConnectionState::Streaming)
            }
            (false, ConnectionState::Streaming) => Some(ConnectionState::Idle),
            (false, ConnectionState::Connecting { .. }) => {
                debug!("Ignoring stale streaming=false while connecting");
                None
            }
            _ => None,
        };

        if let Some(next) = next {
            if next.is_idle() && inner.abort_tx.is_some() {
                if !inner.attempt_reported {
                    let error = EngineError::Other(ENGINE_STOPPED.to_string());
                    self.emit(&mut inner, ClassifiedError::connect_failed(error));
                }
                inner.abort(AbortReason::EngineStopped);
            }
            self.transition(&mut inner, next);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Holds the session in `configure` until the engine call returns or is dropped.
struct ConfigureReservation<'a> {
    shared: &'a Shared,
}

impl Drop for ConfigureReservation<'_> {
    fn drop(&mut self) {
        self.shared.inner.lock().configuring = false;
    }
}

/// Reverts an unresolved attempt to `Idle` if its future is dropped.
struct ConnectingGuard {
    shared: Arc<Shared>,
    attempt: u64,
}

impl Drop for ConnectingGuard {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if !inner.is_live(self.attempt) {
            return;
        }

        warn!(attempt = self.attempt, "Connection attempt dropped");
        inner.abort_tx = None;
        self.shared.transition(&mut inner, ConnectionState::Idle);
        drop(inner);

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let engine = Arc::clone(&self.shared.engine);
            runtime.spawn(async move {
                if let Err(e) = engine.stop_stream().await {
                    debug!(error = %e, "Engine stop after dropped attempt failed");
                }
            });
        }
    }
}

/// Owns the connection state of a live session and sequences the engine.
///
/// The controller is the only writer of [`ConnectionState`]. Observers read
/// snapshots through [`state`](Self::state) or follow transitions through
/// [`subscribe_state`](Self::subscribe_state), and drive it with
/// [`toggle`](Self::toggle).
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// Create an idle controller publishing to `endpoint` when toggled on.
    pub fn new(engine: Arc<dyn StreamingEngine>, endpoint: impl Into<String>) -> Self {
        let (state_tx, _) = state_channel();
        let (error_tx, _) = error_channel();

        Self {
            shared: Arc::new(Shared {
                engine,
                endpoint: endpoint.into(),
                inner: Mutex::new(Inner {
                    state: ConnectionState::Idle,
                    attempt: 0,
                    abort_tx: None,
                    attempt_reported: false,
                    reported_failure: None,
                    configuring: false,
                    config: None,
                    audio_source: None,
                    camera_id: None,
                    preview: None,
                }),
                state_tx,
                error_tx,
                listener: Mutex::new(None),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state.clone()
    }

    /// Follow connection state transitions.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Follow classified errors.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ClassifiedError> {
        self.shared.error_tx.subscribe()
    }

    /// The endpoint used by [`toggle`](Self::toggle).
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// The last configuration accepted by the engine.
    pub fn config(&self) -> Option<SessionConfig> {
        self.shared.inner.lock().config.clone()
    }

    /// Start following the engine's streaming and error signals.
    ///
    /// Must be called within a tokio runtime. No-op if already active.
    pub fn activate(&self) {
        let mut listener = self.shared.listener.lock();
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Signal listener already active");
            return;
        }

        let streaming = self.shared.engine.streaming_signal();
        let errors = self.shared.engine.error_signal();
        let shared = Arc::downgrade(&self.shared);

        *listener = Some(tokio::spawn(listen(shared, streaming, errors)));
        info!("Session controller activated");
    }

    /// Stop following the engine's signals.
    pub fn deactivate(&self) {
        if let Some(listener) = self.shared.listener.lock().take() {
            listener.abort();
            info!("Session controller deactivated");
        }
    }

    /// Whether the signal listener is running.
    pub fn is_active(&self) -> bool {
        self.shared
            .listener
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Apply a new audio/video configuration. Only allowed while idle.
    ///
    /// Connection attempts are rejected with [`SessionError::Busy`] until the
    /// engine has applied it.
    #[instrument(skip(self, config))]
    pub async fn configure(&self, config: SessionConfig) -> SessionResult<()> {
        let _reservation = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_idle() {
                return Err(SessionError::conflict("configure", &inner.state));
            }
            if inner.configuring {
                return Err(SessionError::busy("configure", "configure"));
            }
            inner.configuring = true;
            ConfigureReservation {
                shared: self.shared.as_ref(),
            }
        };

        self.shared.engine.configure(&config).await?;

        info!(
            width = config.video.width,
            height = config.video.height,
            fps = config.video.fps,
            sample_rate = config.audio.sample_rate,
            "Session configured"
        );
        self.shared.inner.lock().config = Some(config);
        Ok(())
    }

    /// Acquire the audio capture source, releasing the previous one first.
    #[instrument(skip(self, factory), fields(factory = %factory))]
    pub async fn bind_audio_source(&self, factory: AudioSourceFactory) -> SessionResult<()> {
        self.ensure_not_connecting("bind_audio_source")?;

        let previous = self.shared.inner.lock().audio_source.take();
        if let Some(previous) = previous {
            debug!(%previous, "Releasing audio source");
            self.shared.engine.release_audio_source().await;
        }

        self.shared
            .engine
            .set_audio_source(&factory)
            .await
            .map_err(|e| SessionError::SourceUnavailable(e.to_string()))?;

        debug!("Audio source bound");
        self.shared.inner.lock().audio_source = Some(factory);
        Ok(())
    }

    /// Acquire the camera as video source, releasing the previous one first.
    #[instrument(skip(self))]
    pub async fn bind_video_source(&self, camera_id: &str) -> SessionResult<()> {
        self.ensure_not_connecting("bind_video_source")?;

        let previous = self.shared.inner.lock().camera_id.take();
        if let Some(previous) = previous {
            debug!(%previous, "Releasing video source");
            self.shared.engine.release_video_source().await;
        }

        self.shared
            .engine
            .set_camera_id(camera_id)
            .await
            .map_err(|e| SessionError::SourceUnavailable(e.to_string()))?;

        debug!("Video source bound");
        self.shared.inner.lock().camera_id = Some(camera_id.to_string());
        Ok(())
    }

    /// Bind both capture sources once permissions are resolved.
    ///
    /// An unresolved rationale counts as a denial of its pending permissions.
    pub async fn bind_capture_sources(
        &self,
        outcome: &PermissionOutcome,
        audio: AudioSourceFactory,
        camera_id: &str,
    ) -> SessionResult<()> {
        match outcome {
            PermissionOutcome::AllGranted => {}
            PermissionOutcome::NeedsRationale { pending, .. } => {
                return Err(SessionError::PermissionDenied {
                    permissions: pending.clone(),
                });
            }
            PermissionOutcome::Denied { denied } => {
                return Err(SessionError::PermissionDenied {
                    permissions: denied.clone(),
                });
            }
        }

        self.bind_audio_source(audio).await?;
        self.bind_video_source(camera_id).await
    }

    /// Render the video source into `sink`, detaching any previous sink.
    #[instrument(skip(self, sink), fields(sink = sink.name()))]
    pub fn bind_preview(&self, sink: Arc<dyn PreviewSink>) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();

        if inner.camera_id.is_none() {
            return Err(SessionError::SourceUnavailable(
                "no video source bound".to_string(),
            ));
        }

        if let Some(previous) = inner.preview.take() {
            debug!(previous = previous.name(), "Detaching preview");
            self.shared.engine.stop_preview();
        }

        self.shared.engine.start_preview(Arc::clone(&sink))?;
        inner.preview = Some(sink);
        Ok(())
    }

    /// Detach the preview sink, if any.
    pub fn unbind_preview(&self) {
        if let Some(previous) = self.shared.inner.lock().preview.take() {
            debug!(sink = previous.name(), "Detaching preview");
            self.shared.engine.stop_preview();
        }
    }

    /// Connect to `url` and start publishing.
    ///
    /// Resolves once the engine reports it is streaming, the attempt fails,
    /// or [`stop_stream`](Self::stop_stream) cancels it. A failure is
    /// published once on the error stream before the state returns to
    /// `Idle`; it is never retried.
    #[instrument(skip(self))]
    pub async fn start_stream(&self, url: &str) -> SessionResult<()> {
        validate_endpoint(url)?;

        let (attempt, mut abort_rx) = {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_idle() {
                return Err(SessionError::conflict("start_stream", &inner.state));
            }
            if inner.configuring {
                return Err(SessionError::busy("start_stream", "configure"));
            }

            inner.attempt += 1;
            inner.attempt_reported = false;
            inner.reported_failure = None;
            let (abort_tx, abort_rx) = watch::channel(None);
            inner.abort_tx = Some(abort_tx);
            self.shared.transition(
                &mut inner,
                ConnectionState::Connecting {
                    url: url.to_string(),
                },
            );
            (inner.attempt, abort_rx)
        };

        let _guard = ConnectingGuard {
            shared: Arc::clone(&self.shared),
            attempt,
        };

        info!(attempt, "Connecting");

        let engine = Arc::clone(&self.shared.engine);
        let completed = tokio::select! {
            biased;
            _ = aborted(&mut abort_rx) => None,
            result = connect(engine.as_ref(), url) => Some(result),
        };

        let mut inner = self.shared.inner.lock();
        match completed {
            Some(Ok(())) if inner.is_live(attempt) => {
                inner.abort_tx = None;
                if inner.state.is_connecting() {
                    self.shared.transition(&mut inner, ConnectionState::Streaming);
                }
                info!(attempt, "Stream started");
                Ok(())
            }
            Some(Err(e)) if inner.is_live(attempt) => {
                inner.abort_tx = None;
                let message = e.message().to_string();
                inner.reported_failure = Some(e.clone());
                self.shared.emit(&mut inner, ClassifiedError::connect_failed(e));
                if inner.state.is_connecting() {
                    self.shared.transition(&mut inner, ConnectionState::Idle);
                }
                Err(SessionError::ConnectFailed(message))
            }
            _ => {
                let reason = abort_rx.borrow().clone();
                resolve_abort(attempt, reason)
            }
        }
    }

    /// Disconnect. No-op while idle; cancels an in-flight attempt.
    ///
    /// Engine disconnect errors are logged and the session always ends idle.
    #[instrument(skip(self))]
    pub async fn stop_stream(&self) {
        let previous = {
            let mut inner = self.shared.inner.lock();
            inner.abort(AbortReason::UserStop);

            if inner.state.is_idle() {
                debug!("Already idle, ignoring stop");
                return;
            }
            let previous = inner.state.clone();
            if previous.is_connecting() {
                self.shared.transition(&mut inner, ConnectionState::Idle);
            }
            previous
        };

        info!(from = %previous, "Stopping stream");

        if let Err(e) = self.shared.engine.stop_stream().await {
            warn!(error = %e, "Engine stop failed");
        }

        let mut inner = self.shared.inner.lock();
        if inner.state.is_streaming() {
            self.shared.transition(&mut inner, ConnectionState::Idle);
        }
    }

    /// UI entry point for the live toggle.
    pub async fn toggle(&self, desired_on: bool) -> SessionResult<()> {
        debug!(desired_on, "Toggle");
        if desired_on {
            self.start_stream(&self.shared.endpoint).await
        } else {
            self.stop_stream().await;
            Ok(())
        }
    }

    /// Rotate outgoing frames.
    pub fn set_target_rotation(&self, angle: RotationAngle) {
        debug!(%angle, "Target rotation");
        self.shared.engine.set_target_rotation(angle);
    }

    /// Tear the session down: stop streaming, detach the preview, release
    /// both capture sources and stop the signal listener.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        self.stop_stream().await;
        self.unbind_preview();

        let (audio, video) = {
            let mut inner = self.shared.inner.lock();
            (inner.audio_source.take(), inner.camera_id.take())
        };
        if audio.is_some() {
            self.shared.engine.release_audio_source().await;
        }
        if video.is_some() {
            self.shared.engine.release_video_source().await;
        }

        self.deactivate();
        info!("Session released");
    }

    fn ensure_not_connecting(&self, operation: &'static str) -> SessionResult<()> {
        let inner = self.shared.inner.lock();
        if inner.state.is_connecting() {
            Err(SessionError::conflict(operation, &inner.state))
        } else {
            Ok(())
        }
    }
}

impl RotationSink for SessionController {
    fn set_target_rotation(&self, angle: RotationAngle) {
        SessionController::set_target_rotation(self, angle);
    }
}

/// Check that `endpoint` is a URL the engine can publish to.
pub fn validate_endpoint(endpoint: &str) -> SessionResult<()> {
    let url = Url::parse(endpoint)
        .map_err(|e| SessionError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(SessionError::InvalidEndpoint(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(SessionError::InvalidEndpoint(format!(
            "{endpoint}: missing host"
        )));
    }

    Ok(())
}

/// Connect and wait until the engine reports streaming.
async fn connect(engine: &dyn StreamingEngine, url: &str) -> EngineResult<()> {
    let mut signal = engine.streaming_signal();

    engine.start_stream(url).await?;

    if signal.wait_for(|streaming| *streaming).await.is_err() {
        return Err(EngineError::Other(
            "engine closed its streaming signal".to_string(),
        ));
    }
    Ok(())
}

/// Resolves when the attempt is aborted.
async fn aborted(abort_rx: &mut watch::Receiver<Option<AbortReason>>) {
    loop {
        if abort_rx.borrow_and_update().is_some() {
            return;
        }
        if abort_rx.changed().await.is_err() {
            // Resolved elsewhere without an abort; the engine result decides.
            std::future::pending::<()>().await;
        }
    }
}

fn resolve_abort(attempt: u64, reason: Option<AbortReason>) -> SessionResult<()> {
    match reason {
        Some(AbortReason::UserStop) | None => {
            debug!(attempt, "Connection attempt cancelled");
            Ok(())
        }
        Some(AbortReason::Engine(e)) => Err(SessionError::ConnectFailed(e.message().to_string())),
        Some(AbortReason::EngineStopped) => {
            Err(SessionError::ConnectFailed(ENGINE_STOPPED.to_string()))
        }
    }
}

async fn listen(
    shared: Weak<Shared>,
    mut streaming: watch::Receiver<bool>,
    mut errors: broadcast::Receiver<EngineError>,
) {
    debug!("Signal listener starting");

    let initial = *streaming.borrow_and_update();
    if initial {
        match shared.upgrade() {
            Some(shared) => shared.on_streaming_signal(true),
            None => return,
        }
    }

    loop {
        tokio::select! {
            biased;
            error = errors.recv() => match error {
                Ok(error) => {
                    let Some(shared) = shared.upgrade() else { break };
                    shared.on_engine_error(error);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Engine error signal lagged");
                }
                Err(RecvError::Closed) => {
                    debug!("Engine error signal closed");
                    break;
                }
            },
            changed = streaming.changed() => {
                if changed.is_err() {
                    debug!("Engine streaming signal closed");
                    break;
                }
                let on = *streaming.borrow_and_update();
                let Some(shared) = shared.upgrade() else { break };
                shared.on_streaming_signal(on);
            }
        }
    }

    debug!("Signal listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint_accepts_stream_schemes() {
        assert!(validate_endpoint("rtmp://my.server.url:1935/app/streamKey").is_ok());
        assert!(validate_endpoint("rtmps://live.example.com/app/key").is_ok());
        assert!(validate_endpoint("srt://10.0.0.2:9998").is_ok());
    }

    #[test]
    fn test_validate_endpoint_rejects_bad_urls() {
        assert!(matches!(
            validate_endpoint("not a url"),
            Err(SessionError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            validate_endpoint("https://example.com/live"),
            Err(SessionError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            validate_endpoint("rtmp:app/key"),
            Err(SessionError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_abort_reasons() {
        assert_eq!(resolve_abort(1, Some(AbortReason::UserStop)), Ok(()));
        assert_eq!(
            resolve_abort(1, Some(AbortReason::Engine(EngineError::Capture("gone".into())))),
            Err(SessionError::ConnectFailed("gone".into()))
        );
        assert!(matches!(
            resolve_abort(1, Some(AbortReason::EngineStopped)),
            Err(SessionError::ConnectFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_aborted_resolves_on_reason() {
        let (tx, mut rx) = watch::channel(None);
        tx.send(Some(AbortReason::UserStop)).unwrap();
        aborted(&mut rx).await;
    }
}
