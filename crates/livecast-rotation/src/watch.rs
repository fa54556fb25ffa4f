//! Rotation watch thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};

use livecast_ipc::RotationAngle;

use crate::{RotationResult, RotationSensor, RotationSink};

/// How often the watch thread checks its stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Forwards device rotation to a sink while started.
///
/// Only the latest rotation matters: events queued behind a slow sink are
/// coalesced, and a rotation equal to the last forwarded one is dropped.
pub struct RotationWatch {
    sensor: Arc<dyn RotationSensor>,
    sink: Arc<dyn RotationSink>,
    last: Arc<Mutex<Option<RotationAngle>>>,
    should_stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RotationWatch {
    /// Create a stopped watch.
    pub fn new(sensor: Arc<dyn RotationSensor>, sink: Arc<dyn RotationSink>) -> Self {
        Self {
            sensor,
            sink,
            last: Arc::new(Mutex::new(None)),
            should_stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Subscribe to the sensor and start forwarding. No-op if already running.
    ///
    /// A watch whose thread ended because the sensor went away is reaped and
    /// started again.
    #[instrument(name = "rotation_watch_start", skip(self))]
    pub fn start(&mut self) -> RotationResult<()> {
        if self.is_running() {
            debug!("Rotation watch already running");
            return Ok(());
        }

        if let Some(finished) = self.thread.take() {
            debug!("Reaping finished rotation thread");
            self.sensor.unsubscribe();
            let _ = finished.join();
        }

        let events = self.sensor.subscribe()?;

        self.should_stop.store(false, Ordering::SeqCst);
        *self.last.lock() = None;

        let sink = Arc::clone(&self.sink);
        let last = Arc::clone(&self.last);
        let should_stop = Arc::clone(&self.should_stop);

        let spawned = thread::Builder::new()
            .name("livecast-rotation".to_string())
            .spawn(move || watch_loop(events, sink, last, should_stop));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                info!("Rotation watch started");
                Ok(())
            }
            Err(e) => {
                self.sensor.unsubscribe();
                Err(e.into())
            }
        }
    }

    /// Stop forwarding and release the sensor. No-op if not running.
    #[instrument(name = "rotation_watch_stop", skip(self))]
    pub fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        self.should_stop.store(true, Ordering::SeqCst);
        self.sensor.unsubscribe();
        let _ = handle.join();

        info!("Rotation watch stopped");
    }

    /// Whether the watch thread is alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// The last rotation forwarded to the sink.
    pub fn current(&self) -> Option<RotationAngle> {
        *self.last.lock()
    }
}

impl Drop for RotationWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_loop(
    events: Receiver<RotationAngle>,
    sink: Arc<dyn RotationSink>,
    last: Arc<Mutex<Option<RotationAngle>>>,
    should_stop: Arc<AtomicBool>,
) {
    debug!("Rotation loop starting");

    while !should_stop.load(Ordering::SeqCst) {
        match events.recv_timeout(POLL_INTERVAL) {
            Ok(mut angle) => {
                let mut coalesced = 0u32;
                while let Ok(newer) = events.try_recv() {
                    angle = newer;
                    coalesced += 1;
                }
                if coalesced > 0 {
                    trace!(coalesced, "Coalesced rotation events");
                }

                {
                    let mut last = last.lock();
                    if *last == Some(angle) {
                        continue;
                    }
                    *last = Some(angle);
                }

                debug!(%angle, "Rotation changed");
                sink.set_target_rotation(angle);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Rotation sensor channel disconnected");
                break;
            }
        }
    }

    debug!("Rotation loop stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crossbeam_channel::Sender;

    use super::*;
    use crate::{rotation_channel, RotationError};

    #[derive(Default)]
    struct FakeSensor {
        sender: Mutex<Option<Sender<RotationAngle>>>,
        queued: Mutex<Vec<RotationAngle>>,
        subscriptions: Mutex<u32>,
        unavailable: AtomicBool,
    }

    impl FakeSensor {
        fn rotate(&self, angle: RotationAngle) {
            if let Some(sender) = self.sender.lock().as_ref() {
                sender.send(angle).unwrap();
            }
        }

        /// Drop the feed without being asked to, like a sensor service dying.
        fn disconnect(&self) {
            self.sender.lock().take();
        }
    }

    impl RotationSensor for FakeSensor {
        fn subscribe(&self) -> RotationResult<Receiver<RotationAngle>> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RotationError::SensorUnavailable("no display".to_string()));
            }
            let (tx, rx) = rotation_channel();
            for angle in self.queued.lock().drain(..) {
                tx.send(angle).unwrap();
            }
            *self.sender.lock() = Some(tx);
            *self.subscriptions.lock() += 1;
            Ok(rx)
        }

        fn unsubscribe(&self) {
            self.sender.lock().take();
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        angles: Mutex<Vec<RotationAngle>>,
    }

    impl RotationSink for RecordingSink {
        fn set_target_rotation(&self, angle: RotationAngle) {
            self.angles.lock().push(angle);
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_forwards_rotation_changes() {
        let sensor = Arc::new(FakeSensor::default());
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor.clone(), sink.clone());

        watch.start().unwrap();
        sensor.rotate(RotationAngle::Deg90);
        wait_for(|| sink.angles.lock().len() == 1);
        sensor.rotate(RotationAngle::Deg180);
        wait_for(|| sink.angles.lock().len() == 2);

        assert_eq!(
            *sink.angles.lock(),
            vec![RotationAngle::Deg90, RotationAngle::Deg180]
        );
        assert_eq!(watch.current(), Some(RotationAngle::Deg180));
    }

    #[test]
    fn test_queued_events_coalesce_to_latest() {
        let sensor = Arc::new(FakeSensor::default());
        sensor.queued.lock().extend([
            RotationAngle::Deg0,
            RotationAngle::Deg90,
            RotationAngle::Deg270,
        ]);
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor.clone(), sink.clone());

        watch.start().unwrap();
        wait_for(|| watch.current().is_some());

        assert_eq!(*sink.angles.lock(), vec![RotationAngle::Deg270]);
    }

    #[test]
    fn test_repeated_rotation_is_dropped() {
        let sensor = Arc::new(FakeSensor::default());
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor.clone(), sink.clone());

        watch.start().unwrap();
        sensor.rotate(RotationAngle::Deg90);
        wait_for(|| sink.angles.lock().len() == 1);
        sensor.rotate(RotationAngle::Deg90);
        sensor.rotate(RotationAngle::Deg0);
        wait_for(|| watch.current() == Some(RotationAngle::Deg0));

        assert_eq!(
            *sink.angles.lock(),
            vec![RotationAngle::Deg90, RotationAngle::Deg0]
        );
    }

    #[test]
    fn test_restart_resubscribes() {
        let sensor = Arc::new(FakeSensor::default());
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor.clone(), sink.clone());

        watch.start().unwrap();
        watch.start().unwrap();
        assert_eq!(*sensor.subscriptions.lock(), 1);

        watch.stop();
        assert!(!watch.is_running());
        assert!(sensor.sender.lock().is_none());

        sensor.queued.lock().push(RotationAngle::Deg90);
        watch.start().unwrap();
        wait_for(|| watch.current() == Some(RotationAngle::Deg90));
        assert_eq!(*sensor.subscriptions.lock(), 2);
    }

    #[test]
    fn test_disconnected_sensor_can_be_restarted() {
        let sensor = Arc::new(FakeSensor::default());
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor.clone(), sink.clone());

        watch.start().unwrap();
        assert!(watch.is_running());

        sensor.disconnect();
        wait_for(|| !watch.is_running());

        sensor.queued.lock().push(RotationAngle::Deg180);
        watch.start().unwrap();
        assert_eq!(*sensor.subscriptions.lock(), 2);
        wait_for(|| watch.current() == Some(RotationAngle::Deg180));
        assert_eq!(*sink.angles.lock(), vec![RotationAngle::Deg180]);

        watch.stop();
        assert!(!watch.is_running());
    }

    #[test]
    fn test_sensor_failure_leaves_watch_stopped() {
        let sensor = Arc::new(FakeSensor::default());
        sensor.unavailable.store(true, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink::default());
        let mut watch = RotationWatch::new(sensor, sink);

        assert!(matches!(
            watch.start(),
            Err(RotationError::SensorUnavailable(_))
        ));
        assert!(!watch.is_running());
    }
}
