//! Exclusive camera resource manager.
//!
//! Exactly one manager exists per process (constructed by the
//! composition root and shared via `Arc`); it owns the only handle to
//! the physical camera and serializes start/stop/read/is-active across
//! concurrent callers behind a single lock.
//!
//! The lifecycle is explicit: `Idle -> Active -> Releasing -> Idle`.
//! Transitions are published on a watch channel so a `start` racing a
//! still-settling release can wait for `Idle` instead of sleeping
//! blindly.

use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{CameraError, CaptureDevice, DeviceFactory, VideoFrame};

/// Highest device index probed when opening the camera.
const PROBE_INDEX_MAX: u32 = 4;

/// Bound on how long `start` waits for an in-flight release.
const RELEASE_WAIT: Duration = Duration::from_secs(5);

/// Delay between opening a device and the confirmatory first read.
const OPEN_SETTLE: Duration = Duration::from_millis(100);

/// Delay after dropping a device before reporting `Idle`, letting the
/// OS reclaim the handle before a future `start` reopens it. A
/// throttle, not a correctness guarantee.
const RELEASE_SETTLE: Duration = Duration::from_millis(500);

/// Camera lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Active,
    Releasing,
}

struct Inner {
    lifecycle: Lifecycle,
    device: Option<Box<dyn CaptureDevice>>,
}

/// Serializes all access to the single physical camera.
pub struct CameraManager {
    inner: Mutex<Inner>,
    factory: Box<dyn DeviceFactory>,
    lifecycle_tx: watch::Sender<Lifecycle>,
}

impl CameraManager {
    pub fn new(factory: Box<dyn DeviceFactory>) -> Self {
        let (lifecycle_tx, _) = watch::channel(Lifecycle::Idle);
        Self {
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Idle,
                device: None,
            }),
            factory,
            lifecycle_tx,
        }
    }

    /// Acquire the camera and begin streaming.
    ///
    /// Idempotent while active. Probes device indices `0..=4` in order
    /// and confirms the first open device with a real frame read before
    /// reporting success.
    pub async fn start(&self) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().await;

        match inner.lifecycle {
            Lifecycle::Active => {
                debug!("Camera already active, start is a no-op");
                return Ok(());
            }
            Lifecycle::Releasing => {
                // Wait for the release to finish settling; proceed with a
                // warning if it never does so start cannot deadlock.
                drop(inner);
                self.wait_for_idle().await;
                inner = self.inner.lock().await;
                if inner.lifecycle == Lifecycle::Active {
                    return Ok(());
                }
            }
            Lifecycle::Idle => {}
        }

        let mut device = self.probe_devices()?;
        tokio::time::sleep(OPEN_SETTLE).await;

        match device.read_frame() {
            Ok(_) => {
                info!(
                    index = device.index(),
                    "Initial frame read successful, camera active"
                );
                inner.device = Some(device);
                self.set_lifecycle(&mut inner, Lifecycle::Active);
                Ok(())
            }
            Err(e) => {
                error!("Camera opened but failed to read initial frame: {e}");
                drop(device);
                self.set_lifecycle(&mut inner, Lifecycle::Releasing);
                drop(inner);
                self.finish_release().await;
                Err(CameraError::InitialReadFailed)
            }
        }
    }

    /// Stop streaming and release the camera.
    ///
    /// Returns [`CameraError::NotActive`] if the camera is not
    /// streaming; no state changes in that case.
    pub async fn stop(&self) -> Result<(), CameraError> {
        let mut inner = self.inner.lock().await;
        if inner.lifecycle != Lifecycle::Active {
            debug!("Stop requested but camera is not active");
            return Err(CameraError::NotActive);
        }

        // Leave Active first so concurrent readers observe termination
        // promptly; dropping the handle releases the device.
        self.set_lifecycle(&mut inner, Lifecycle::Releasing);
        inner.device = None;
        drop(inner);

        self.finish_release().await;
        info!("Camera stopped and released");
        Ok(())
    }

    /// Read one frame if the camera is active.
    ///
    /// A device-level read failure stops the camera internally and
    /// returns `None`; stream consumers treat that as end-of-stream.
    pub async fn read_frame(&self) -> Option<VideoFrame> {
        let mut inner = self.inner.lock().await;
        if inner.lifecycle != Lifecycle::Active {
            return None;
        }
        let device = inner.device.as_mut()?;

        match device.read_frame() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Frame read failed, stopping camera: {e}");
                self.set_lifecycle(&mut inner, Lifecycle::Releasing);
                inner.device = None;
                drop(inner);
                self.finish_release().await;
                None
            }
        }
    }

    /// Whether the camera is streaming and the device reports open.
    ///
    /// Shares the manager lock with frame reads, so an in-flight
    /// blocking read delays this call by up to one frame.
    pub async fn is_active(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.lifecycle == Lifecycle::Active
            && inner.device.as_ref().is_some_and(|d| d.is_open())
    }

    /// Current lifecycle state without touching the device lock.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle_tx.borrow()
    }

    fn set_lifecycle(&self, inner: &mut Inner, lifecycle: Lifecycle) {
        inner.lifecycle = lifecycle;
        self.lifecycle_tx.send_replace(lifecycle);
    }

    fn probe_devices(&self) -> Result<Box<dyn CaptureDevice>, CameraError> {
        for index in 0..=PROBE_INDEX_MAX {
            match self.factory.open(index) {
                Ok(device) => {
                    info!(index, "Opened capture device");
                    return Ok(device);
                }
                Err(e) => debug!(index, "Capture device unavailable: {e}"),
            }
        }
        error!("No capture device found across indices 0..={PROBE_INDEX_MAX}");
        Err(CameraError::Unavailable(PROBE_INDEX_MAX))
    }

    async fn wait_for_idle(&self) {
        let mut rx = self.lifecycle_tx.subscribe();
        let settled = rx.wait_for(|l| *l != Lifecycle::Releasing);
        if tokio::time::timeout(RELEASE_WAIT, settled).await.is_err() {
            warn!(
                "Previous camera release did not complete within {:?}, proceeding anyway",
                RELEASE_WAIT
            );
        }
    }

    async fn finish_release(&self) {
        tokio::time::sleep(RELEASE_SETTLE).await;
        let mut inner = self.inner.lock().await;
        // A start that proceeded past the release-wait timeout may have
        // already re-acquired; only Releasing settles back to Idle.
        if inner.lifecycle == Lifecycle::Releasing {
            self.set_lifecycle(&mut inner, Lifecycle::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Scripted device: consumes a queue of read outcomes, then keeps
    /// succeeding.
    struct ScriptedDevice {
        index: u32,
        reads: Arc<StdMutex<VecDeque<bool>>>,
        sequence: u32,
    }

    impl CaptureDevice for ScriptedDevice {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            let ok = self.reads.lock().unwrap().pop_front().unwrap_or(true);
            if !ok {
                return Err(CameraError::ReadFailed("scripted failure".to_string()));
            }
            self.sequence += 1;
            Ok(VideoFrame::new(vec![0; 4 * 4 * 3], 4, 4, 0, self.sequence))
        }

        fn is_open(&self) -> bool {
            true
        }

        fn index(&self) -> u32 {
            self.index
        }
    }

    struct ScriptedFactory {
        openable: Vec<u32>,
        reads: Arc<StdMutex<VecDeque<bool>>>,
        open_count: AtomicU32,
    }

    impl ScriptedFactory {
        fn new(openable: Vec<u32>, reads: Vec<bool>) -> Self {
            Self {
                openable,
                reads: Arc::new(StdMutex::new(reads.into())),
                open_count: AtomicU32::new(0),
            }
        }
    }

    impl DeviceFactory for Arc<ScriptedFactory> {
        fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>, CameraError> {
            if !self.openable.contains(&index) {
                return Err(CameraError::Open {
                    index,
                    reason: "not present".to_string(),
                });
            }
            self.open_count.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedDevice {
                index,
                reads: Arc::clone(&self.reads),
                sequence: 0,
            }))
        }
    }

    fn manager(factory: &Arc<ScriptedFactory>) -> CameraManager {
        CameraManager::new(Box::new(Arc::clone(factory)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_probes_indices_in_order() {
        let factory = Arc::new(ScriptedFactory::new(vec![2], vec![]));
        let mgr = manager(&factory);

        mgr.start().await.unwrap();
        assert!(mgr.is_active().await);
        assert_eq!(factory.open_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_no_device() {
        let factory = Arc::new(ScriptedFactory::new(vec![], vec![]));
        let mgr = manager(&factory);

        assert!(matches!(mgr.start().await, Err(CameraError::Unavailable(4))));
        assert!(!mgr.is_active().await);
        assert_eq!(mgr.lifecycle(), Lifecycle::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_while_active() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
        let mgr = manager(&factory);

        mgr.start().await.unwrap();
        mgr.start().await.unwrap();
        // Second start must not reopen the device.
        assert_eq!(factory.open_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_on_initial_read_failure() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![false]));
        let mgr = manager(&factory);

        assert!(matches!(
            mgr.start().await,
            Err(CameraError::InitialReadFailed)
        ));
        assert!(!mgr.is_active().await);
        assert_eq!(mgr.lifecycle(), Lifecycle::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_inactive_is_rejected() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
        let mgr = manager(&factory);

        assert!(matches!(mgr.stop().await, Err(CameraError::NotActive)));
        assert_eq!(mgr.lifecycle(), Lifecycle::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_restart_cycle() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
        let mgr = manager(&factory);

        mgr.start().await.unwrap();
        mgr.stop().await.unwrap();
        assert!(!mgr.is_active().await);

        mgr.start().await.unwrap();
        assert!(mgr.is_active().await);
        assert_eq!(factory.open_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_stops_camera() {
        // First read confirms start, second succeeds, third fails.
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![true, true, false]));
        let mgr = manager(&factory);

        mgr.start().await.unwrap();
        assert!(mgr.read_frame().await.is_some());
        assert!(mgr.read_frame().await.is_none());
        assert!(!mgr.is_active().await);
        // Camera already stopped itself.
        assert!(matches!(mgr.stop().await, Err(CameraError::NotActive)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_frame_when_idle_returns_none() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
        let mgr = manager(&factory);
        assert!(mgr.read_frame().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_out_in_flight_release() {
        let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
        let mgr = Arc::new(manager(&factory));
        mgr.start().await.unwrap();

        let stopper = Arc::clone(&mgr);
        let handle = tokio::spawn(async move { stopper.stop().await });

        // Let the stop task reach its settle delay.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(mgr.lifecycle(), Lifecycle::Releasing);

        // Start observes Releasing and waits for Idle before reopening.
        mgr.start().await.unwrap();
        assert!(mgr.is_active().await);
        handle.await.unwrap().unwrap();
        assert_eq!(factory.open_count.load(Ordering::SeqCst), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// is_active is true iff the last successful start has no
            /// subsequent successful stop.
            #[test]
            fn prop_active_tracks_start_stop_history(ops in proptest::collection::vec(any::<bool>(), 0..16)) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();

                rt.block_on(async {
                    let factory = Arc::new(ScriptedFactory::new(vec![0], vec![]));
                    let mgr = manager(&factory);
                    let mut expect_active = false;

                    for is_start in ops {
                        if is_start {
                            prop_assert!(mgr.start().await.is_ok());
                            expect_active = true;
                        } else {
                            let res = mgr.stop().await;
                            prop_assert_eq!(res.is_ok(), expect_active);
                            expect_active = false;
                        }
                        prop_assert_eq!(mgr.is_active().await, expect_active);
                    }
                    Ok(())
                })?;
            }
        }
    }
}
