//! [`ScreenDriver`] – runs an [`ArScreen`] on a Tokio task.
//!
//! One loop task owns the screen and multiplexes three inputs:
//!
//! 1. **Frames** from a [`FrameScheduler`] (a Tokio interval, 16 ms by
//!    default).  Each frame calls [`ArScreen::on_frame`] and publishes the
//!    resulting [`FrameSnapshot`] on a `watch` channel.
//! 2. **Commands** from any number of [`ScreenHandle`]s.
//! 3. **Scan results** from scan tasks.  Every accepted submit spawns one
//!    task (search delay, then a bounded classification) and aborts the task
//!    of the submit it superseded.  Late results that still slip through are
//!    rejected by the screen's ticket check.
//!
//! All screen mutation happens on the loop task, so the screen itself needs
//! no locking.
//!
//! # Example
//!
//! ```rust,no_run
//! use pathsense_engine::velocity::JitteredWalk;
//! use pathsense_hal::sim::SimRig;
//! use pathsense_middleware::EventBus;
//! use pathsense_runtime::classifier::MockClassifier;
//! use pathsense_runtime::driver::{ScreenCommand, ScreenDriver};
//! use pathsense_runtime::screen::{ArScreen, ScreenOptions};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let screen = ArScreen::enter(
//!     SimRig::builder().build().into(),
//!     Box::new(JitteredWalk::from_entropy()),
//!     ScreenOptions::default(),
//!     EventBus::default(),
//! );
//! let (driver, handle) = ScreenDriver::new(screen, Arc::new(MockClassifier::default()));
//! let task = tokio::spawn(driver.run());
//! handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await;
//! handle.send(ScreenCommand::Back).await;
//! task.await.ok();
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use pathsense_engine::session::ScanTicket;

use crate::classifier::{SceneClassifier, classify_with_fallback};
use crate::screen::{ArScreen, FrameSnapshot, ScanOutcome, ScanRequest, ScanTiming};

/// Default display refresh period (~60 Hz).
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

const COMMAND_BUFFER: usize = 32;
const RESULT_BUFFER: usize = 8;

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Shared stop flag.  Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Produces monotonic frame timestamps relative to its creation.
pub struct FrameScheduler {
    interval: Interval,
    origin: Instant,
    cancel: CancelToken,
}

impl FrameScheduler {
    pub fn new(period: Duration, cancel: CancelToken) -> Self {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            origin: Instant::now(),
            cancel,
        }
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once cancelled; the flag is checked before and after
    /// waiting so a cancelled scheduler never yields another frame.
    pub async fn next_frame(&mut self) -> Option<Duration> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let at = self.interval.tick().await;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(at.saturating_duration_since(self.origin))
    }

    /// Time since the scheduler started.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands and handle
// ─────────────────────────────────────────────────────────────────────────────

/// User-level commands accepted by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCommand {
    Submit(String),
    Pause,
    Resume,
    ToggleMoving,
    Abort,
    /// Leave the screen; the driver stops afterwards.
    Back,
}

/// Cheap clonable control surface for a running [`ScreenDriver`].
#[derive(Clone)]
pub struct ScreenHandle {
    commands: mpsc::Sender<ScreenCommand>,
    snapshots: watch::Receiver<FrameSnapshot>,
    cancel: CancelToken,
}

impl ScreenHandle {
    /// Queue `command`.  Returns `false` once the driver has stopped.
    pub async fn send(&self, command: ScreenCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Queue `command` from outside the runtime (e.g. a blocking REPL).
    pub fn blocking_send(&self, command: ScreenCommand) -> bool {
        self.commands.blocking_send(command).is_ok()
    }

    /// Latest frame published by the driver.
    pub fn snapshot(&self) -> FrameSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the driver at its next frame without waiting for a command slot.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

struct ScanResult {
    ticket: ScanTicket,
    outcome: ScanOutcome,
}

/// Owns an [`ArScreen`] and drives it until `Back` or cancellation.
pub struct ScreenDriver {
    screen: ArScreen,
    classifier: Arc<dyn SceneClassifier>,
    timing: ScanTiming,
    frame_period: Duration,
    commands: mpsc::Receiver<ScreenCommand>,
    results_tx: mpsc::Sender<ScanResult>,
    results_rx: mpsc::Receiver<ScanResult>,
    snapshots: watch::Sender<FrameSnapshot>,
    cancel: CancelToken,
    scan_task: Option<(ScanTicket, JoinHandle<()>)>,
}

impl ScreenDriver {
    pub fn new(screen: ArScreen, classifier: Arc<dyn SceneClassifier>) -> (Self, ScreenHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (results_tx, results_rx) = mpsc::channel(RESULT_BUFFER);
        let (snapshots, snapshots_rx) = watch::channel(screen.snapshot());
        let cancel = CancelToken::new();
        let timing = screen.timing();

        let driver = Self {
            screen,
            classifier,
            timing,
            frame_period: DEFAULT_FRAME_PERIOD,
            commands,
            results_tx,
            results_rx,
            snapshots,
            cancel: cancel.clone(),
            scan_task: None,
        };
        let handle = ScreenHandle {
            commands: commands_tx,
            snapshots: snapshots_rx,
            cancel,
        };
        (driver, handle)
    }

    pub fn with_frame_period(mut self, period: Duration) -> Self {
        self.frame_period = period;
        self
    }

    /// Run until [`ScreenCommand::Back`], cancellation, or every handle is
    /// dropped.  The screen is exited on the way out.
    pub async fn run(mut self) {
        let mut frames = FrameScheduler::new(self.frame_period, self.cancel.clone());
        info!(frame_ms = self.frame_period.as_millis() as u64, "screen driver started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(ScreenCommand::Back) | None => break,
                    Some(command) => self.handle_command(command, frames.elapsed()),
                },

                Some(result) = self.results_rx.recv() => self.apply_result(result),

                frame = frames.next_frame() => match frame {
                    Some(now) => {
                        self.reap_dead_scan();
                        let snapshot = self.screen.on_frame(now);
                        self.snapshots.send_replace(snapshot);
                    }
                    None => break,
                },
            }
        }

        self.abort_scan();
        self.screen.exit();
        self.snapshots.send_replace(self.screen.snapshot());
        info!("screen driver stopped");
    }

    fn handle_command(&mut self, command: ScreenCommand, now: Duration) {
        debug!(?command, "screen command");
        match command {
            ScreenCommand::Submit(query) => {
                if let Some(request) = self.screen.submit_query(&query, now) {
                    self.spawn_scan(request);
                }
            }
            ScreenCommand::Pause => {
                self.screen.pause();
            }
            ScreenCommand::Resume => {
                self.screen.resume();
            }
            ScreenCommand::ToggleMoving => {
                self.screen.toggle_moving();
            }
            ScreenCommand::Abort => {
                self.abort_scan();
                self.screen.abort();
            }
            ScreenCommand::Back => {}
        }
        self.snapshots.send_replace(self.screen.snapshot());
    }

    /// Hand a finished scan to the screen.  A stale result leaves the handle
    /// of the current scan in place so it can still be aborted.
    fn apply_result(&mut self, result: ScanResult) {
        if self.scan_task.as_ref().is_some_and(|(ticket, _)| *ticket == result.ticket) {
            self.scan_task = None;
        }
        self.screen.complete_scan(result.ticket, result.outcome);
    }

    fn spawn_scan(&mut self, request: ScanRequest) {
        self.abort_scan();

        let classifier = Arc::clone(&self.classifier);
        let results = self.results_tx.clone();
        let timing = self.timing;
        let ScanRequest { ticket, query, frame } = request;

        let task = tokio::spawn(async move {
            tokio::time::sleep(timing.search_delay).await;
            let analysis =
                classify_with_fallback(classifier.as_ref(), frame.as_ref(), timing.classify_timeout).await;
            debug!(query = %query, location = %analysis.location_context, "scan finished");
            let _ = results
                .send(ScanResult {
                    ticket,
                    outcome: ScanOutcome::Located(analysis),
                })
                .await;
        });
        self.scan_task = Some((ticket, task));
    }

    fn abort_scan(&mut self) {
        if let Some((ticket, task)) = self.scan_task.take() {
            task.abort();
            debug!(?ticket, "aborted in-flight scan task");
        }
    }

    /// Forget a scan task that ended without reporting (e.g. it panicked).
    /// The screen's scan deadline then fails the scan.
    fn reap_dead_scan(&mut self) {
        if self.scan_task.as_ref().is_some_and(|(_, task)| task.is_finished()) && self.results_rx.is_empty() {
            warn!("scan task ended without a result");
            self.scan_task = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pathsense_engine::velocity::ConstantVelocity;
    use pathsense_hal::camera::CameraFrame;
    use pathsense_hal::sim::{SimTallies, SimRig};
    use pathsense_middleware::{EventBus, Topic};
    use pathsense_types::{EventPayload, NavError, NavState, NavTransition, SceneAnalysis};

    use crate::classifier::MockClassifier;
    use crate::screen::ScreenOptions;

    struct PanickingClassifier;

    #[async_trait]
    impl SceneClassifier for PanickingClassifier {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn classify(&self, _frame: Option<&CameraFrame>) -> Result<SceneAnalysis, NavError> {
            panic!("classifier crashed");
        }
    }

    fn start(classifier: Arc<dyn SceneClassifier>) -> (ScreenHandle, SimTallies, EventBus, JoinHandle<()>) {
        let rig = SimRig::builder().build();
        let tallies = rig.tallies.clone();
        let bus = EventBus::default();
        let screen = ArScreen::enter(
            rig.into(),
            Box::new(ConstantVelocity(1.4)),
            ScreenOptions::default(),
            bus.clone(),
        );
        let (driver, handle) = ScreenDriver::new(screen, classifier);
        let task = tokio::spawn(driver.run());
        (handle, tallies, bus, task)
    }

    fn mock() -> Arc<dyn SceneClassifier> {
        Arc::new(MockClassifier::new(Duration::from_millis(500)))
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scheduler_yields_no_frames() {
        let cancel = CancelToken::new();
        let mut frames = FrameScheduler::new(Duration::from_millis(16), cancel.clone());
        assert!(frames.next_frame().await.is_some());
        cancel.cancel();
        assert!(frames.next_frame().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_timestamps_advance_by_period() {
        let mut frames = FrameScheduler::new(Duration::from_millis(16), CancelToken::new());
        let first = frames.next_frame().await.unwrap();
        let second = frames.next_frame().await.unwrap();
        assert_eq!(second - first, Duration::from_millis(16));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_reaches_navigating_after_scan() {
        let (handle, tallies, _bus, task) = start(mock());
        assert!(handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.snapshot().state, NavState::Scanning);

        // 1.5 s search delay + 0.5 s mock latency.
        tokio::time::sleep(Duration::from_millis(2_200)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, NavState::Navigating);
        assert_eq!(snap.target.as_deref(), Some("CBM Lab 4"));
        assert!(snap.remaining_m < 30.0);
        assert_eq!(
            snap.analysis.map(|a| a.location_context),
            Some("IOBM Main Corridor - Block B".to_string())
        );

        handle.send(ScreenCommand::Back).await;
        task.await.unwrap();
        assert_eq!(tallies.camera.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resubmit_supersedes_pending_scan() {
        let (handle, _tallies, _bus, task) = start(mock());
        handle.send(ScreenCommand::Submit("SSK Cafe".into())).await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        handle.send(ScreenCommand::Submit("IT Building Lobby".into())).await;

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, NavState::Navigating);
        assert_eq!(snap.target.as_deref(), Some("IT Building Lobby"));

        handle.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn abort_during_scan_stays_idle() {
        let (handle, _tallies, _bus, task) = start(mock());
        handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.send(ScreenCommand::Abort).await;

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, NavState::Idle);
        assert!(snap.target.is_none());
        assert_eq!(snap.remaining_m, 30.0);

        handle.send(ScreenCommand::Back).await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_distance() {
        let (handle, _tallies, _bus, task) = start(mock());
        handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await;
        tokio::time::sleep(Duration::from_millis(3_000)).await;

        handle.send(ScreenCommand::Pause).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let frozen = handle.snapshot();
        assert!(!frozen.is_moving);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(handle.snapshot().remaining_m, frozen.remaining_m);
        assert_eq!(handle.snapshot().velocity_mps, 0.0);

        handle.send(ScreenCommand::ToggleMoving).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.snapshot().remaining_m < frozen.remaining_m);

        handle.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn dead_scan_task_fails_at_deadline() {
        let (handle, tallies, bus, task) = start(Arc::new(PanickingClassifier));
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        handle.send(ScreenCommand::Submit("Library".into())).await;

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(handle.snapshot().state, NavState::Idle);
        let event = alerts.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::Transition(NavTransition::ScanFailed { .. })
        ));
        assert!(
            tallies
                .speech
                .utterances()
                .contains(&"Unable to determine your location. Please try again.".to_string())
        );

        handle.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_result_keeps_current_scan_abortable() {
        let rig = SimRig::builder().build();
        let screen = ArScreen::enter(
            rig.into(),
            Box::new(ConstantVelocity(1.4)),
            ScreenOptions::default(),
            EventBus::default(),
        );
        let (mut driver, _handle) = ScreenDriver::new(screen, mock());

        driver.handle_command(ScreenCommand::Submit("SSK Cafe".into()), Duration::ZERO);
        let first = driver.scan_task.as_ref().map(|(ticket, _)| *ticket).unwrap();
        driver.handle_command(
            ScreenCommand::Submit("IT Building Lobby".into()),
            Duration::from_millis(100),
        );
        let second = driver.scan_task.as_ref().map(|(ticket, _)| *ticket).unwrap();
        assert_ne!(first, second);

        driver.apply_result(ScanResult {
            ticket: first,
            outcome: ScanOutcome::Located(SceneAnalysis::canned()),
        });
        assert_eq!(driver.screen.state(), NavState::Scanning);
        let current = driver.scan_task.as_ref().map(|(ticket, task)| (*ticket, task.abort_handle()));
        let (ticket, abort) = current.unwrap();
        assert_eq!(ticket, second);

        driver.handle_command(ScreenCommand::Abort, Duration::from_millis(200));
        assert!(driver.scan_task.is_none());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(abort.is_finished());
        assert_eq!(driver.screen.state(), NavState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_scan_releases_camera_once() {
        let (handle, tallies, _bus, task) = start(mock());
        handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().state, NavState::Scanning);

        handle.cancel();
        task.await.unwrap();
        assert_eq!(tallies.camera.releases(), 1);
        assert_eq!(handle.snapshot().state, NavState::Idle);
        assert!(!handle.send(ScreenCommand::Pause).await);
    }

    #[tokio::test(start_paused = true)]
    async fn back_mid_navigation_releases_camera_once() {
        let (handle, tallies, _bus, task) = start(mock());
        handle.send(ScreenCommand::Submit("CBM Lab 4".into())).await;
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(handle.snapshot().state, NavState::Navigating);

        handle.send(ScreenCommand::Back).await;
        task.await.unwrap();
        assert_eq!(tallies.camera.releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_driver() {
        let (handle, tallies, _bus, task) = start(mock());
        drop(handle);
        task.await.unwrap();
        assert_eq!(tallies.camera.releases(), 1);
    }
}
