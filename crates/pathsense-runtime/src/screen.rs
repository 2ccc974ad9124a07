//! [`ArScreen`] – the AR navigation screen controller.
//!
//! The screen is the single owner of everything with a lifetime tied to the
//! view: the [`NavigationSession`], the camera lease, the feedback
//! dispatcher and a handle on the event bus.  It is synchronous; time only
//! enters through the frame timestamps passed to [`ArScreen::on_frame`], and
//! scans are handed out as [`ScanRequest`]s for someone else (normally the
//! [`ScreenDriver`][crate::driver::ScreenDriver]) to run.
//!
//! # Teardown
//!
//! [`ArScreen::exit`] aborts the session, releases the camera, silences
//! speech and invokes the `on_back` callback once.  Dropping the screen
//! without calling `exit` runs the same release path but does not call
//! `on_back`.

use std::time::Duration;

use pathsense_engine::feedback::{FeedbackDispatcher, FeedbackMode};
use pathsense_engine::overlay::{OverlayFrame, project};
use pathsense_engine::session::{NavigationSession, ScanTicket};
use pathsense_engine::turn::TurnEdge;
use pathsense_engine::velocity::VelocitySource;
use pathsense_hal::camera::{CameraDevice, CameraFacing, CameraFrame, CameraLease};
use pathsense_hal::feedback::{HapticOutput, SpeechOutput};
use pathsense_hal::sim::SimRig;
use pathsense_middleware::{EventBus, Topic};
use pathsense_types::{
    Event, EventPayload, NavState, NavTransition, OverlaySummary, SceneAnalysis,
};
use serde::Serialize;
use tracing::{debug, info, warn};

const EVENT_SOURCE: &str = "pathsense-runtime::screen";

/// Reason recorded when a scan produced nothing before its deadline.
pub const SCAN_DEADLINE_REASON: &str = "scan deadline elapsed";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Delays and bounds applied to one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Simulated sensing delay before classification starts.
    pub search_delay: Duration,
    /// Upper bound on the classifier call.
    pub classify_timeout: Duration,
    /// A scan still unresolved this long after submit fails.
    pub scan_deadline: Duration,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            search_delay: Duration::from_millis(1_500),
            classify_timeout: Duration::from_secs(5),
            scan_deadline: Duration::from_secs(10),
        }
    }
}

/// Options fixed when the screen is entered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenOptions {
    pub feedback_mode: FeedbackMode,
    pub timing: ScanTiming,
}

/// The devices a screen takes ownership of.
pub struct ScreenDevices {
    pub camera: Box<dyn CameraDevice>,
    pub speech: Box<dyn SpeechOutput>,
    pub haptics: Box<dyn HapticOutput>,
}

impl From<SimRig> for ScreenDevices {
    fn from(rig: SimRig) -> Self {
        Self {
            camera: rig.camera,
            speech: rig.speech,
            haptics: rig.haptics,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scan hand-off
// ─────────────────────────────────────────────────────────────────────────────

/// Work item produced by an accepted submit.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub ticket: ScanTicket,
    pub query: String,
    /// Still frame grabbed at submit time, if the camera is live.
    pub frame: Option<CameraFrame>,
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Located(SceneAnalysis),
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
struct PendingScan {
    ticket: ScanTicket,
    submitted_at: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a renderer shows for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub state: NavState,
    pub target: Option<String>,
    pub remaining_m: f32,
    pub velocity_mps: f32,
    pub turn_imminent: bool,
    pub is_moving: bool,
    /// Transient banner, e.g. `"Searching for CBM Lab 4."`.
    pub status: Option<String>,
    /// Persistent camera error.
    pub video_error: Option<String>,
    pub analysis: Option<SceneAnalysis>,
    /// Present only while navigating.
    pub overlay: Option<OverlayFrame>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ArScreen
// ─────────────────────────────────────────────────────────────────────────────

pub struct ArScreen {
    session: NavigationSession,
    velocity: Box<dyn VelocitySource>,
    feedback: FeedbackDispatcher,
    camera: CameraLease,
    bus: EventBus,
    timing: ScanTiming,
    status: Option<String>,
    video_error: Option<String>,
    pending: Option<PendingScan>,
    on_back: Option<Box<dyn FnOnce() + Send>>,
    exited: bool,
}

impl ArScreen {
    /// Enter the screen: take the devices and request the rear camera.
    ///
    /// A denied camera is not fatal; it sets [`video_error`][Self::video_error]
    /// and raises a [`Topic::SystemAlerts`] event.
    pub fn enter(
        devices: ScreenDevices,
        velocity: Box<dyn VelocitySource>,
        options: ScreenOptions,
        bus: EventBus,
    ) -> Self {
        let camera = CameraLease::acquire(devices.camera, CameraFacing::Environment);
        let session = NavigationSession::new();
        let feedback = FeedbackDispatcher::new(devices.speech, devices.haptics, options.feedback_mode)
            .with_segment_length(session.segment_length());
        let video_error = camera.error_message().map(str::to_string);

        let screen = Self {
            session,
            velocity,
            feedback,
            camera,
            bus,
            timing: options.timing,
            status: None,
            video_error,
            pending: None,
            on_back: None,
            exited: false,
        };

        if let Some(message) = &screen.video_error {
            warn!(message = %message, "camera unavailable; continuing without video");
            screen.publish(
                Topic::SystemAlerts,
                EventPayload::CameraFault {
                    message: message.clone(),
                },
            );
        }
        screen
    }

    /// Register the callback invoked by [`exit`][Self::exit].
    pub fn on_back(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_back = Some(Box::new(callback));
        self
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Commit `query` as the destination.
    ///
    /// Returns the scan to run, or `None` for blank input or after exit.
    pub fn submit_query(&mut self, query: &str, now: Duration) -> Option<ScanRequest> {
        if self.exited {
            return None;
        }
        let (ticket, transition) = self.session.submit_query(query)?;
        let target = self.session.target().unwrap_or_default().to_string();

        self.status = Some(format!("Searching for {target}."));
        self.pending = Some(PendingScan {
            ticket,
            submitted_at: now,
        });
        self.apply(transition);

        let frame = if self.camera.is_live() {
            self.camera
                .capture()
                .map_err(|e| debug!(error = %e, "frame capture failed; scanning without a frame"))
                .ok()
        } else {
            None
        };

        Some(ScanRequest {
            ticket,
            query: target,
            frame,
        })
    }

    /// Apply the result of the scan started for `ticket`.
    ///
    /// Results for superseded or aborted scans are dropped.
    pub fn complete_scan(&mut self, ticket: ScanTicket, outcome: ScanOutcome) -> Option<NavTransition> {
        let transition = match outcome {
            ScanOutcome::Located(analysis) => self.session.resolve_scan(ticket, analysis),
            ScanOutcome::Failed(reason) => self.session.fail_scan(ticket, &reason),
        }?;
        self.pending = None;
        self.status = None;
        self.apply(transition.clone());
        Some(transition)
    }

    /// Advance one display frame at timestamp `now`.
    pub fn on_frame(&mut self, now: Duration) -> FrameSnapshot {
        self.check_scan_deadline(now);

        let report = self.session.tick(now, self.velocity.as_mut());

        if let Some(edge) = report.turn_edge {
            self.feedback.on_turn_edge(edge);
            self.publish(
                Topic::Feedback,
                EventPayload::TurnCue {
                    imminent: edge == TurnEdge::Rising,
                },
            );
        }
        if report.wrapped {
            self.publish(
                Topic::Navigation,
                EventPayload::Transition(NavTransition::SegmentWrapped),
            );
        }

        let snapshot = self.snapshot();
        if self.bus.receiver_count(Topic::Overlay) > 0 {
            let summary = OverlaySummary {
                state: snapshot.state,
                remaining_m: snapshot.remaining_m,
                velocity_mps: snapshot.velocity_mps,
                progress_percent: snapshot
                    .overlay
                    .as_ref()
                    .map(|o| o.minimap.progress_percent)
                    .unwrap_or_default(),
                turn_imminent: snapshot.turn_imminent,
                is_moving: snapshot.is_moving,
            };
            self.publish(Topic::Overlay, EventPayload::Overlay(summary));
        }
        snapshot
    }

    pub fn pause(&mut self) -> Option<NavTransition> {
        let transition = self.session.pause()?;
        self.apply(transition.clone());
        Some(transition)
    }

    pub fn resume(&mut self) -> Option<NavTransition> {
        let transition = self.session.resume()?;
        self.apply(transition.clone());
        Some(transition)
    }

    pub fn toggle_moving(&mut self) -> Option<NavTransition> {
        let transition = self.session.toggle_moving()?;
        self.apply(transition.clone());
        Some(transition)
    }

    /// Stop navigating.  Idempotent.
    pub fn abort(&mut self) -> Option<NavTransition> {
        self.pending = None;
        self.status = None;
        let transition = self.session.abort()?;
        self.apply(transition.clone());
        Some(transition)
    }

    /// Leave the screen.  Only the first call has any effect.
    pub fn exit(&mut self) {
        if self.exited {
            return;
        }
        self.teardown();
        if let Some(callback) = self.on_back.take() {
            callback();
        }
        info!("left AR screen");
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn session(&self) -> &NavigationSession {
        &self.session
    }

    pub fn state(&self) -> NavState {
        self.session.state()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn video_error(&self) -> Option<&str> {
        self.video_error.as_deref()
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    pub fn feedback_mode(&self) -> FeedbackMode {
        self.feedback.mode()
    }

    /// Current state without advancing time.
    pub fn snapshot(&self) -> FrameSnapshot {
        let navigating = self.session.state() == NavState::Navigating;
        FrameSnapshot {
            state: self.session.state(),
            target: self.session.target().map(str::to_string),
            remaining_m: self.session.remaining_m(),
            velocity_mps: self.session.velocity_mps(),
            turn_imminent: self.session.turn_imminent(),
            is_moving: self.session.is_moving(),
            status: self.status.clone(),
            video_error: self.video_error.clone(),
            analysis: self.session.analysis().cloned(),
            overlay: navigating.then(|| {
                project(
                    self.session.remaining_m(),
                    self.session.turn_imminent(),
                    self.session.segment_length(),
                )
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn check_scan_deadline(&mut self, now: Duration) {
        let Some(pending) = self.pending else {
            return;
        };
        if now.saturating_sub(pending.submitted_at) < self.timing.scan_deadline {
            return;
        }
        warn!(
            deadline_ms = self.timing.scan_deadline.as_millis() as u64,
            "scan produced no result in time"
        );
        self.complete_scan(pending.ticket, ScanOutcome::Failed(SCAN_DEADLINE_REASON.to_string()));
        self.pending = None;
    }

    /// Route a transition to feedback and the bus.
    fn apply(&mut self, transition: NavTransition) {
        self.feedback.on_transition(&transition);
        if matches!(transition, NavTransition::ScanFailed { .. }) {
            self.publish(Topic::SystemAlerts, EventPayload::Transition(transition.clone()));
        }
        self.publish(Topic::Navigation, EventPayload::Transition(transition));
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if self.bus.receiver_count(topic) == 0 {
            return;
        }
        if let Err(e) = self.bus.publish_to(topic, Event::new(EVENT_SOURCE, payload)) {
            debug!(error = %e, ?topic, "dropping screen event");
        }
    }

    fn teardown(&mut self) {
        self.exited = true;
        self.abort();
        self.camera.release();
        self.feedback.silence();
    }
}

impl Drop for ArScreen {
    fn drop(&mut self) {
        if !self.exited {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pathsense_engine::velocity::ConstantVelocity;
    use pathsense_hal::sim::{SimTallies, SpeechRecord};
    use pathsense_hal::camera::CAMERA_DENIED_MESSAGE;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn screen_with(rig: SimRig, mode: FeedbackMode) -> (ArScreen, SimTallies, EventBus) {
        let tallies = rig.tallies.clone();
        let bus = EventBus::default();
        let screen = ArScreen::enter(
            rig.into(),
            Box::new(ConstantVelocity(1.4)),
            ScreenOptions {
                feedback_mode: mode,
                ..Default::default()
            },
            bus.clone(),
        );
        (screen, tallies, bus)
    }

    fn screen() -> (ArScreen, SimTallies, EventBus) {
        screen_with(SimRig::builder().build(), FeedbackMode::Minimal)
    }

    #[test]
    fn enter_acquires_rear_camera() {
        let (screen, tallies, _) = screen();
        assert_eq!(tallies.camera.acquisitions(), 1);
        assert!(screen.video_error().is_none());
        assert_eq!(screen.state(), NavState::Idle);
    }

    #[test]
    fn denied_camera_sets_error_and_keeps_screen_usable() {
        let rig = SimRig::builder().with_denied_camera("rear").build();
        let (mut screen, tallies, _) = screen_with(rig, FeedbackMode::Minimal);
        assert_eq!(screen.video_error(), Some(CAMERA_DENIED_MESSAGE));

        let request = screen.submit_query("CBM Lab 4", ms(0)).unwrap();
        assert!(request.frame.is_none());
        assert_eq!(screen.state(), NavState::Scanning);
        assert!(screen.abort().is_some());

        drop(screen);
        assert_eq!(tallies.camera.releases(), 1);
    }

    #[test]
    fn submit_captures_frame_and_sets_status() {
        let (mut screen, tallies, _) = screen();
        let request = screen.submit_query("  CBM Lab 4 ", ms(0)).unwrap();
        assert_eq!(request.query, "CBM Lab 4");
        assert!(request.frame.is_some());
        assert_eq!(tallies.camera.captures(), 1);
        assert_eq!(screen.status(), Some("Searching for CBM Lab 4."));
        assert_eq!(tallies.speech.utterances().len(), 1);
    }

    #[test]
    fn blank_submit_is_ignored() {
        let (mut screen, tallies, _) = screen();
        assert!(screen.submit_query("   ", ms(0)).is_none());
        assert_eq!(screen.state(), NavState::Idle);
        assert!(tallies.speech.records().is_empty());
    }

    #[test]
    fn completed_scan_starts_navigation_and_overlay() {
        let (mut screen, _, _) = screen();
        let request = screen.submit_query("CBM Lab 4", ms(0)).unwrap();
        assert!(screen.on_frame(ms(16)).overlay.is_none());

        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        assert!(screen.status().is_none());

        let snap = screen.on_frame(ms(32));
        assert_eq!(snap.state, NavState::Navigating);
        assert!(snap.is_moving);
        let overlay = snap.overlay.unwrap();
        assert_eq!(overlay.distance_readout, 30);
        let snap = screen.on_frame(ms(232));
        assert!(snap.remaining_m < 30.0);
    }

    #[test]
    fn stale_scan_result_is_discarded() {
        let (mut screen, _, _) = screen();
        let first = screen.submit_query("SSK Cafe", ms(0)).unwrap();
        let second = screen.submit_query("IT Building Lobby", ms(100)).unwrap();

        assert!(
            screen
                .complete_scan(first.ticket, ScanOutcome::Located(SceneAnalysis::canned()))
                .is_none()
        );
        assert_eq!(screen.state(), NavState::Scanning);
        screen.complete_scan(second.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        assert_eq!(screen.session().target(), Some("IT Building Lobby"));
    }

    #[test]
    fn scan_deadline_fails_back_to_idle() {
        let (mut screen, tallies, bus) = screen();
        let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
        screen.submit_query("Library", ms(0)).unwrap();

        screen.on_frame(ms(9_999));
        assert_eq!(screen.state(), NavState::Scanning);
        let snap = screen.on_frame(ms(10_000));
        assert_eq!(snap.state, NavState::Idle);
        assert!(snap.status.is_none());
        assert_eq!(
            tallies.speech.utterances().last().map(String::as_str),
            Some("Unable to determine your location. Please try again.")
        );

        let event = alerts.try_recv().ok();
        assert!(matches!(
            event.map(|e| e.payload),
            Some(EventPayload::Transition(NavTransition::ScanFailed { .. }))
        ));
    }

    #[test]
    fn abort_stops_integrator_and_cancels_speech() {
        let (mut screen, tallies, _) = screen();
        let request = screen.submit_query("CBM Lab 4", ms(0)).unwrap();
        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        screen.on_frame(ms(0));
        screen.on_frame(ms(200));

        assert_eq!(screen.abort(), Some(NavTransition::Aborted));
        assert_eq!(tallies.speech.records().last(), Some(&SpeechRecord::Cancelled));
        let snap = screen.on_frame(ms(400));
        assert_eq!(snap.state, NavState::Idle);
        assert_eq!(snap.remaining_m, 30.0);
        assert!(screen.abort().is_none());
    }

    #[test]
    fn rich_mode_pulses_once_on_turn() {
        let rig = SimRig::builder().build();
        let (mut screen, tallies, bus) = screen_with(rig, FeedbackMode::Rich);
        let mut cues = bus.subscribe_to(Topic::Feedback);
        let request = screen.submit_query("CBM Lab 4", ms(0)).unwrap();
        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));

        // 1.4 m/s for 16 s covers 22.4 m, crossing the 10 m mark once.
        for frame in 0..1_000u64 {
            screen.on_frame(ms(frame * 16));
        }
        assert_eq!(tallies.haptics.pulses(), vec![100, 200]);
        let cue = cues.try_recv().ok().map(|e| e.payload);
        assert!(matches!(cue, Some(EventPayload::TurnCue { imminent: true })));
    }

    #[test]
    fn exit_releases_once_and_calls_back_once() {
        let (screen, tallies, _) = screen();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut screen = screen.on_back(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        screen.exit();
        screen.exit();
        assert!(screen.is_exited());
        assert!(screen.submit_query("CBM Lab 4", ms(0)).is_none());
        drop(screen);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tallies.camera.releases(), 1);
        assert!(tallies.speech.cancellations() >= 1);
    }

    #[test]
    fn drop_without_exit_still_releases_camera() {
        let (screen, tallies, _) = screen();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let screen = screen.on_back(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(screen);
        assert_eq!(tallies.camera.releases(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    fn counted_back(screen: ArScreen) -> (ArScreen, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let screen = screen.on_back(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (screen, calls)
    }

    #[test]
    fn exit_mid_scan_releases_once() {
        let (screen, tallies, _) = screen();
        let (mut screen, calls) = counted_back(screen);
        let request = screen.submit_query("CBM Lab 4", ms(0)).unwrap();
        assert_eq!(screen.state(), NavState::Scanning);

        screen.exit();
        assert_eq!(screen.state(), NavState::Idle);
        assert!(
            screen
                .complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()))
                .is_none()
        );
        drop(screen);

        assert_eq!(tallies.camera.releases(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exit_mid_navigation_releases_once() {
        let (screen, tallies, _) = screen();
        let (mut screen, calls) = counted_back(screen);
        let request = screen.submit_query("SSK Cafe", ms(0)).unwrap();
        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        for frame in 0..10u64 {
            screen.on_frame(ms(frame * 16));
        }
        assert_eq!(screen.state(), NavState::Navigating);

        screen.exit();
        drop(screen);

        assert_eq!(tallies.camera.releases(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_mid_navigation_releases_once_without_callback() {
        let (screen, tallies, _) = screen();
        let (mut screen, calls) = counted_back(screen);
        let request = screen.submit_query("SSK Cafe", ms(0)).unwrap();
        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        screen.on_frame(ms(0));
        screen.on_frame(ms(16));

        drop(screen);
        assert_eq!(tallies.camera.releases(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_speech_engine_does_not_block_navigation() {
        let rig = SimRig::builder().with_unavailable_speech().build();
        let (mut screen, tallies, _) = screen_with(rig, FeedbackMode::Rich);
        let request = screen.submit_query("IT Building Lobby", ms(0)).unwrap();
        screen.complete_scan(request.ticket, ScanOutcome::Located(SceneAnalysis::canned()));
        screen.on_frame(ms(0));
        let snap = screen.on_frame(ms(200));

        assert_eq!(snap.state, NavState::Navigating);
        assert!(snap.remaining_m < 30.0);
        assert!(tallies.speech.utterances().is_empty());
        assert_eq!(tallies.haptics.pulses(), vec![100]);
    }

    #[test]
    fn overlay_summary_published_only_with_subscribers() {
        let (mut screen, _, bus) = screen();
        screen.on_frame(ms(0));
        let mut overlay = bus.subscribe_to(Topic::Overlay);
        screen.on_frame(ms(16));
        let event = overlay.try_recv().unwrap();
        assert!(matches!(event.payload, EventPayload::Overlay(s) if s.state == NavState::Idle));
    }
}
