//! [`NavigationSession`] – the navigation state machine.
//!
//! ```text
//!            submit_query            resolve_scan
//!   Idle ─────────────────▶ Scanning ─────────────▶ Navigating
//!    ▲                         │                        │
//!    │        fail_scan        │                        │
//!    ├─────────────────────────┘                        │
//!    │                    abort                         │
//!    └──────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation goes through a named command.  Commands that change the
//! lifecycle return the [`NavTransition`] they caused so the caller can hand
//! it to the feedback dispatcher and the event bus.
//!
//! # Superseded scans
//!
//! Each accepted [`submit_query`][NavigationSession::submit_query] (and each
//! [`abort`][NavigationSession::abort]) bumps a generation counter.  Scan
//! results carry the [`ScanTicket`] they were issued for, and a ticket from an
//! older generation is discarded.  The most recent submit therefore always
//! wins, whatever order the scans finish in.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pathsense_engine::session::NavigationSession;
//! use pathsense_engine::velocity::ConstantVelocity;
//! use pathsense_types::{NavState, SceneAnalysis};
//!
//! let mut session = NavigationSession::new();
//! let (ticket, _) = session.submit_query("CBM Lab 4").expect("non-blank query");
//! session.resolve_scan(ticket, SceneAnalysis::canned());
//! assert_eq!(session.state(), NavState::Navigating);
//!
//! let mut walk = ConstantVelocity(1.4);
//! session.tick(Duration::ZERO, &mut walk);
//! let report = session.tick(Duration::from_millis(100), &mut walk);
//! assert!(report.remaining_m < 30.0);
//! ```

use std::time::Duration;

use pathsense_types::{NavState, NavTransition, SceneAnalysis};
use tracing::{debug, info};

use crate::kinematics::Kinematics;
use crate::turn::{TurnEdge, TurnEdgeDetector, is_turn_imminent};
use crate::velocity::VelocitySource;

/// Handle tying a scan result to the submit that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanTicket {
    generation: u64,
}

/// Numbers produced by one [`NavigationSession::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub state: NavState,
    pub remaining_m: f32,
    /// Speed sampled this tick; `0` when the integrator did not run.
    pub velocity_mps: f32,
    pub turn_imminent: bool,
    /// Set on the tick where `turn_imminent` changed.
    pub turn_edge: Option<TurnEdge>,
    /// Set on the tick where the segment ran out and restarted.
    pub wrapped: bool,
    pub is_moving: bool,
}

/// The live navigation attempt owned by one AR screen.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    state: NavState,
    target: Option<String>,
    remaining: f32,
    is_moving: bool,
    velocity: f32,
    last_tick: Option<Duration>,
    generation: u64,
    analysis: Option<SceneAnalysis>,
    kinematics: Kinematics,
    turn_edges: TurnEdgeDetector,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationSession {
    /// A fresh idle session on the default 30 m segment.
    pub fn new() -> Self {
        Self::with_kinematics(Kinematics::default())
    }

    /// A fresh idle session driven by a custom integrator.
    pub fn with_kinematics(kinematics: Kinematics) -> Self {
        Self {
            state: NavState::Idle,
            target: None,
            remaining: kinematics.segment_length(),
            is_moving: false,
            velocity: 0.0,
            last_tick: None,
            generation: 0,
            analysis: None,
            kinematics,
            turn_edges: TurnEdgeDetector::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Commit a destination and start scanning.
    ///
    /// Blank or whitespace-only input is ignored and returns `None`.  A submit
    /// while already scanning or navigating replaces the previous attempt; its
    /// ticket becomes stale.
    pub fn submit_query(&mut self, query: &str) -> Option<(ScanTicket, NavTransition)> {
        let target = query.trim();
        if target.is_empty() {
            return None;
        }
        if self.state != NavState::Idle {
            info!(
                previous = self.target.as_deref().unwrap_or_default(),
                next = query.trim(),
                "superseding active navigation session"
            );
        }

        self.reset_motion();
        self.generation += 1;
        self.state = NavState::Scanning;
        self.target = Some(target.to_string());
        info!(destination = target, generation = self.generation, "scan started");

        Some((
            self.current_ticket(),
            NavTransition::ScanStarted {
                target: target.to_string(),
            },
        ))
    }

    /// Attach a location result and start navigating.
    ///
    /// Returns `None` (and changes nothing) when `ticket` was superseded or
    /// the session is no longer scanning.
    pub fn resolve_scan(
        &mut self,
        ticket: ScanTicket,
        analysis: SceneAnalysis,
    ) -> Option<NavTransition> {
        if !self.accepts(ticket) {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale scan result"
            );
            return None;
        }
        let analysis = analysis.clamp_confidence();
        let target = self.target.clone().unwrap_or_default();

        self.state = NavState::Navigating;
        self.remaining = self.kinematics.segment_length();
        self.is_moving = true;
        self.analysis = Some(analysis.clone());
        info!(
            destination = %target,
            location = %analysis.location_context,
            confidence = analysis.confidence,
            "navigation started"
        );

        Some(NavTransition::ScanResolved { target, analysis })
    }

    /// Give up on the scan for `ticket` and return to idle.
    ///
    /// Stale tickets are ignored the same way as in
    /// [`resolve_scan`][Self::resolve_scan].
    pub fn fail_scan(&mut self, ticket: ScanTicket, reason: &str) -> Option<NavTransition> {
        if !self.accepts(ticket) {
            debug!(ticket = ticket.generation, "ignoring failure of stale scan");
            return None;
        }
        let target = self.target.take().unwrap_or_default();
        self.state = NavState::Idle;
        self.reset_motion();
        info!(destination = %target, reason, "scan failed");

        Some(NavTransition::ScanFailed {
            target,
            reason: reason.to_string(),
        })
    }

    /// Advance the session to frame timestamp `now`.
    ///
    /// The integrator only runs while navigating and moving.  The tick
    /// timestamp is refreshed on every call regardless, so resuming after a
    /// pause never integrates the paused interval.
    pub fn tick(&mut self, now: Duration, velocity: &mut dyn VelocitySource) -> TickReport {
        let dt = self
            .last_tick
            .map(|last| now.saturating_sub(last))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let mut wrapped = false;
        if self.state == NavState::Navigating && self.is_moving {
            self.velocity = velocity.sample().max(0.0);
            let step = self.kinematics.advance(self.remaining, self.velocity, dt);
            self.remaining = step.remaining;
            wrapped = step.wrapped;
            if wrapped {
                debug!("segment exhausted; wrapping to full length");
            }
        } else {
            self.velocity = 0.0;
        }

        let turn_imminent = self.turn_imminent();
        let turn_edge = self.turn_edges.update(turn_imminent);

        TickReport {
            state: self.state,
            remaining_m: self.remaining,
            velocity_mps: self.velocity,
            turn_imminent,
            turn_edge,
            wrapped,
            is_moving: self.is_moving,
        }
    }

    /// Stop walking.  Only meaningful while navigating.
    pub fn pause(&mut self) -> Option<NavTransition> {
        if self.state != NavState::Navigating || !self.is_moving {
            return None;
        }
        self.is_moving = false;
        self.velocity = 0.0;
        Some(NavTransition::Paused)
    }

    /// Start walking again.  Only meaningful while navigating.
    pub fn resume(&mut self) -> Option<NavTransition> {
        if self.state != NavState::Navigating || self.is_moving {
            return None;
        }
        self.is_moving = true;
        Some(NavTransition::Resumed)
    }

    /// Flip between paused and walking.
    pub fn toggle_moving(&mut self) -> Option<NavTransition> {
        if self.is_moving {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Cancel whatever is in progress and return to idle.
    ///
    /// Idempotent: aborting an idle session changes nothing and returns
    /// `None`.  Any in-flight scan ticket becomes stale.
    pub fn abort(&mut self) -> Option<NavTransition> {
        if self.state == NavState::Idle {
            return None;
        }
        info!(
            destination = self.target.as_deref().unwrap_or_default(),
            state = %self.state,
            "navigation aborted"
        );
        self.generation += 1;
        self.state = NavState::Idle;
        self.target = None;
        self.reset_motion();
        Some(NavTransition::Aborted)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Destination label, `None` while idle.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Metres left until the next turn, in `(0, segment_length]`.
    pub fn remaining_m(&self) -> f32 {
        self.remaining
    }

    /// Derived from the remaining distance on every read.
    pub fn turn_imminent(&self) -> bool {
        is_turn_imminent(self.remaining)
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    /// Speed sampled on the most recent tick.
    pub fn velocity_mps(&self) -> f32 {
        self.velocity
    }

    /// Location result attached when scanning resolved.
    pub fn analysis(&self) -> Option<&SceneAnalysis> {
        self.analysis.as_ref()
    }

    pub fn segment_length(&self) -> f32 {
        self.kinematics.segment_length()
    }

    /// Ticket that a scan result must carry to be accepted right now.
    pub fn current_ticket(&self) -> ScanTicket {
        ScanTicket {
            generation: self.generation,
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn accepts(&self, ticket: ScanTicket) -> bool {
        self.state == NavState::Scanning && ticket.generation == self.generation
    }

    fn reset_motion(&mut self) {
        self.remaining = self.kinematics.segment_length();
        self.is_moving = false;
        self.velocity = 0.0;
        self.analysis = None;
        self.turn_edges.reset();
    }
}
