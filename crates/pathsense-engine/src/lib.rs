//! `pathsense-engine` – The Navigation Simulation Core
//!
//! Everything with temporal dynamics lives here, and none of it knows about
//! wall clocks, threads or rendering.  Callers feed frame timestamps and
//! commands in and read numbers and transitions out.
//!
//! # Modules
//!
//! - [`kinematics`] – [`Kinematics`][kinematics::Kinematics]: advances the
//!   distance to the next turn and wraps it back to the segment length.
//! - [`velocity`] – [`VelocitySource`][velocity::VelocitySource]: injectable
//!   walking-speed samplers, random or scripted.
//! - [`turn`] – the single-threshold turn evaluator and a rising/falling
//!   [`TurnEdgeDetector`][turn::TurnEdgeDetector].
//! - [`session`] – [`NavigationSession`][session::NavigationSession]: the
//!   `Idle → Scanning → Navigating` state machine, mutated only through
//!   named commands.
//! - [`feedback`] – [`FeedbackDispatcher`][feedback::FeedbackDispatcher]:
//!   turns transitions and turn edges into one-shot speech and haptics.
//! - [`overlay`] – pure projection of the session onto arrow-stack and
//!   mini-map geometry.

pub mod feedback;
pub mod kinematics;
pub mod overlay;
pub mod session;
pub mod turn;
pub mod velocity;

pub use feedback::{FeedbackDispatcher, FeedbackMode};
pub use kinematics::{Advance, Kinematics, MAX_STEP, SEGMENT_LENGTH_M};
pub use overlay::{
    ArrowTransform, Maneuver, MapLeg, MiniMapMarker, OverlayFrame, WAYPOINT_COUNT, project,
};
pub use session::{NavigationSession, ScanTicket, TickReport};
pub use turn::{TURN_THRESHOLD_M, TurnEdge, TurnEdgeDetector, is_turn_imminent};
pub use velocity::{ConstantVelocity, JitteredWalk, ScriptedVelocity, VelocitySource};
