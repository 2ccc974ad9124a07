use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle phase of a navigation session.
///
/// Aborting always lands back in [`NavState::Idle`]; there is no resting
/// "aborted" or "arrived" phase because the demo route loops forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavState {
    /// No active destination; waiting for a query.
    #[default]
    Idle,
    /// A destination was committed and the surroundings are being recognised.
    Scanning,
    /// The kinematics integrator is live (when the user is moving).
    Navigating,
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavState::Idle => write!(f, "IDLE"),
            NavState::Scanning => write!(f, "SCANNING"),
            NavState::Navigating => write!(f, "NAVIGATING"),
        }
    }
}

/// Result of classifying one still camera frame.
///
/// Field names on the wire follow the inference endpoint's response schema
/// (`locationContext`, `confidence`, `detectedFeatures`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneAnalysis {
    /// Short description of where the frame looks like it was taken.
    pub location_context: String,
    /// Confidence score in `[0, 1]`.
    pub confidence: f32,
    /// Visible objects (doors, staircases, signs, …).
    pub detected_features: Vec<String>,
}

impl SceneAnalysis {
    /// Low-confidence result used whenever classification fails outright.
    pub fn placeholder() -> Self {
        Self {
            location_context: "IOBM Interior".to_string(),
            confidence: 0.0,
            detected_features: Vec::new(),
        }
    }

    /// Result used when the endpoint answered but the reply was not valid JSON.
    pub fn unparsed() -> Self {
        Self {
            location_context: "University Corridor".to_string(),
            confidence: 0.7,
            detected_features: vec!["Wall".to_string(), "Floor".to_string()],
        }
    }

    /// Canned result returned when no inference credentials are configured.
    pub fn canned() -> Self {
        Self {
            location_context: "IOBM Main Corridor - Block B".to_string(),
            confidence: 0.89,
            detected_features: vec![
                "Classroom Door".to_string(),
                "Staircase".to_string(),
                "Notice Board".to_string(),
            ],
        }
    }

    /// Force `confidence` into `[0, 1]`; NaN becomes `0`.
    pub fn clamp_confidence(mut self) -> Self {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
        self
    }
}

/// A discrete change in the navigation session, emitted once per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum NavTransition {
    /// `Idle → Scanning` (or a superseding re-submit).
    ScanStarted { target: String },
    /// `Scanning → Navigating`.
    ScanResolved { target: String, analysis: SceneAnalysis },
    /// `Scanning → Idle` because no location result arrived in time.
    ScanFailed { target: String, reason: String },
    /// Any state `→ Idle` on user request.
    Aborted,
    /// Movement paused while navigating.
    Paused,
    /// Movement resumed while navigating.
    Resumed,
    /// Remaining distance ran out and was reset to the segment length.
    SegmentWrapped,
}

/// Numeric per-frame summary published for renderers and loggers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlaySummary {
    pub state: NavState,
    /// Metres left until the next turn.
    pub remaining_m: f32,
    /// Walking speed sampled this frame (0 when stationary), m/s.
    pub velocity_mps: f32,
    /// Mini-map progress in percent, `[0, 100]`.
    pub progress_percent: f32,
    pub turn_imminent: bool,
    pub is_moving: bool,
}

/// Unified event wrapper for the screen's event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "pathsense-runtime::screen"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Transition(NavTransition),
    Overlay(OverlaySummary),
    /// Edge of the turn-imminent flag.
    TurnCue { imminent: bool },
    CameraFault { message: String },
    /// Operator asked the process to stop (e.g. Ctrl-C).
    Shutdown { reason: String },
}

/// Error type spanning device failures, classification and plumbing.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavError {
    #[error("Camera Fault on {device}: {details}")]
    Camera { device: String, details: String },

    #[error("Scene Classification Error: {0}")]
    Classification(String),

    #[error("Timed Out: {0}")]
    Timeout(String),

    #[error("Feedback Output Error: {0}")]
    Feedback(String),

    #[error("Event Channel Error: {0}")]
    Channel(String),

}
