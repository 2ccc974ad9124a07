//! Turn-imminent evaluation.
//!
//! A single threshold with no hysteresis: the flag flips the moment the
//! remaining distance crosses [`TURN_THRESHOLD_M`] in either direction, and
//! exactly `10.0` is *not* imminent.  With very small steps near the boundary
//! this can flicker; [`TurnEdgeDetector`] keeps feedback one-shot per edge.

/// Distance below which the next turn is announced, in metres.
pub const TURN_THRESHOLD_M: f32 = 10.0;

/// `true` iff `remaining < TURN_THRESHOLD_M`.
pub fn is_turn_imminent(remaining: f32) -> bool {
    remaining < TURN_THRESHOLD_M
}

/// A change of the turn-imminent flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEdge {
    /// `false → true`: the turn is now close.
    Rising,
    /// `true → false`: the turn was passed (or the segment wrapped).
    Falling,
}

/// Remembers the previous flag value and reports each change once.
#[derive(Debug, Clone, Default)]
pub struct TurnEdgeDetector {
    last: bool,
}

impl TurnEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current flag; returns the edge if it changed.
    pub fn update(&mut self, imminent: bool) -> Option<TurnEdge> {
        let edge = match (self.last, imminent) {
            (false, true) => Some(TurnEdge::Rising),
            (true, false) => Some(TurnEdge::Falling),
            _ => None,
        };
        self.last = imminent;
        edge
    }

    pub fn current(&self) -> bool {
        self.last
    }

    /// Forget the previous value (back to "not imminent").
    pub fn reset(&mut self) {
        self.last = false;
    }
}
