//! Distance-to-turn integrator.
//!
//! Each tick subtracts `velocity × dt` from the remaining distance.  When the
//! distance runs out it wraps back to the full segment length: the demo route
//! is an endless loop and has no arrival condition.
//!
//! `dt` is clamped to [`MAX_STEP`] so that a stalled frame source (a
//! backgrounded window, a debugger pause) resumes with at most a quarter
//! second of movement instead of a jump across the whole segment.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pathsense_engine::kinematics::Kinematics;
//!
//! let k = Kinematics::default();
//! let step = k.advance(30.0, 1.4, Duration::from_millis(100));
//! assert!((step.remaining - 29.86).abs() < 1e-4);
//! assert!(!step.wrapped);
//! ```

use std::time::Duration;

/// Length of the looping demo segment, in metres.
pub const SEGMENT_LENGTH_M: f32 = 30.0;

/// Largest time step integrated in one tick.
pub const MAX_STEP: Duration = Duration::from_millis(250);

/// Outcome of one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// Remaining distance after the step, always in `(0, segment_length]`.
    pub remaining: f32,
    /// `true` when the distance ran out and was reset.
    pub wrapped: bool,
}

/// Fixed-segment, wrap-around distance integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    segment_length: f32,
    max_step: Duration,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::new(SEGMENT_LENGTH_M)
    }
}

impl Kinematics {
    /// Create an integrator for a segment of `segment_length` metres.
    ///
    /// Non-positive lengths fall back to [`SEGMENT_LENGTH_M`].
    pub fn new(segment_length: f32) -> Self {
        let segment_length = if segment_length > 0.0 {
            segment_length
        } else {
            SEGMENT_LENGTH_M
        };
        Self {
            segment_length,
            max_step: MAX_STEP,
        }
    }

    /// Override the per-tick step clamp.
    pub fn with_max_step(mut self, max_step: Duration) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn segment_length(&self) -> f32 {
        self.segment_length
    }

    /// `dt` clamped to the max step, in seconds.
    pub fn clamp_step(&self, dt: Duration) -> f32 {
        dt.min(self.max_step).as_secs_f32()
    }

    /// Advance `remaining` by walking at `velocity` m/s for `dt`.
    ///
    /// Negative velocities are treated as standing still.
    pub fn advance(&self, remaining: f32, velocity: f32, dt: Duration) -> Advance {
        let travelled = velocity.max(0.0) * self.clamp_step(dt);
        let next = remaining - travelled;
        if next <= 0.0 {
            Advance {
                remaining: self.segment_length,
                wrapped: true,
            }
        } else {
            Advance {
                remaining: next.min(self.segment_length),
                wrapped: false,
            }
        }
    }
}
