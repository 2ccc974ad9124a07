//! Walking-speed samplers.
//!
//! The session asks a [`VelocitySource`] for a fresh speed on every moving
//! tick.  Speeds are resampled, never smoothed.  Tests inject
//! [`ScriptedVelocity`] or [`ConstantVelocity`] instead of a random walk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mean walking speed, m/s.
pub const NOMINAL_WALKING_SPEED: f32 = 1.4;
/// Half-width of the uniform jitter around [`NOMINAL_WALKING_SPEED`].
pub const SPEED_JITTER: f32 = 0.1;
pub const MIN_WALKING_SPEED: f32 = NOMINAL_WALKING_SPEED - SPEED_JITTER;
pub const MAX_WALKING_SPEED: f32 = NOMINAL_WALKING_SPEED + SPEED_JITTER;

/// Supplies one speed sample per moving tick.
pub trait VelocitySource: Send {
    /// Next walking speed in m/s.  Must be positive.
    fn sample(&mut self) -> f32;
}

/// Nominal speed plus uniform jitter, clamped to
/// `[MIN_WALKING_SPEED, MAX_WALKING_SPEED]`.
#[derive(Debug, Clone)]
pub struct JitteredWalk<R> {
    rng: R,
}

impl<R: Rng> JitteredWalk<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl JitteredWalk<StdRng> {
    /// Seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible sequence for a fixed `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> VelocitySource for JitteredWalk<R> {
    fn sample(&mut self) -> f32 {
        let jitter = self.rng.gen_range(-SPEED_JITTER..=SPEED_JITTER);
        (NOMINAL_WALKING_SPEED + jitter).clamp(MIN_WALKING_SPEED, MAX_WALKING_SPEED)
    }
}

/// Always the same speed.
#[derive(Debug, Clone, Copy)]
pub struct ConstantVelocity(pub f32);

impl VelocitySource for ConstantVelocity {
    fn sample(&mut self) -> f32 {
        self.0
    }
}

/// Replays a fixed list of speeds, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedVelocity {
    values: Vec<f32>,
    cursor: usize,
}

impl ScriptedVelocity {
    /// An empty script behaves like [`ConstantVelocity`] at the nominal speed.
    pub fn new(values: impl Into<Vec<f32>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }
}

impl VelocitySource for ScriptedVelocity {
    fn sample(&mut self) -> f32 {
        if self.values.is_empty() {
            return NOMINAL_WALKING_SPEED;
        }
        let v = self.values[self.cursor % self.values.len()];
        self.cursor = self.cursor.wrapping_add(1);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_walk_stays_in_band() {
        let mut walk = JitteredWalk::seeded(7);
        for _ in 0..10_000 {
            let v = walk.sample();
            assert!((MIN_WALKING_SPEED..=MAX_WALKING_SPEED).contains(&v), "v = {v}");
        }
    }

    #[test]
    fn seeded_walks_are_reproducible() {
        let mut a = JitteredWalk::seeded(42);
        let mut b = JitteredWalk::seeded(42);
        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn scripted_velocity_cycles() {
        let mut s = ScriptedVelocity::new(vec![1.3, 1.5]);
        assert_eq!(s.sample(), 1.3);
        assert_eq!(s.sample(), 1.5);
        assert_eq!(s.sample(), 1.3);
    }

    #[test]
    fn empty_script_uses_nominal_speed() {
        let mut s = ScriptedVelocity::new(Vec::new());
        assert_eq!(s.sample(), NOMINAL_WALKING_SPEED);
    }
}
