//! Pure projection of the session onto overlay geometry.
//!
//! [`project`] turns the remaining distance and the turn flag into the
//! numbers a renderer needs: a stack of [`WAYPOINT_COUNT`] arrow transforms,
//! a marker on an L-shaped mini-map track and the distance readout.  It has
//! no state and no side effects; equal inputs always give equal frames.

use serde::Serialize;

/// Arrows in the path stack.
pub const WAYPOINT_COUNT: usize = 7;

const ARROW_BASE_BOTTOM: f32 = 8.0;
const ARROW_BOTTOM_STEP: f32 = 15.0;
const ARROW_BASE_SCALE: f32 = 1.2;
const ARROW_SCALE_STEP: f32 = 0.12;
const ARROW_OPACITY_STEP: f32 = 0.12;
const ARROW_BASE_Z: i32 = 30;
const ARROW_DELAY_STEP_S: f32 = 0.2;
const TURN_SHIFT_PX: f32 = 20.0;
const TURN_ROTATE_DEG: f32 = 8.0;

const MAP_ORIGIN: f32 = 15.0;
const MAP_CORNER: f32 = 85.0;
const MAP_LEG_SCALE: f32 = 1.4;
const TRAIL_DASH_LENGTH: f32 = 200.0;

/// Which side of the L-shaped mini-map track the marker is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapLeg {
    /// Bottom edge, moving right.
    First,
    /// Right edge, moving up.
    Second,
}

/// Position of the "you are here" marker, in percent of the map box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MiniMapMarker {
    pub progress_percent: f32,
    pub left_percent: f32,
    pub top_percent: f32,
    /// SVG `stroke-dashoffset` of the walked trail.
    pub trail_dash_offset: f32,
    pub leg: MapLeg,
}

impl MiniMapMarker {
    /// Place the marker for `progress_percent` (clamped to `[0, 100]`).
    pub fn at(progress_percent: f32) -> Self {
        let p = clamp_unit(progress_percent / 100.0) * 100.0;
        let (left, top, leg) = if p < 50.0 {
            (MAP_ORIGIN + MAP_LEG_SCALE * p, MAP_CORNER, MapLeg::First)
        } else {
            (MAP_CORNER, MAP_CORNER - MAP_LEG_SCALE * (p - 50.0), MapLeg::Second)
        };
        Self {
            progress_percent: p,
            left_percent: left,
            top_percent: top,
            trail_dash_offset: TRAIL_DASH_LENGTH - 2.0 * p,
            leg,
        }
    }
}

/// Transform for arrow `index`, counted from the one nearest the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrowTransform {
    pub index: usize,
    pub bottom_percent: f32,
    pub translate_x_px: f32,
    pub rotate_z_deg: f32,
    pub scale: f32,
    pub opacity: f32,
    pub z_index: i32,
    pub animation_delay_s: f32,
}

impl ArrowTransform {
    pub fn for_index(index: usize, turn_imminent: bool) -> Self {
        let i = index as f32;
        let (translate_x_px, rotate_z_deg) = if turn_imminent {
            (TURN_SHIFT_PX * i, TURN_ROTATE_DEG * i)
        } else {
            (0.0, 0.0)
        };
        Self {
            index,
            bottom_percent: ARROW_BASE_BOTTOM + ARROW_BOTTOM_STEP * i,
            translate_x_px,
            rotate_z_deg,
            scale: ARROW_BASE_SCALE - ARROW_SCALE_STEP * i,
            opacity: 1.0 - ARROW_OPACITY_STEP * i,
            z_index: ARROW_BASE_Z - index as i32,
            animation_delay_s: ARROW_DELAY_STEP_S * i,
        }
    }
}

/// Icon shown next to the distance readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    Straight,
    TurnRight,
}

/// Everything the overlay draws for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayFrame {
    /// Fraction of the segment walked, `[0, 1]`.
    pub progress: f32,
    pub minimap: MiniMapMarker,
    pub arrows: [ArrowTransform; WAYPOINT_COUNT],
    pub maneuver: Maneuver,
    /// Whole metres to the next turn.
    pub distance_readout: u32,
}

/// Project the session state onto overlay geometry.
pub fn project(remaining: f32, turn_imminent: bool, segment_length: f32) -> OverlayFrame {
    let progress = if segment_length > 0.0 {
        clamp_unit((segment_length - remaining) / segment_length)
    } else {
        0.0
    };

    OverlayFrame {
        progress,
        minimap: MiniMapMarker::at(progress * 100.0),
        arrows: std::array::from_fn(|i| ArrowTransform::for_index(i, turn_imminent)),
        maneuver: if turn_imminent {
            Maneuver::TurnRight
        } else {
            Maneuver::Straight
        },
        distance_readout: remaining.max(0.0).round() as u32,
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEG: f32 = 30.0;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn fresh_segment_is_at_map_origin() {
        let f = project(SEG, false, SEG);
        assert_eq!(f.progress, 0.0);
        assert_eq!(f.minimap.left_percent, 15.0);
        assert_eq!(f.minimap.top_percent, 85.0);
        assert_eq!(f.minimap.trail_dash_offset, 200.0);
        assert_eq!(f.minimap.leg, MapLeg::First);
        assert_eq!(f.distance_readout, 30);
        assert_eq!(f.maneuver, Maneuver::Straight);
    }

    #[test]
    fn marker_switches_leg_at_half_way() {
        let before = project(15.3, false, SEG).minimap;
        assert_eq!(before.leg, MapLeg::First);
        assert!(before.left_percent < 85.0);

        let at_half = project(15.0, false, SEG).minimap;
        assert_eq!(at_half.leg, MapLeg::Second);
        assert!(close(at_half.left_percent, 85.0));
        assert!(close(at_half.top_percent, 85.0));

        let late = project(3.0, true, SEG).minimap;
        assert!(close(late.progress_percent, 90.0));
        assert!(close(late.top_percent, 85.0 - 1.4 * 40.0));
        assert!(close(late.trail_dash_offset, 20.0));
    }

    #[test]
    fn arrows_shrink_and_fade_with_index() {
        let f = project(20.0, false, SEG);
        let last = f.arrows[WAYPOINT_COUNT - 1];
        assert_eq!(last.index, 6);
        assert!(close(last.bottom_percent, 98.0));
        assert!(close(last.scale, 1.2 - 0.72));
        assert!(close(last.opacity, 1.0 - 0.72));
        assert_eq!(last.z_index, 24);
        assert!(close(last.animation_delay_s, 1.2));
        assert!(f.arrows.iter().all(|a| a.translate_x_px == 0.0 && a.rotate_z_deg == 0.0));
    }

    #[test]
    fn arrows_bend_toward_turn() {
        let f = project(5.0, true, SEG);
        assert_eq!(f.maneuver, Maneuver::TurnRight);
        assert_eq!(f.arrows[0].translate_x_px, 0.0);
        assert!(close(f.arrows[3].translate_x_px, 60.0));
        assert!(close(f.arrows[3].rotate_z_deg, 24.0));
    }

    #[test]
    fn readout_rounds_to_whole_metres() {
        assert_eq!(project(9.6, true, SEG).distance_readout, 10);
        assert_eq!(project(0.4, true, SEG).distance_readout, 0);
    }

    proptest! {
        #[test]
        fn projection_is_deterministic(remaining in 0.001f32..=SEG, turn in any::<bool>()) {
            prop_assert_eq!(project(remaining, turn, SEG), project(remaining, turn, SEG));
        }

        #[test]
        fn projection_stays_in_bounds(remaining in -5.0f32..=40.0, turn in any::<bool>()) {
            let f = project(remaining, turn, SEG);
            prop_assert!((0.0..=1.0).contains(&f.progress));
            prop_assert!((14.999..=85.001).contains(&f.minimap.left_percent));
            prop_assert!((14.999..=85.001).contains(&f.minimap.top_percent));
            prop_assert!((-0.001..=200.0).contains(&f.minimap.trail_dash_offset));
            for a in f.arrows {
                prop_assert!(a.opacity > 0.0 && a.scale > 0.0);
            }
        }

        #[test]
        fn marker_leg_matches_progress(p in 0.0f32..=100.0) {
            let m = MiniMapMarker::at(p);
            prop_assert_eq!(m.leg == MapLeg::First, m.progress_percent < 50.0);
        }
    }
}
