//! Engine-wide tuning constants. Lengths scale with the length units per meter.

use super::base::length_units_per_meter;
use std::f32::consts::PI;

/// Maximum number of vertices on a convex polygon. Changing this affects
/// performance even if you don't use many vertices.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum number of simultaneous worlds that can be allocated.
pub const MAX_WORLDS: usize = 128;

/// Upper bound on the number of task-system workers.
pub const MAX_WORKERS: usize = 64;

/// The maximum rotation of a body per time step. This limit is very large and
/// is used to prevent numerical problems.
pub const MAX_ROTATION: f32 = 0.25 * PI;

/// Time a body must be still before it will go to sleep, in seconds.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Number of colors used by the constraint graph.
pub const GRAPH_COLOR_COUNT: usize = 24;

/// Colors available to constraints between two dynamic bodies. Constraints
/// touching a static body use the remaining colors so they are solved last.
pub const DYNAMIC_COLOR_COUNT: usize = GRAPH_COLOR_COUNT - 4;

pub const DEFAULT_CATEGORY_BITS: u64 = 1;
pub const DEFAULT_MASK_BITS: u64 = u64::MAX;

/// Collision and constraint tolerance. Chosen to be numerically significant
/// but visually insignificant.
#[inline]
pub fn linear_slop() -> f32 {
    0.005 * length_units_per_meter()
}

/// Contacts are created when shapes are within this distance so they can be
/// solved speculatively before they touch.
#[inline]
pub fn speculative_distance() -> f32 {
    4.0 * linear_slop()
}

/// Fattening applied to broad-phase proxies so small movements don't trigger
/// tree updates.
#[inline]
pub fn aabb_margin() -> f32 {
    0.1 * length_units_per_meter()
}

/// Radius of the polygon skin used by the polygon collision routines.
#[inline]
pub fn polygon_radius() -> f32 {
    2.0 * linear_slop()
}

/// Used to detect bad values. Positions greater than about 16km have
/// precision problems, so 100km as a limit should be fine in all cases.
#[inline]
pub fn huge() -> f32 {
    100_000.0 * length_units_per_meter()
}
