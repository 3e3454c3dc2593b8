//! World configuration, callbacks and the small records returned by world
//! queries.

use std::fmt;
use std::sync::Arc;

use super::task::TaskSystem;
use crate::collision::manifold::Manifold;
use crate::common::constants::DEFAULT_MASK_BITS;
use crate::common::material::{mix_friction, mix_restitution};
use crate::common::{length_units_per_meter, ShapeId};
use crate::math::Vec2;

/// Mixes two friction or restitution values:
/// `(value_a, user_material_a, value_b, user_material_b) -> mixed`.
pub type MixingFn = fn(f32, u64, f32, u64) -> f32;

/// Custom pair filter, called for shapes that enable custom filtering.
/// Return false to prevent the contact. Called during the step: it must not
/// touch the world.
pub type CustomFilterFn = Arc<dyn Fn(ShapeId, ShapeId) -> bool + Send + Sync>;

/// Pre-solve callback, called for touching contacts of shapes that enable
/// pre-solve events. Return false to disable the contact for this step.
/// Called during the step: it must not touch the world.
pub type PreSolveFn = Arc<dyn Fn(ShapeId, ShapeId, &Manifold) -> bool + Send + Sync>;

/// Everything needed to create a world. Use `WorldDef::default()` and
/// override what you need.
#[derive(Clone)]
pub struct WorldDef {
    /// Gravity vector. There is no built-in up direction.
    pub gravity: Vec2,
    /// Restitution speed threshold, usually in m/s.
    pub restitution_threshold: f32,
    /// Threshold speed for hit events, usually in m/s.
    pub hit_event_threshold: f32,
    /// Contact stiffness, cycles per second.
    pub contact_hertz: f32,
    /// Contact bounciness. Non-dimensional.
    pub contact_damping_ratio: f32,
    /// Limits the speed at which overlapping bodies are pushed apart,
    /// usually meters per second.
    pub max_contact_push_speed: f32,
    /// Joint stiffness, cycles per second.
    pub joint_hertz: f32,
    /// Joint bounciness. Non-dimensional.
    pub joint_damping_ratio: f32,
    /// Maximum linear speed, usually meters per second.
    pub maximum_linear_speed: f32,
    pub friction_callback: MixingFn,
    pub restitution_callback: MixingFn,
    /// Can bodies go to sleep to improve performance?
    pub enable_sleep: bool,
    /// Enable continuous collision.
    pub enable_continuous: bool,
    /// Number of workers to use with the provided task system.
    pub worker_count: usize,
    /// Task system for the parallel stages. `None` runs them serially.
    pub task_system: Option<Arc<dyn TaskSystem>>,
    /// User data.
    pub user_data: u64,
}

impl Default for WorldDef {
    fn default() -> Self {
        let length_units = length_units_per_meter();
        Self {
            gravity: Vec2::new(0.0, -10.0),
            restitution_threshold: 1.0 * length_units,
            hit_event_threshold: 1.0 * length_units,
            contact_hertz: 30.0,
            contact_damping_ratio: 10.0,
            max_contact_push_speed: 3.0 * length_units,
            joint_hertz: 60.0,
            joint_damping_ratio: 2.0,
            maximum_linear_speed: 4.0 * length_units * 100.0,
            friction_callback: mix_friction,
            restitution_callback: mix_restitution,
            enable_sleep: true,
            enable_continuous: true,
            worker_count: 1,
            task_system: None,
            user_data: 0,
        }
    }
}

impl fmt::Debug for WorldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldDef")
            .field("gravity", &self.gravity)
            .field("restitution_threshold", &self.restitution_threshold)
            .field("hit_event_threshold", &self.hit_event_threshold)
            .field("contact_hertz", &self.contact_hertz)
            .field("contact_damping_ratio", &self.contact_damping_ratio)
            .field("max_contact_push_speed", &self.max_contact_push_speed)
            .field("joint_hertz", &self.joint_hertz)
            .field("joint_damping_ratio", &self.joint_damping_ratio)
            .field("maximum_linear_speed", &self.maximum_linear_speed)
            .field("enable_sleep", &self.enable_sleep)
            .field("enable_continuous", &self.enable_continuous)
            .field("worker_count", &self.worker_count)
            .field("task_system", &self.task_system.is_some())
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

impl WorldDef {
    pub fn is_valid(&self) -> bool {
        self.gravity.is_valid()
            && self.restitution_threshold >= 0.0
            && self.hit_event_threshold >= 0.0
            && self.contact_hertz >= 0.0
            && self.contact_damping_ratio >= 0.0
            && self.joint_hertz >= 0.0
            && self.joint_damping_ratio >= 0.0
            && self.max_contact_push_speed >= 0.0
            && self.maximum_linear_speed > 0.0
    }
}

/// Applies a radial impulse to every dynamic body overlapping a circle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ExplosionDef {
    /// Mask bits to filter shapes.
    pub mask_bits: u64,
    /// The center of the explosion in world space.
    pub position: Vec2,
    /// The radius of the explosion.
    pub radius: f32,
    /// The falloff distance beyond the radius. Impulse is reduced to zero
    /// at this distance.
    pub falloff: f32,
    /// Impulse per unit length. This applies an impulse according to the
    /// shape perimeter that is facing the explosion.
    pub impulse_per_length: f32,
}

impl Default for ExplosionDef {
    fn default() -> Self {
        Self {
            mask_bits: DEFAULT_MASK_BITS,
            position: Vec2::ZERO,
            radius: 0.0,
            falloff: 0.0,
            impulse_per_length: 0.0,
        }
    }
}

/// Result of a closest-hit ray cast.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RayResult {
    pub shape_id: ShapeId,
    pub point: Vec2,
    pub normal: Vec2,
    pub fraction: f32,
    pub node_visits: usize,
    pub leaf_visits: usize,
    pub hit: bool,
}

/// A touching contact as reported by body and shape contact queries.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactData {
    pub shape_id_a: ShapeId,
    pub shape_id_b: ShapeId,
    pub manifold: Manifold,
}

/// Wall time spent in each stage of the last step, in milliseconds.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Profile {
    pub step: f32,
    pub pairs: f32,
    pub collide: f32,
    pub solve: f32,
    pub merge_islands: f32,
    pub prepare_constraints: f32,
    pub integrate_velocities: f32,
    pub warm_start: f32,
    pub solve_impulses: f32,
    pub integrate_positions: f32,
    pub relax_impulses: f32,
    pub apply_restitution: f32,
    pub store_impulses: f32,
    pub split_islands: f32,
    pub transforms: f32,
    pub hit_events: f32,
    pub refit: f32,
    pub bullets: f32,
    pub sleep_islands: f32,
    pub sensors: f32,
}

/// Object counts and tree statistics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub body_count: usize,
    pub shape_count: usize,
    pub contact_count: usize,
    pub joint_count: usize,
    pub island_count: usize,
    pub static_tree_height: usize,
    pub tree_height: usize,
    pub byte_count: usize,
    pub task_count: usize,
    /// Constraints per graph color. The last entry is the overflow set.
    pub color_counts: [usize; crate::common::constants::GRAPH_COLOR_COUNT + 1],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_def_defaults() {
        let def = WorldDef::default();
        assert_eq!(def.gravity, Vec2::new(0.0, -10.0));
        assert_eq!(def.contact_hertz, 30.0);
        assert_eq!(def.maximum_linear_speed, 400.0);
        assert!(def.enable_sleep && def.enable_continuous);
        assert!(def.is_valid());
        assert!(format!("{def:?}").contains("WorldDef"));

        let bad = WorldDef {
            gravity: Vec2::new(f32::INFINITY, 0.0),
            ..Default::default()
        };
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_default_mixing() {
        let def = WorldDef::default();
        assert_eq!((def.restitution_callback)(0.1, 0, 0.5, 0), 0.5);
        assert!(((def.friction_callback)(0.25, 0, 1.0, 0) - 0.5).abs() < 1e-6);
    }
}
