//! Rigid body definitions and the body record stored by the world.

use crate::common::constants::huge;
use crate::math::{Rot, Transform, Vec2};
use crate::shapes::MassData;

/// The body simulation type.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, may be manually moved.
    #[default]
    Static = 0,
    /// Zero mass, velocity set by user, moved by solver.
    Kinematic = 1,
    /// Positive mass, velocity determined by forces, moved by solver.
    Dynamic = 2,
}

/// A body definition holds all the data needed to construct a rigid body.
/// You can safely re-use body definitions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyDef {
    /// The body type: static, kinematic, or dynamic.
    pub body_type: BodyType,
    /// The initial world position of the body. Bodies should be created with
    /// the desired position; creating at the origin and then moving is slow
    /// when there are many bodies there.
    pub position: Vec2,
    /// The initial world rotation of the body.
    pub rotation: Rot,
    /// The initial linear velocity of the body's origin, usually in meters
    /// per second.
    pub linear_velocity: Vec2,
    /// The initial angular velocity of the body, radians per second.
    pub angular_velocity: f32,
    /// Linear damping is used to reduce the linear velocity.
    pub linear_damping: f32,
    /// Angular damping is used to reduce the angular velocity.
    pub angular_damping: f32,
    /// Scale the gravity applied to this body. Non-dimensional.
    pub gravity_scale: f32,
    /// Sleep velocity threshold, usually in meters per second.
    pub sleep_threshold: f32,
    /// Optional body name for debugging.
    pub name: Option<String>,
    /// Application specific body data.
    pub user_data: u64,
    /// Set this flag to false if this body should never fall asleep.
    pub enable_sleep: bool,
    /// Is this body initially awake or sleeping?
    pub is_awake: bool,
    /// Should this body be prevented from rotating? Useful for characters.
    pub fixed_rotation: bool,
    /// Treat this body as a high speed object that performs continuous
    /// collision detection against dynamic and kinematic bodies, but not
    /// other bullet bodies.
    pub is_bullet: bool,
    /// Used to disable a body. A disabled body does not move or collide.
    pub is_enabled: bool,
    /// Skips the angular speed cap. Needed for fast spinning wheels.
    pub allow_fast_rotation: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            rotation: Rot::IDENTITY,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            sleep_threshold: 0.05 * crate::common::length_units_per_meter(),
            name: None,
            user_data: 0,
            enable_sleep: true,
            is_awake: true,
            fixed_rotation: false,
            is_bullet: false,
            is_enabled: true,
            allow_fast_rotation: false,
        }
    }
}

impl BodyDef {
    pub fn dynamic() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            ..Default::default()
        }
    }

    /// Finite position, velocity and damping values with a unit rotation.
    pub fn is_valid(&self) -> bool {
        self.position.is_valid()
            && self.rotation.is_valid()
            && self.rotation.is_normalized()
            && self.linear_velocity.is_valid()
            && self.angular_velocity.is_finite()
            && self.linear_damping.is_finite()
            && self.linear_damping >= 0.0
            && self.angular_damping.is_finite()
            && self.angular_damping >= 0.0
            && self.gravity_scale.is_finite()
            && self.sleep_threshold.is_finite()
            && self.sleep_threshold >= 0.0
    }
}

/// The world's record of a body. Positions are kept both for the body
/// origin (`transform.p`) and the center of mass (`center`).
#[derive(Debug, Clone)]
pub(crate) struct Body {
    pub name: Option<String>,
    pub user_data: u64,
    pub body_type: BodyType,
    pub generation: u16,

    pub transform: Transform,
    /// Center of mass position in world space.
    pub center: Vec2,
    /// Previous rotation and center, for continuous collision.
    pub rotation0: Rot,
    pub center0: Vec2,
    /// Location of the center of mass relative to the body origin.
    pub local_center: Vec2,

    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,

    pub mass: f32,
    pub inv_mass: f32,
    /// Rotational inertia about the center of mass.
    pub inertia: f32,
    pub inv_inertia: f32,

    pub min_extent: f32,
    pub max_extent: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,

    pub sleep_threshold: f32,
    pub sleep_time: f32,

    /// Shape indices, in creation order.
    pub shapes: Vec<usize>,
    /// Contact indices, touching or not.
    pub contacts: Vec<usize>,
    pub joints: Vec<usize>,

    /// Static and kinematic bodies never join islands.
    pub island_id: Option<usize>,
    pub awake: bool,
    pub enabled: bool,
    pub enable_sleep: bool,
    pub fixed_rotation: bool,
    pub is_bullet: bool,
    pub allow_fast_rotation: bool,
    pub is_fast: bool,
    pub enlarge_aabb: bool,

    /// Index into the awake arrays during a step.
    pub solver_index: Option<usize>,
    /// Index of this step's move event.
    pub move_event_index: Option<usize>,
}

impl Body {
    pub fn new(def: &BodyDef, generation: u16) -> Self {
        let transform = Transform::new(def.position, def.rotation);
        Self {
            name: def.name.clone(),
            user_data: def.user_data,
            body_type: def.body_type,
            generation,
            transform,
            center: def.position,
            rotation0: def.rotation,
            center0: def.position,
            local_center: Vec2::ZERO,
            linear_velocity: def.linear_velocity,
            angular_velocity: def.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            min_extent: huge(),
            max_extent: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_threshold: def.sleep_threshold,
            sleep_time: 0.0,
            shapes: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            island_id: None,
            awake: def.is_awake && def.body_type != BodyType::Static,
            enabled: def.is_enabled,
            enable_sleep: def.enable_sleep,
            fixed_rotation: def.fixed_rotation,
            is_bullet: def.is_bullet,
            allow_fast_rotation: def.allow_fast_rotation,
            is_fast: false,
            enlarge_aabb: false,
            solver_index: None,
            move_event_index: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Awake, enabled and able to move.
    pub fn is_simulated(&self) -> bool {
        self.enabled && self.awake && self.body_type != BodyType::Static
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.local_center,
            rotational_inertia: self.inertia,
        }
    }

    /// Applies aggregated mass data and recomputes the inverse values, the
    /// world center and the velocity of the moved center of mass.
    pub fn set_mass_data(&mut self, mass_data: MassData) {
        self.mass = mass_data.mass.max(0.0);
        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if mass_data.rotational_inertia > 0.0 && !self.fixed_rotation {
            self.inertia = mass_data.rotational_inertia;
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Move the center of mass.
        let old_center = self.center;
        self.local_center = mass_data.center;
        self.center = self.transform.apply(self.local_center);
        self.center0 = self.center;

        // Update the center of mass velocity.
        let delta_linear = Vec2::scalar_cross(self.angular_velocity, self.center - old_center);
        self.linear_velocity += delta_linear;
    }

    /// Velocity of a world point attached to this body.
    pub fn point_velocity(&self, world_point: Vec2) -> Vec2 {
        let r = world_point - self.center;
        self.linear_velocity + Vec2::scalar_cross(self.angular_velocity, r)
    }

    /// Clears mass, leaving the body massless with the center at the origin.
    pub fn reset_mass(&mut self) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.local_center = Vec2::ZERO;
        self.min_extent = huge();
        self.max_extent = 0.0;
        self.center = self.transform.p;
        self.center0 = self.center;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_def_defaults() {
        let def = BodyDef::default();
        assert_eq!(def.body_type, BodyType::Static);
        assert_eq!(def.gravity_scale, 1.0);
        assert!(def.enable_sleep && def.is_awake && def.is_enabled);
        assert!(def.is_valid());

        let bad = BodyDef {
            position: Vec2::new(f32::NAN, 0.0),
            ..BodyDef::dynamic()
        };
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_set_mass_data_moves_center() {
        let def = BodyDef {
            position: Vec2::new(1.0, 2.0),
            angular_velocity: 2.0,
            ..BodyDef::dynamic()
        };
        let mut body = Body::new(&def, 0);
        body.set_mass_data(MassData {
            mass: 2.0,
            center: Vec2::new(0.5, 0.0),
            rotational_inertia: 0.25,
        });
        assert_relative_eq!(body.inv_mass, 0.5);
        assert_relative_eq!(body.inv_inertia, 4.0);
        assert_relative_eq!(body.center.x, 1.5);
        // The center now moves with the spin: w x r = 2 * (0, 0.5)
        assert_relative_eq!(body.linear_velocity.y, 1.0);

        body.fixed_rotation = true;
        body.set_mass_data(body.mass_data());
        assert_eq!(body.inv_inertia, 0.0);
    }
}
