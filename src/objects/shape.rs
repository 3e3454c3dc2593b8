//! Shape definitions and the shape record attached to a body.

use crate::collision::aabb::AABB;
use crate::common::{Filter, SurfaceMaterial};
use crate::math::{Transform, Vec2};
use crate::shapes::{MassData, ShapeGeometry};

/// Used to create a shape. Shapes are created on a body with a geometry
/// value; the definition carries everything else.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeDef {
    /// Application specific shape data.
    pub user_data: u64,
    /// The surface material for this shape.
    pub material: SurfaceMaterial,
    /// The density, usually in kg/m^2.
    pub density: f32,
    /// Collision filtering data.
    pub filter: Filter,
    /// Enable custom filtering. Only one of the two shapes needs to enable it.
    pub enable_custom_filtering: bool,
    /// A sensor shape generates overlap events but never generates a
    /// collision response. Sensors never detect other sensors.
    pub is_sensor: bool,
    /// Enable sensor events for this shape. A sensor reports overlaps only
    /// with shapes that also enable sensor events.
    pub enable_sensor_events: bool,
    /// Enable contact events for this shape. Only applies to kinematic and
    /// dynamic bodies.
    pub enable_contact_events: bool,
    /// Enable hit events for this shape. Only applies to kinematic and
    /// dynamic bodies.
    pub enable_hit_events: bool,
    /// Enable pre-solve contact events for this shape.
    pub enable_pre_solve_events: bool,
    /// When shapes are created they will scan the environment for collision
    /// the next time step. This can significantly slow down static body
    /// creation when there are many static shapes.
    pub invoke_contact_creation: bool,
    /// Should the body update the mass properties when this shape is created.
    pub update_body_mass: bool,
}

impl Default for ShapeDef {
    fn default() -> Self {
        Self {
            user_data: 0,
            material: SurfaceMaterial::default(),
            density: 1.0,
            filter: Filter::default(),
            enable_custom_filtering: false,
            is_sensor: false,
            enable_sensor_events: true,
            enable_contact_events: true,
            enable_hit_events: false,
            enable_pre_solve_events: false,
            invoke_contact_creation: true,
            update_body_mass: true,
        }
    }
}

impl ShapeDef {
    pub fn is_valid(&self) -> bool {
        self.density.is_finite()
            && self.density >= 0.0
            && self.material.friction.is_finite()
            && self.material.friction >= 0.0
            && self.material.restitution.is_finite()
            && self.material.restitution >= 0.0
            && self.material.rolling_resistance.is_finite()
            && self.material.rolling_resistance >= 0.0
            && self.material.tangent_speed.is_finite()
    }
}

/// The world's record of a shape.
#[derive(Debug, Clone)]
pub(crate) struct Shape {
    pub body: usize,
    pub generation: u16,
    pub geometry: ShapeGeometry,
    pub density: f32,
    pub material: SurfaceMaterial,
    pub filter: Filter,
    pub user_data: u64,
    /// Owning chain, for chain segments.
    pub chain: Option<usize>,

    /// Broad-phase proxy key, absent while the body is disabled.
    pub proxy_key: Option<usize>,
    /// Tight bounds at the current transform.
    pub aabb: AABB,
    /// Bounds stored in the broad-phase.
    pub fat_aabb: AABB,
    pub enlarged_aabb: bool,

    pub is_sensor: bool,
    /// Index in the world sensor list when this shape is a sensor.
    pub sensor_index: Option<usize>,
    pub enable_sensor_events: bool,
    pub enable_contact_events: bool,
    pub enable_custom_filtering: bool,
    pub enable_hit_events: bool,
    pub enable_pre_solve_events: bool,
}

impl Shape {
    pub fn new(body: usize, generation: u16, def: &ShapeDef, geometry: ShapeGeometry) -> Self {
        Self {
            body,
            generation,
            geometry,
            density: def.density,
            material: def.material,
            filter: def.filter,
            user_data: def.user_data,
            chain: None,
            proxy_key: None,
            aabb: AABB::default(),
            fat_aabb: AABB::default(),
            enlarged_aabb: false,
            is_sensor: def.is_sensor,
            sensor_index: None,
            enable_sensor_events: def.enable_sensor_events,
            enable_contact_events: def.enable_contact_events,
            enable_custom_filtering: def.enable_custom_filtering,
            enable_hit_events: def.enable_hit_events,
            enable_pre_solve_events: def.enable_pre_solve_events,
        }
    }

    pub fn compute_mass(&self) -> MassData {
        self.geometry.compute_mass(self.density)
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        self.geometry.compute_aabb(xf)
    }

    pub fn test_point(&self, xf: Transform, point: Vec2) -> bool {
        self.geometry.test_point(xf.apply_inverse(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Circle;

    #[test]
    fn test_shape_def_defaults_and_validation() {
        let def = ShapeDef::default();
        assert_eq!(def.density, 1.0);
        assert!(def.enable_contact_events && def.update_body_mass);
        assert!(!def.is_sensor);
        assert!(def.is_valid());

        let negative = ShapeDef {
            density: -1.0,
            ..Default::default()
        };
        assert!(!negative.is_valid());
    }

    #[test]
    fn test_shape_record_point_test() {
        let circle = Circle::new(Vec2::new(1.0, 0.0), 0.5);
        let shape = Shape::new(0, 0, &ShapeDef::default(), circle.into());
        let xf = Transform::new(Vec2::new(2.0, 0.0), crate::math::Rot::IDENTITY);
        assert!(shape.test_point(xf, Vec2::new(3.2, 0.0)));
        assert!(!shape.test_point(xf, Vec2::new(2.0, 0.0)));
    }
}
