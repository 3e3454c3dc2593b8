//! Shape operations of the world.

use tracing::debug;

use super::def::ContactData;
use super::physics_world::PhysicsWorld;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput};
use crate::collision::distance::{make_proxy, shape_distance, DistanceInput, SimplexCache};
use crate::common::constants::linear_slop;
use crate::common::{BodyId, ChainId, Filter, PhysicsError, Result, ShapeId, SurfaceMaterial};
use crate::math::{Transform, Vec2};
use crate::objects::{Shape, ShapeDef};
use crate::shapes::{make_capsule, MassData, ShapeGeometry, ShapeType};

/// Rejects geometry that would produce NaN in the solver.
fn validate_geometry(geometry: &ShapeGeometry) -> Result<()> {
    match geometry {
        ShapeGeometry::Circle(circle) => {
            if !circle.center.is_valid() || !(circle.radius > 0.0) || !circle.radius.is_finite() {
                return Err(PhysicsError::DegenerateGeometry("circle radius must be positive"));
            }
        }
        ShapeGeometry::Capsule(capsule) => {
            if !(capsule.radius > 0.0) || !capsule.radius.is_finite() {
                return Err(PhysicsError::DegenerateGeometry("capsule radius must be positive"));
            }
            if !(capsule.length() > linear_slop()) {
                return Err(PhysicsError::DegenerateGeometry("capsule is too short"));
            }
        }
        ShapeGeometry::Segment(segment) => {
            if !(segment.length() > linear_slop()) {
                return Err(PhysicsError::DegenerateGeometry("segment is too short"));
            }
        }
        ShapeGeometry::Polygon(polygon) => {
            if polygon.count < 3 || !(polygon.radius >= 0.0) || !polygon.vertices().iter().all(|v| v.is_valid()) {
                return Err(PhysicsError::DegenerateGeometry("polygon needs three valid vertices"));
            }
        }
        ShapeGeometry::ChainSegment(chain) => {
            if !(chain.segment.length() > linear_slop()) {
                return Err(PhysicsError::DegenerateGeometry("chain segment is too short"));
            }
        }
    }
    Ok(())
}

impl PhysicsWorld {
    // Lifecycle.

    /// Attaches a shape to a body. The body mass is updated when the
    /// definition asks for it.
    pub fn create_shape(&mut self, body: BodyId, def: &ShapeDef, geometry: impl Into<ShapeGeometry>) -> Result<ShapeId> {
        let body_index = self.body_index(body)?;
        let geometry = geometry.into();
        if geometry.shape_type() == ShapeType::ChainSegment {
            return Err(PhysicsError::InvalidDefinition("chain segments are created through chains"));
        }
        if !def.is_valid() {
            return Err(PhysicsError::InvalidDefinition("shape definition"));
        }
        validate_geometry(&geometry)?;

        let index = self.create_shape_internal(body_index, def, geometry, None);
        if def.update_body_mass {
            self.update_body_mass(body_index);
        }
        Ok(self.shape_id(index))
    }

    pub(crate) fn create_shape_internal(
        &mut self,
        body_index: usize,
        def: &ShapeDef,
        geometry: ShapeGeometry,
        chain: Option<usize>,
    ) -> usize {
        let (index, generation) = self.shapes.insert(Shape::new(body_index, 0, def, geometry));
        let shape = &mut self.shapes[index];
        shape.generation = generation;
        shape.chain = chain;

        let body = &mut self.bodies[body_index];
        body.shapes.push(index);
        let enabled = body.enabled;
        if enabled {
            self.create_shape_proxy(index, def.invoke_contact_creation);
        } else {
            let transform = self.bodies[body_index].transform;
            let shape = &mut self.shapes[index];
            shape.aabb = shape.compute_aabb(transform);
            shape.fat_aabb = shape.aabb;
        }
        if def.is_sensor {
            self.create_sensor(index);
        }
        index
    }

    /// Destroys a shape. Chain segments belong to their chain and are
    /// rejected.
    pub fn destroy_shape(&mut self, id: ShapeId, update_body_mass: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        if self.shapes[index].chain.is_some() {
            return Err(PhysicsError::InvalidShape);
        }
        let body_index = self.shapes[index].body;
        self.destroy_shape_internal(index, true);
        if update_body_mass {
            self.update_body_mass(body_index);
        }
        Ok(())
    }

    pub(crate) fn destroy_shape_internal(&mut self, shape_index: usize, wake_bodies: bool) {
        let body_index = self.shapes[shape_index].body;
        let contacts: Vec<usize> = self.bodies[body_index]
            .contacts
            .iter()
            .copied()
            .filter(|&c| {
                let contact = &self.contacts[c];
                contact.shape_a == shape_index || contact.shape_b == shape_index
            })
            .collect();
        for contact_index in contacts {
            self.destroy_contact(contact_index, wake_bodies);
        }

        if self.shapes[shape_index].is_sensor {
            self.destroy_sensor(shape_index);
        } else {
            self.remove_sensor_visitor(shape_index);
        }
        self.destroy_shape_proxy(shape_index);

        let shapes = &mut self.bodies[body_index].shapes;
        if let Some(position) = shapes.iter().position(|&s| s == shape_index) {
            shapes.remove(position);
        }
        self.shapes.remove(shape_index);
        debug!(shape = shape_index, body = body_index, "shape destroyed");
    }

    pub fn shape_is_valid(&self, id: ShapeId) -> bool {
        self.shape_index(id).is_ok()
    }

    /// Destroys the contacts of a shape and re-inserts its proxy so pairs
    /// are found again with the current filter and geometry.
    fn reset_shape_proxy(&mut self, shape_index: usize) {
        let body_index = self.shapes[shape_index].body;
        let contacts: Vec<usize> = self.bodies[body_index]
            .contacts
            .iter()
            .copied()
            .filter(|&c| {
                let contact = &self.contacts[c];
                contact.shape_a == shape_index || contact.shape_b == shape_index
            })
            .collect();
        for contact_index in contacts {
            self.destroy_contact(contact_index, true);
        }

        if self.shapes[shape_index].proxy_key.is_some() {
            self.destroy_shape_proxy(shape_index);
            self.create_shape_proxy(shape_index, true);
        } else {
            let transform = self.bodies[body_index].transform;
            let shape = &mut self.shapes[shape_index];
            shape.aabb = shape.compute_aabb(transform);
        }
        self.wake_body(body_index);
    }

    // Properties.

    pub fn shape_type(&self, id: ShapeId) -> Result<ShapeType> {
        Ok(self.shapes[self.shape_index(id)?].geometry.shape_type())
    }

    pub fn shape_body(&self, id: ShapeId) -> Result<BodyId> {
        let index = self.shape_index(id)?;
        Ok(self.body_id(self.shapes[index].body))
    }

    /// The chain owning a chain segment.
    pub fn shape_parent_chain(&self, id: ShapeId) -> Result<Option<ChainId>> {
        let index = self.shape_index(id)?;
        Ok(self.shapes[index].chain.map(|c| self.chain_id(c)))
    }

    pub fn shape_is_sensor(&self, id: ShapeId) -> Result<bool> {
        Ok(self.shapes[self.shape_index(id)?].is_sensor)
    }

    pub fn shape_user_data(&self, id: ShapeId) -> Result<u64> {
        Ok(self.shapes[self.shape_index(id)?].user_data)
    }

    pub fn set_shape_user_data(&mut self, id: ShapeId, user_data: u64) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].user_data = user_data;
        Ok(())
    }

    pub fn shape_density(&self, id: ShapeId) -> Result<f32> {
        Ok(self.shapes[self.shape_index(id)?].density)
    }

    pub fn set_shape_density(&mut self, id: ShapeId, density: f32, update_body_mass: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        if !density.is_finite() || density < 0.0 {
            return Err(PhysicsError::InvalidDefinition("density"));
        }
        self.shapes[index].density = density;
        if update_body_mass {
            self.update_body_mass(self.shapes[index].body);
        }
        Ok(())
    }

    pub fn shape_friction(&self, id: ShapeId) -> Result<f32> {
        Ok(self.shapes[self.shape_index(id)?].material.friction)
    }

    /// Applies to contacts created afterwards.
    pub fn set_shape_friction(&mut self, id: ShapeId, friction: f32) -> Result<()> {
        let index = self.shape_index(id)?;
        if !friction.is_finite() || friction < 0.0 {
            return Err(PhysicsError::InvalidDefinition("friction"));
        }
        self.shapes[index].material.friction = friction;
        Ok(())
    }

    pub fn shape_restitution(&self, id: ShapeId) -> Result<f32> {
        Ok(self.shapes[self.shape_index(id)?].material.restitution)
    }

    /// Applies to contacts created afterwards.
    pub fn set_shape_restitution(&mut self, id: ShapeId, restitution: f32) -> Result<()> {
        let index = self.shape_index(id)?;
        if !restitution.is_finite() || restitution < 0.0 {
            return Err(PhysicsError::InvalidDefinition("restitution"));
        }
        self.shapes[index].material.restitution = restitution;
        Ok(())
    }

    pub fn shape_user_material(&self, id: ShapeId) -> Result<u64> {
        Ok(self.shapes[self.shape_index(id)?].material.user_material_id)
    }

    pub fn set_shape_user_material(&mut self, id: ShapeId, material: u64) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].material.user_material_id = material;
        Ok(())
    }

    pub fn shape_surface_material(&self, id: ShapeId) -> Result<SurfaceMaterial> {
        Ok(self.shapes[self.shape_index(id)?].material)
    }

    pub fn set_shape_surface_material(&mut self, id: ShapeId, material: SurfaceMaterial) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].material = material;
        Ok(())
    }

    pub fn shape_filter(&self, id: ShapeId) -> Result<Filter> {
        Ok(self.shapes[self.shape_index(id)?].filter)
    }

    /// Changes the collision filter. Existing contacts of the shape are
    /// destroyed and rebuilt on the next step.
    pub fn set_shape_filter(&mut self, id: ShapeId, filter: Filter) -> Result<()> {
        let index = self.shape_index(id)?;
        if self.shapes[index].filter == filter {
            return Ok(());
        }
        self.shapes[index].filter = filter;
        self.reset_shape_proxy(index);
        Ok(())
    }

    pub fn shape_is_sensor_events_enabled(&self, id: ShapeId) -> Result<bool> {
        Ok(self.shapes[self.shape_index(id)?].enable_sensor_events)
    }

    pub fn enable_shape_sensor_events(&mut self, id: ShapeId, flag: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].enable_sensor_events = flag;
        Ok(())
    }

    pub fn shape_is_contact_events_enabled(&self, id: ShapeId) -> Result<bool> {
        Ok(self.shapes[self.shape_index(id)?].enable_contact_events)
    }

    pub fn enable_shape_contact_events(&mut self, id: ShapeId, flag: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].enable_contact_events = flag;
        Ok(())
    }

    pub fn shape_is_pre_solve_events_enabled(&self, id: ShapeId) -> Result<bool> {
        Ok(self.shapes[self.shape_index(id)?].enable_pre_solve_events)
    }

    pub fn enable_shape_pre_solve_events(&mut self, id: ShapeId, flag: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].enable_pre_solve_events = flag;
        Ok(())
    }

    pub fn shape_is_hit_events_enabled(&self, id: ShapeId) -> Result<bool> {
        Ok(self.shapes[self.shape_index(id)?].enable_hit_events)
    }

    pub fn enable_shape_hit_events(&mut self, id: ShapeId, flag: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        self.shapes[index].enable_hit_events = flag;
        Ok(())
    }

    // Geometry.

    pub fn shape_geometry(&self, id: ShapeId) -> Result<ShapeGeometry> {
        Ok(self.shapes[self.shape_index(id)?].geometry)
    }

    /// Replaces the geometry of a shape, resetting its contacts and the
    /// body mass.
    pub fn set_shape_geometry(&mut self, id: ShapeId, geometry: impl Into<ShapeGeometry>) -> Result<()> {
        let index = self.shape_index(id)?;
        let geometry = geometry.into();
        if self.shapes[index].chain.is_some() || geometry.shape_type() == ShapeType::ChainSegment {
            return Err(PhysicsError::InvalidShape);
        }
        validate_geometry(&geometry)?;

        self.shapes[index].geometry = geometry;
        self.reset_shape_proxy(index);
        self.update_body_mass(self.shapes[index].body);
        Ok(())
    }

    /// Tests a world point for containment.
    pub fn shape_test_point(&self, id: ShapeId, point: Vec2) -> Result<bool> {
        let shape = &self.shapes[self.shape_index(id)?];
        Ok(shape.test_point(self.bodies[shape.body].transform, point))
    }

    /// Casts a world space ray against one shape. The output is in world
    /// space.
    pub fn shape_ray_cast(&self, id: ShapeId, input: &RayCastInput) -> Result<CastOutput> {
        let shape = &self.shapes[self.shape_index(id)?];
        let transform = self.bodies[shape.body].transform;
        let local_input = RayCastInput {
            origin: transform.apply_inverse(input.origin),
            translation: transform.q.inv_rotate(input.translation),
            max_fraction: input.max_fraction,
        };
        let mut output = shape.geometry.ray_cast(&local_input);
        if output.hit {
            output.point = transform.apply(output.point);
            output.normal = transform.q.rotate(output.normal);
        }
        Ok(output)
    }

    /// Tight world bounds as of the last step or teleport.
    pub fn shape_aabb(&self, id: ShapeId) -> Result<AABB> {
        Ok(self.shapes[self.shape_index(id)?].aabb)
    }

    pub fn shape_mass_data(&self, id: ShapeId) -> Result<MassData> {
        Ok(self.shapes[self.shape_index(id)?].compute_mass())
    }

    /// Closest point on the shape surface to a world point. Points inside
    /// the shape return the point itself.
    pub fn shape_closest_point(&self, id: ShapeId, target: Vec2) -> Result<Vec2> {
        let shape = &self.shapes[self.shape_index(id)?];
        let input = DistanceInput {
            proxy_a: shape.geometry.make_proxy(),
            proxy_b: make_proxy(&[target], 0.0),
            transform_a: self.bodies[shape.body].transform,
            transform_b: Transform::IDENTITY,
            use_radii: true,
        };
        let mut cache = SimplexCache::default();
        let output = shape_distance(&input, &mut cache, None);
        Ok(output.point_a)
    }

    // Contacts and sensor overlaps.

    pub fn shape_contact_capacity(&self, id: ShapeId) -> Result<usize> {
        let index = self.shape_index(id)?;
        let body = &self.bodies[self.shapes[index].body];
        Ok(body
            .contacts
            .iter()
            .filter(|&&c| {
                let contact = &self.contacts[c];
                contact.shape_a == index || contact.shape_b == index
            })
            .count())
    }

    /// Writes the touching contacts of the shape into `out` and returns how
    /// many were written.
    pub fn shape_contact_data(&self, id: ShapeId, out: &mut [ContactData]) -> Result<usize> {
        let index = self.shape_index(id)?;
        let body = &self.bodies[self.shapes[index].body];
        let touching = body
            .contacts
            .iter()
            .map(|&c| &self.contacts[c])
            .filter(|contact| {
                (contact.shape_a == index || contact.shape_b == index)
                    && contact.touching
                    && contact.manifold.point_count > 0
            });

        let mut count = 0;
        for (slot, contact) in out.iter_mut().zip(touching) {
            *slot = ContactData {
                shape_id_a: self.shape_id(contact.shape_a),
                shape_id_b: self.shape_id(contact.shape_b),
                manifold: contact.manifold,
            };
            count += 1;
        }
        Ok(count)
    }

    /// Number of shapes overlapping a sensor. Zero for other shapes.
    pub fn shape_sensor_capacity(&self, id: ShapeId) -> Result<usize> {
        let index = self.shape_index(id)?;
        Ok(self.shapes[index]
            .sensor_index
            .map_or(0, |s| self.sensors[s].overlaps.len()))
    }

    /// Shapes overlapping a sensor after the last step, sorted by id.
    pub fn shape_sensor_overlaps(&self, id: ShapeId) -> Result<Vec<ShapeId>> {
        let index = self.shape_index(id)?;
        Ok(self.shapes[index]
            .sensor_index
            .map_or_else(Vec::new, |s| self.sensors[s].overlaps.clone()))
    }

    /// Copies the sensor overlaps into `out` and returns how many were
    /// written.
    pub fn shape_sensor_overlap_data(&self, id: ShapeId, out: &mut [ShapeId]) -> Result<usize> {
        let index = self.shape_index(id)?;
        let Some(sensor_index) = self.shapes[index].sensor_index else {
            return Ok(0);
        };
        let overlaps = &self.sensors[sensor_index].overlaps;
        let count = overlaps.len().min(out.len());
        out[..count].copy_from_slice(&overlaps[..count]);
        Ok(count)
    }

    /// Applies air drag and lift to a shape on a dynamic body. `wind` is
    /// the air velocity; drag acts along the relative air flow and lift
    /// across it, both scaled by the exposed width of each face.
    pub fn shape_apply_wind(&mut self, id: ShapeId, wind: Vec2, drag: f32, lift: f32, wake: bool) -> Result<()> {
        let index = self.shape_index(id)?;
        let body_index = self.shapes[index].body;
        if !self.bodies[body_index].is_dynamic() {
            return Ok(());
        }
        if wake && !self.bodies[body_index].awake {
            self.wake_body(body_index);
        }
        if !self.bodies[body_index].awake {
            return Ok(());
        }

        let shape = &self.shapes[index];
        let body = &self.bodies[body_index];
        let transform = body.transform;

        // (application point, force) pairs
        let mut forces = Vec::new();
        match shape.geometry {
            ShapeGeometry::Circle(circle) => {
                let centroid = transform.apply(circle.center);
                let relative = wind - body.point_velocity(centroid);
                let (speed, _) = relative.length_and_normalize();
                let force = (drag * 2.0 * circle.radius * speed) * relative;
                forces.push((centroid, force));
            }
            geometry => {
                let outline = match geometry {
                    ShapeGeometry::Capsule(c) => make_capsule(c.center1, c.center2, c.radius),
                    ShapeGeometry::Polygon(p) => p,
                    ShapeGeometry::Segment(s) => make_capsule(s.point1, s.point2, 0.0),
                    ShapeGeometry::ChainSegment(s) => make_capsule(s.segment.point1, s.segment.point2, 0.0),
                    ShapeGeometry::Circle(_) => return Ok(()),
                };
                let vertices = outline.vertices();
                for (i, &v1) in vertices.iter().enumerate() {
                    let v2 = vertices[(i + 1) % vertices.len()];
                    let p1 = transform.apply(v1);
                    let p2 = transform.apply(v2);
                    let (length, tangent) = (p2 - p1).length_and_normalize();
                    if length == 0.0 {
                        continue;
                    }
                    let normal = tangent.right_perp();
                    let mid = Vec2::lerp(p1, p2, 0.5);
                    let relative = wind - body.point_velocity(mid);
                    let (speed, direction) = relative.length_and_normalize();
                    let facing = -normal.dot(direction);
                    if facing <= 0.0 {
                        continue;
                    }
                    let pressure = length * facing * speed * speed;
                    let drag_force = (drag * pressure) * direction;
                    let across = normal + facing * direction;
                    let lift_force = (-lift * pressure) * across;
                    forces.push((mid, drag_force + lift_force));
                }
            }
        }

        let body = &mut self.bodies[body_index];
        for (point, force) in forces {
            body.force += force;
            body.torque += (point - body.center).cross(force);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;
    use crate::objects::BodyDef;
    use crate::shapes::{make_box, Capsule, Circle, Segment};
    use crate::world::WorldDef;
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&WorldDef::default()).expect("world")
    }

    #[test]
    fn test_degenerate_geometry_is_rejected() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let def = ShapeDef::default();
        assert!(matches!(
            world.create_shape(body, &def, Circle::new(Vec2::ZERO, 0.0)),
            Err(PhysicsError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            world.create_shape(body, &def, Capsule::new(Vec2::ZERO, Vec2::ZERO, 0.5)),
            Err(PhysicsError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            world.create_shape(body, &def, Segment::new(Vec2::ZERO, Vec2::ZERO)),
            Err(PhysicsError::DegenerateGeometry(_))
        ));
        assert_eq!(world.body_shape_count(body).expect("count"), 0);
    }

    #[test]
    fn test_stale_shape_handle() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("shape");
        world.destroy_shape(shape, true).expect("destroy");
        assert!(!world.shape_is_valid(shape));
        assert_eq!(world.shape_density(shape), Err(PhysicsError::InvalidShape));
        assert_eq!(world.body_mass(body).expect("mass"), 0.0);
    }

    #[test]
    fn test_ray_cast_single_shape() {
        let mut world = world();
        let body = world
            .create_body(&BodyDef {
                position: Vec2::new(5.0, 0.0),
                ..Default::default()
            })
            .expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), make_box(1.0, 1.0))
            .expect("shape");

        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(10.0, 0.0));
        let output = world.shape_ray_cast(shape, &input).expect("cast");
        assert!(output.hit);
        assert_relative_eq!(output.point.x, 4.0, epsilon = 1e-4);
        assert_relative_eq!(output.normal.x, -1.0, epsilon = 1e-4);
        assert_relative_eq!(output.fraction, 0.4, epsilon = 1e-4);
    }

    #[test]
    fn test_closest_point_and_test_point() {
        let mut world = world();
        let body = world.create_body(&BodyDef::default()).expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::ZERO, 1.0))
            .expect("shape");
        let closest = world.shape_closest_point(shape, Vec2::new(3.0, 0.0)).expect("closest");
        assert_relative_eq!(closest.x, 1.0, epsilon = 1e-4);
        assert!(world.shape_test_point(shape, Vec2::new(0.5, 0.5)).expect("inside"));
        assert!(!world.shape_test_point(shape, Vec2::new(1.5, 0.0)).expect("outside"));
    }

    #[test]
    fn test_filter_change_drops_contacts() {
        let mut world = world();
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        world
            .create_shape(ground, &ShapeDef::default(), make_box(5.0, 0.5))
            .expect("ground");
        let body = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 0.9),
                ..BodyDef::dynamic()
            })
            .expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.shape_contact_capacity(shape).expect("capacity"), 1);

        let filter = Filter {
            mask_bits: 0,
            ..Default::default()
        };
        world.set_shape_filter(shape, filter).expect("filter");
        assert_eq!(world.shape_contact_capacity(shape).expect("capacity"), 0);
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.shape_contact_capacity(shape).expect("capacity"), 0);
    }

    #[test]
    fn test_wind_pushes_box() {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");
        world
            .shape_apply_wind(shape, Vec2::new(10.0, 0.0), 1.0, 0.0, true)
            .expect("wind");
        world.step(1.0 / 60.0, 4);
        let v = world.body_linear_velocity(body).expect("v");
        assert!(v.x > 0.0);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-4);
        let _ = Rot::IDENTITY;
    }
}
