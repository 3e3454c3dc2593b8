//! Body operations of the world.

use tracing::debug;

use super::def::ContactData;
use super::physics_world::PhysicsWorld;
use crate::collision::aabb::AABB;
use crate::common::{BodyId, JointId, PhysicsError, Result, ShapeId};
use crate::math::{Rot, Transform, Vec2};
use crate::objects::{Body, BodyDef, BodyType};
use crate::shapes::{combine_mass, MassData};

impl PhysicsWorld {
    // Lifecycle.

    /// Creates a rigid body. Dynamic bodies start in their own island.
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyId> {
        if !def.is_valid() {
            return Err(PhysicsError::InvalidDefinition("body definition"));
        }

        let (index, generation) = self.bodies.insert(Body::new(def, 0));
        let body = &mut self.bodies[index];
        body.generation = generation;
        if def.body_type == BodyType::Dynamic && body.enabled {
            self.create_island_for_body(index);
        }
        debug!(body = index, body_type = ?def.body_type, "body created");
        Ok(BodyId::new(index, self.world0(), generation))
    }

    /// Destroys a body with its shapes, chains, joints and contacts. Bodies
    /// touching it are woken.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;

        let joints = self.bodies[index].joints.clone();
        for joint_index in joints {
            self.destroy_joint_internal(joint_index, true);
        }

        self.destroy_body_contacts(index, None, true);

        let shapes = self.bodies[index].shapes.clone();
        for shape_index in shapes {
            self.destroy_shape_internal(shape_index, false);
        }

        let chains: Vec<usize> = self
            .chains
            .iter()
            .filter(|(_, chain)| chain.body == index)
            .map(|(i, _)| i)
            .collect();
        for chain_index in chains {
            self.chains.remove(chain_index);
        }

        self.remove_body_from_island(index);
        self.bodies.remove(index);
        debug!(body = index, "body destroyed");
        Ok(())
    }

    /// True while the handle refers to a live body of this world.
    pub fn body_is_valid(&self, id: BodyId) -> bool {
        self.body_index(id).is_ok()
    }

    // Type.

    pub fn body_type(&self, id: BodyId) -> Result<BodyType> {
        Ok(self.bodies[self.body_index(id)?].body_type)
    }

    /// Changes the body type. Contacts are rebuilt, islands relinked and
    /// the mass recomputed.
    pub fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> Result<()> {
        let index = self.body_index(id)?;
        if self.bodies[index].body_type == body_type {
            return Ok(());
        }

        self.destroy_body_contacts(index, None, true);

        let joints = self.bodies[index].joints.clone();
        for &joint_index in &joints {
            self.unlink_joint(joint_index);
        }
        self.remove_body_from_island(index);

        let enabled = {
            let body = &mut self.bodies[index];
            body.body_type = body_type;
            if body_type == BodyType::Static {
                body.awake = false;
                body.linear_velocity = Vec2::ZERO;
                body.angular_velocity = 0.0;
            } else {
                body.awake = true;
                body.sleep_time = 0.0;
            }
            body.enabled
        };

        if enabled {
            // The tree holding the proxy depends on the body type.
            let shapes = self.bodies[index].shapes.clone();
            for shape_index in shapes {
                self.destroy_shape_proxy(shape_index);
                self.create_shape_proxy(shape_index, true);
            }
            if body_type == BodyType::Dynamic {
                self.create_island_for_body(index);
            }
            for &joint_index in &joints {
                let joint = &self.joints[joint_index];
                let other = if joint.body_a == index { joint.body_b } else { joint.body_a };
                if self.bodies[other].enabled {
                    self.link_joint(joint_index);
                }
                self.wake_body(other);
            }
        }

        self.update_body_mass(index);
        Ok(())
    }

    // Transform.

    pub fn body_position(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].transform.p)
    }

    pub fn body_rotation(&self, id: BodyId) -> Result<Rot> {
        Ok(self.bodies[self.body_index(id)?].transform.q)
    }

    pub fn body_transform(&self, id: BodyId) -> Result<Transform> {
        Ok(self.bodies[self.body_index(id)?].transform)
    }

    /// Teleports a body. This wakes it and refreshes its broad-phase
    /// proxies; contacts are updated on the next step.
    pub fn set_body_transform(&mut self, id: BodyId, position: Vec2, rotation: Rot) -> Result<()> {
        let index = self.body_index(id)?;
        if !position.is_valid() || !rotation.is_valid() {
            return Err(PhysicsError::InvalidDefinition("body transform"));
        }
        let rotation = rotation.normalize();

        let body = &mut self.bodies[index];
        body.transform = Transform::new(position, rotation);
        body.center = body.transform.apply(body.local_center);
        body.center0 = body.center;
        body.rotation0 = rotation;

        if body.enabled {
            self.move_body_proxies(index);
        }
        self.wake_body(index);
        Ok(())
    }

    /// Sets velocities so that a kinematic or dynamic body reaches `target`
    /// after `time_step`. Useful for moving kinematic bodies along a path.
    pub fn set_body_target_transform(&mut self, id: BodyId, target: Transform, time_step: f32) -> Result<()> {
        let index = self.body_index(id)?;
        if time_step <= 0.0 || !target.is_valid() {
            return Ok(());
        }

        let body = &mut self.bodies[index];
        if body.is_static() {
            return Ok(());
        }
        let inv_time_step = 1.0 / time_step;
        let center2 = target.apply(body.local_center);
        let linear_velocity = inv_time_step * (center2 - body.center);
        let angular_velocity = inv_time_step * Rot::relative_angle(body.transform.q, target.q);
        body.linear_velocity = linear_velocity;
        body.angular_velocity = angular_velocity;

        if linear_velocity != Vec2::ZERO || angular_velocity != 0.0 {
            self.wake_body(index);
        }
        Ok(())
    }

    // Center of mass and point conversions.

    pub fn body_world_center_of_mass(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].center)
    }

    pub fn body_local_center_of_mass(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].local_center)
    }

    pub fn body_world_point(&self, id: BodyId, local_point: Vec2) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].transform.apply(local_point))
    }

    pub fn body_local_point(&self, id: BodyId, world_point: Vec2) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].transform.apply_inverse(world_point))
    }

    pub fn body_world_vector(&self, id: BodyId, local_vector: Vec2) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].transform.q.rotate(local_vector))
    }

    pub fn body_local_vector(&self, id: BodyId, world_vector: Vec2) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].transform.q.inv_rotate(world_vector))
    }

    /// Velocity of a point given in body coordinates.
    pub fn body_local_point_velocity(&self, id: BodyId, local_point: Vec2) -> Result<Vec2> {
        let body = &self.bodies[self.body_index(id)?];
        let r = body.transform.q.rotate(local_point - body.local_center);
        Ok(body.linear_velocity + Vec2::scalar_cross(body.angular_velocity, r))
    }

    /// Velocity of a point given in world coordinates.
    pub fn body_world_point_velocity(&self, id: BodyId, world_point: Vec2) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].point_velocity(world_point))
    }

    // Velocities.

    pub fn body_linear_velocity(&self, id: BodyId) -> Result<Vec2> {
        Ok(self.bodies[self.body_index(id)?].linear_velocity)
    }

    /// Sets the velocity of the center of mass. Ignored for static bodies.
    pub fn set_body_linear_velocity(&mut self, id: BodyId, velocity: Vec2) -> Result<()> {
        let index = self.body_index(id)?;
        if self.bodies[index].is_static() {
            return Ok(());
        }
        if velocity.length_squared() > 0.0 {
            self.wake_body(index);
        }
        self.bodies[index].linear_velocity = velocity;
        Ok(())
    }

    pub fn body_angular_velocity(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].angular_velocity)
    }

    pub fn set_body_angular_velocity(&mut self, id: BodyId, velocity: f32) -> Result<()> {
        let index = self.body_index(id)?;
        let body = &self.bodies[index];
        if body.is_static() || body.fixed_rotation {
            return Ok(());
        }
        if velocity != 0.0 {
            self.wake_body(index);
        }
        self.bodies[index].angular_velocity = velocity;
        Ok(())
    }

    // Forces and impulses. These only act on awake dynamic bodies; `wake`
    // wakes a sleeping body first.

    /// Resolves a dynamic body and wakes it on request. Returns `None` when
    /// the body should not receive the force.
    fn force_target(&mut self, id: BodyId, wake: bool) -> Result<Option<usize>> {
        let index = self.body_index(id)?;
        if !self.bodies[index].is_dynamic() {
            return Ok(None);
        }
        if wake && !self.bodies[index].awake {
            self.wake_body(index);
        }
        Ok(self.bodies[index].awake.then_some(index))
    }

    /// Applies a force at a world point.
    pub fn apply_force(&mut self, id: BodyId, force: Vec2, point: Vec2, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            let body = &mut self.bodies[index];
            body.force += force;
            body.torque += (point - body.center).cross(force);
        }
        Ok(())
    }

    pub fn apply_force_to_center(&mut self, id: BodyId, force: Vec2, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            self.bodies[index].force += force;
        }
        Ok(())
    }

    pub fn apply_torque(&mut self, id: BodyId, torque: f32, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            self.bodies[index].torque += torque;
        }
        Ok(())
    }

    /// Applies an impulse at a world point, changing the velocity at once.
    pub fn apply_linear_impulse(&mut self, id: BodyId, impulse: Vec2, point: Vec2, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            let body = &mut self.bodies[index];
            body.linear_velocity = Vec2::mul_add(body.linear_velocity, body.inv_mass, impulse);
            body.angular_velocity += body.inv_inertia * (point - body.center).cross(impulse);
        }
        Ok(())
    }

    pub fn apply_linear_impulse_to_center(&mut self, id: BodyId, impulse: Vec2, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            let body = &mut self.bodies[index];
            body.linear_velocity = Vec2::mul_add(body.linear_velocity, body.inv_mass, impulse);
        }
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, id: BodyId, impulse: f32, wake: bool) -> Result<()> {
        if let Some(index) = self.force_target(id, wake)? {
            let body = &mut self.bodies[index];
            body.angular_velocity += body.inv_inertia * impulse;
        }
        Ok(())
    }

    /// Clears the accumulated force and torque. The step clears them too.
    pub fn clear_body_forces(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;
        let body = &mut self.bodies[index];
        body.force = Vec2::ZERO;
        body.torque = 0.0;
        Ok(())
    }

    // Mass.

    pub fn body_mass(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].mass)
    }

    /// Rotational inertia about the center of mass.
    pub fn body_rotational_inertia(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].inertia)
    }

    pub fn body_mass_data(&self, id: BodyId) -> Result<MassData> {
        Ok(self.bodies[self.body_index(id)?].mass_data())
    }

    /// Overrides the mass computed from the shapes. The next shape change
    /// or [`apply_mass_from_shapes`](Self::apply_mass_from_shapes) replaces
    /// it again.
    pub fn set_body_mass_data(&mut self, id: BodyId, mass_data: MassData) -> Result<()> {
        let index = self.body_index(id)?;
        if !mass_data.mass.is_finite()
            || mass_data.mass < 0.0
            || !mass_data.rotational_inertia.is_finite()
            || mass_data.rotational_inertia < 0.0
            || !mass_data.center.is_valid()
        {
            return Err(PhysicsError::InvalidDefinition("mass data"));
        }
        self.bodies[index].set_mass_data(mass_data);
        self.update_body_extents(index);
        Ok(())
    }

    /// Recomputes the mass from the attached shapes.
    pub fn apply_mass_from_shapes(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;
        self.update_body_mass(index);
        Ok(())
    }

    /// Aggregates the mass of the shapes with positive density. Static and
    /// kinematic bodies are massless; kinematic bodies still get extents
    /// for continuous collision.
    pub(crate) fn update_body_mass(&mut self, body_index: usize) {
        let body = &mut self.bodies[body_index];
        let old_velocity = body.linear_velocity;
        body.reset_mass();
        body.linear_velocity = old_velocity;

        if body.body_type == BodyType::Dynamic {
            let parts: Vec<MassData> = body
                .shapes
                .iter()
                .map(|&s| &self.shapes[s])
                .filter(|shape| shape.density > 0.0)
                .map(|shape| shape.compute_mass())
                .collect();
            body.set_mass_data(combine_mass(&parts));
        }

        if body.body_type != BodyType::Static {
            self.update_body_extents(body_index);
        }
    }

    fn update_body_extents(&mut self, body_index: usize) {
        let body = &mut self.bodies[body_index];
        let mut min_extent = crate::common::constants::huge();
        let mut max_extent: f32 = 0.0;
        for &shape_index in &body.shapes {
            let extent = self.shapes[shape_index].geometry.extent(body.local_center);
            min_extent = min_extent.min(extent.min_extent);
            max_extent = max_extent.max(extent.max_extent);
        }
        body.min_extent = min_extent;
        body.max_extent = max_extent;
    }

    // Damping and gravity.

    pub fn body_linear_damping(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].linear_damping)
    }

    pub fn set_body_linear_damping(&mut self, id: BodyId, damping: f32) -> Result<()> {
        let index = self.body_index(id)?;
        if !damping.is_finite() || damping < 0.0 {
            return Err(PhysicsError::InvalidDefinition("linear damping"));
        }
        self.bodies[index].linear_damping = damping;
        Ok(())
    }

    pub fn body_angular_damping(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].angular_damping)
    }

    pub fn set_body_angular_damping(&mut self, id: BodyId, damping: f32) -> Result<()> {
        let index = self.body_index(id)?;
        if !damping.is_finite() || damping < 0.0 {
            return Err(PhysicsError::InvalidDefinition("angular damping"));
        }
        self.bodies[index].angular_damping = damping;
        Ok(())
    }

    pub fn body_gravity_scale(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].gravity_scale)
    }

    pub fn set_body_gravity_scale(&mut self, id: BodyId, scale: f32) -> Result<()> {
        let index = self.body_index(id)?;
        if !scale.is_finite() {
            return Err(PhysicsError::InvalidDefinition("gravity scale"));
        }
        self.bodies[index].gravity_scale = scale;
        Ok(())
    }

    // Sleep.

    pub fn body_is_awake(&self, id: BodyId) -> Result<bool> {
        Ok(self.bodies[self.body_index(id)?].awake)
    }

    /// Wakes a body with its island, or puts the island to sleep.
    pub fn set_body_awake(&mut self, id: BodyId, awake: bool) -> Result<()> {
        let index = self.body_index(id)?;
        if awake {
            self.wake_body(index);
            return Ok(());
        }

        let body = &self.bodies[index];
        if body.is_static() || !body.awake {
            return Ok(());
        }
        match body.island_id {
            Some(island_id) => {
                if self.islands[island_id].constraint_remove_count > 0 {
                    self.split_island(island_id);
                }
                if let Some(island_id) = self.bodies[index].island_id {
                    self.sleep_island(island_id);
                }
            }
            None => {
                let body = &mut self.bodies[index];
                body.awake = false;
                body.linear_velocity = Vec2::ZERO;
                body.angular_velocity = 0.0;
            }
        }
        Ok(())
    }

    /// Wakes every body this body is touching.
    pub fn wake_touching(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;
        let others: Vec<usize> = self.bodies[index]
            .contacts
            .iter()
            .map(|&c| &self.contacts[c])
            .filter(|contact| contact.touching)
            .map(|contact| if contact.body_a == index { contact.body_b } else { contact.body_a })
            .collect();
        for other in others {
            self.wake_body(other);
        }
        Ok(())
    }

    pub fn body_is_sleep_enabled(&self, id: BodyId) -> Result<bool> {
        Ok(self.bodies[self.body_index(id)?].enable_sleep)
    }

    /// Disabling sleep on a body wakes it and keeps its island awake.
    pub fn enable_body_sleep(&mut self, id: BodyId, flag: bool) -> Result<()> {
        let index = self.body_index(id)?;
        self.bodies[index].enable_sleep = flag;
        if !flag {
            self.wake_body(index);
        }
        Ok(())
    }

    pub fn body_sleep_threshold(&self, id: BodyId) -> Result<f32> {
        Ok(self.bodies[self.body_index(id)?].sleep_threshold)
    }

    pub fn set_body_sleep_threshold(&mut self, id: BodyId, threshold: f32) -> Result<()> {
        let index = self.body_index(id)?;
        self.bodies[index].sleep_threshold = threshold.max(0.0);
        Ok(())
    }

    // Enable state.

    pub fn body_is_enabled(&self, id: BodyId) -> Result<bool> {
        Ok(self.bodies[self.body_index(id)?].enabled)
    }

    /// Removes a body from the simulation without destroying it. Its
    /// contacts and proxies are dropped and its joints stop acting.
    pub fn disable_body(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;
        if !self.bodies[index].enabled {
            return Ok(());
        }

        self.destroy_body_contacts(index, None, true);
        let shapes = self.bodies[index].shapes.clone();
        for shape_index in shapes {
            self.destroy_shape_proxy(shape_index);
        }
        let joints = self.bodies[index].joints.clone();
        for joint_index in joints {
            self.unlink_joint(joint_index);
            let joint = &self.joints[joint_index];
            let other = if joint.body_a == index { joint.body_b } else { joint.body_a };
            self.wake_body(other);
        }
        self.remove_body_from_island(index);
        self.bodies[index].enabled = false;
        Ok(())
    }

    pub fn enable_body(&mut self, id: BodyId) -> Result<()> {
        let index = self.body_index(id)?;
        if self.bodies[index].enabled {
            return Ok(());
        }

        let body = &mut self.bodies[index];
        body.enabled = true;
        if !body.is_static() {
            body.awake = true;
            body.sleep_time = 0.0;
        }
        let shapes = body.shapes.clone();
        for shape_index in shapes {
            self.create_shape_proxy(shape_index, true);
        }
        if self.bodies[index].is_dynamic() {
            self.create_island_for_body(index);
        }
        let joints = self.bodies[index].joints.clone();
        for joint_index in joints {
            let joint = &self.joints[joint_index];
            let other = if joint.body_a == index { joint.body_b } else { joint.body_a };
            if self.bodies[other].enabled {
                self.link_joint(joint_index);
            }
        }
        Ok(())
    }

    // Flags.

    pub fn body_is_fixed_rotation(&self, id: BodyId) -> Result<bool> {
        Ok(self.bodies[self.body_index(id)?].fixed_rotation)
    }

    /// Locks the rotation. The angular velocity is cleared and the mass
    /// recomputed.
    pub fn set_body_fixed_rotation(&mut self, id: BodyId, flag: bool) -> Result<()> {
        let index = self.body_index(id)?;
        let body = &mut self.bodies[index];
        if body.fixed_rotation == flag {
            return Ok(());
        }
        body.fixed_rotation = flag;
        body.angular_velocity = 0.0;
        self.wake_body(index);
        self.update_body_mass(index);
        Ok(())
    }

    pub fn body_is_bullet(&self, id: BodyId) -> Result<bool> {
        Ok(self.bodies[self.body_index(id)?].is_bullet)
    }

    pub fn set_body_bullet(&mut self, id: BodyId, flag: bool) -> Result<()> {
        let index = self.body_index(id)?;
        self.bodies[index].is_bullet = flag;
        Ok(())
    }

    /// Sets the contact event flag on every shape of the body.
    pub fn enable_body_contact_events(&mut self, id: BodyId, flag: bool) -> Result<()> {
        let index = self.body_index(id)?;
        for &shape_index in &self.bodies[index].shapes {
            self.shapes[shape_index].enable_contact_events = flag;
        }
        Ok(())
    }

    /// Sets the hit event flag on every shape of the body.
    pub fn enable_body_hit_events(&mut self, id: BodyId, flag: bool) -> Result<()> {
        let index = self.body_index(id)?;
        for &shape_index in &self.bodies[index].shapes {
            self.shapes[shape_index].enable_hit_events = flag;
        }
        Ok(())
    }

    // User data and listings.

    pub fn body_name(&self, id: BodyId) -> Result<Option<&str>> {
        Ok(self.bodies[self.body_index(id)?].name.as_deref())
    }

    pub fn set_body_name(&mut self, id: BodyId, name: Option<&str>) -> Result<()> {
        let index = self.body_index(id)?;
        self.bodies[index].name = name.map(str::to_owned);
        Ok(())
    }

    pub fn body_user_data(&self, id: BodyId) -> Result<u64> {
        Ok(self.bodies[self.body_index(id)?].user_data)
    }

    pub fn set_body_user_data(&mut self, id: BodyId, user_data: u64) -> Result<()> {
        let index = self.body_index(id)?;
        self.bodies[index].user_data = user_data;
        Ok(())
    }

    /// Shapes of the body in creation order.
    pub fn body_shapes(&self, id: BodyId) -> Result<Vec<ShapeId>> {
        let index = self.body_index(id)?;
        Ok(self.bodies[index].shapes.iter().map(|&s| self.shape_id(s)).collect())
    }

    pub fn body_shape_count(&self, id: BodyId) -> Result<usize> {
        Ok(self.bodies[self.body_index(id)?].shapes.len())
    }

    pub fn body_joints(&self, id: BodyId) -> Result<Vec<JointId>> {
        let index = self.body_index(id)?;
        Ok(self.bodies[index].joints.iter().map(|&j| self.joint_id(j)).collect())
    }

    pub fn body_joint_count(&self, id: BodyId) -> Result<usize> {
        Ok(self.bodies[self.body_index(id)?].joints.len())
    }

    // Contacts.

    /// Upper bound on the number of contacts `body_contact_data` can
    /// report.
    pub fn body_contact_capacity(&self, id: BodyId) -> Result<usize> {
        Ok(self.bodies[self.body_index(id)?].contacts.len())
    }

    /// Writes the touching contacts of the body into `out` and returns how
    /// many were written. Size `out` with
    /// [`body_contact_capacity`](Self::body_contact_capacity).
    pub fn body_contact_data(&self, id: BodyId, out: &mut [ContactData]) -> Result<usize> {
        let index = self.body_index(id)?;
        let touching = self.bodies[index]
            .contacts
            .iter()
            .map(|&c| &self.contacts[c])
            .filter(|contact| contact.touching && contact.manifold.point_count > 0);

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

    /// Union of the tight bounds of the body's shapes. A body without
    /// shapes reports a point box at its origin.
    pub fn body_compute_aabb(&self, id: BodyId) -> Result<AABB> {
        let index = self.body_index(id)?;
        let body = &self.bodies[index];
        let bounds = body
            .shapes
            .iter()
            .map(|&s| self.shapes[s].compute_aabb(body.transform))
            .reduce(|a, b| a.union(&b));
        Ok(bounds.unwrap_or(AABB::new(body.transform.p, body.transform.p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ShapeDef;
    use crate::shapes::{make_box, make_offset_box, Circle};
    use crate::world::WorldDef;
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&WorldDef::default()).expect("world")
    }

    #[test]
    fn test_stale_body_handle_is_rejected() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        world.destroy_body(body).expect("destroy");
        assert!(!world.body_is_valid(body));
        assert_eq!(world.body_position(body), Err(PhysicsError::InvalidBody));

        let reused = world.create_body(&BodyDef::dynamic()).expect("reused");
        assert_eq!(reused.index1, body.index1);
        assert_ne!(reused.generation, body.generation);
        assert!(world.body_is_valid(reused));
        assert!(!world.body_is_valid(body));
    }

    #[test]
    fn test_mass_follows_shapes() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        world
            .create_shape(body, &ShapeDef::default(), make_offset_box(0.5, 0.5, Vec2::new(1.0, 0.0), Rot::IDENTITY))
            .expect("box");
        assert_relative_eq!(world.body_mass(body).expect("mass"), 1.0);
        assert_relative_eq!(world.body_local_center_of_mass(body).expect("center").x, 1.0);

        let circle = world
            .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::new(-1.0, 0.0), 0.5))
            .expect("circle");
        let mass = 1.0 + std::f32::consts::PI * 0.25;
        assert_relative_eq!(world.body_mass(body).expect("mass"), mass, epsilon = 1e-5);

        world.destroy_shape(circle, true).expect("destroy");
        assert_relative_eq!(world.body_mass(body).expect("mass"), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_impulse_changes_velocity() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");

        world
            .apply_linear_impulse_to_center(body, Vec2::new(2.0, 0.0), true)
            .expect("impulse");
        assert_relative_eq!(world.body_linear_velocity(body).expect("v").x, 2.0);

        world
            .apply_linear_impulse(body, Vec2::new(0.0, 1.0), Vec2::new(0.5, 0.0), true)
            .expect("impulse");
        assert!(world.body_angular_velocity(body).expect("w") > 0.0);
    }

    #[test]
    fn test_static_body_ignores_velocity() {
        let mut world = world();
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        world
            .set_body_linear_velocity(ground, Vec2::new(1.0, 0.0))
            .expect("velocity");
        assert_eq!(world.body_linear_velocity(ground).expect("v"), Vec2::ZERO);
        assert!(!world.body_is_awake(ground).expect("awake"));
    }

    #[test]
    fn test_point_conversions() {
        let mut world = world();
        let body = world
            .create_body(&BodyDef {
                position: Vec2::new(1.0, 2.0),
                rotation: Rot::from_angle(std::f32::consts::FRAC_PI_2),
                ..BodyDef::dynamic()
            })
            .expect("body");
        let world_point = world.body_world_point(body, Vec2::new(1.0, 0.0)).expect("point");
        assert_relative_eq!(world_point.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(world_point.y, 3.0, epsilon = 1e-6);
        let local = world.body_local_point(body, world_point).expect("local");
        assert_relative_eq!(local.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_disable_and_enable_body() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape");

        world.disable_body(body).expect("disable");
        assert!(!world.body_is_enabled(body).expect("enabled"));
        assert!(world.shapes[shape.index()].proxy_key.is_none());
        assert_eq!(world.awake_body_count(), 0);

        world.enable_body(body).expect("enable");
        assert!(world.shapes[shape.index()].proxy_key.is_some());
        assert_eq!(world.awake_body_count(), 1);
    }

    #[test]
    fn test_set_type_moves_proxy_tree() {
        let mut world = world();
        let body = world.create_body(&BodyDef::default()).expect("body");
        world
            .create_shape(body, &ShapeDef::default(), make_box(1.0, 1.0))
            .expect("box");
        assert_eq!(world.body_mass(body).expect("mass"), 0.0);

        world.set_body_type(body, BodyType::Dynamic).expect("type");
        assert_relative_eq!(world.body_mass(body).expect("mass"), 4.0);
        assert!(world.body_is_awake(body).expect("awake"));
        assert!(world.bodies[body.index()].island_id.is_some());
    }

    #[test]
    fn test_target_transform_sets_velocity() {
        let mut world = world();
        let body = world
            .create_body(&BodyDef {
                body_type: BodyType::Kinematic,
                ..Default::default()
            })
            .expect("body");
        let target = Transform::new(Vec2::new(1.0, 0.0), Rot::IDENTITY);
        world.set_body_target_transform(body, target, 0.5).expect("target");
        assert_relative_eq!(world.body_linear_velocity(body).expect("v").x, 2.0);
    }
}
