//! Joint operations of the world.

use tracing::debug;

use super::physics_world::PhysicsWorld;
use crate::common::{BodyId, JointId, PhysicsError, Result};
use crate::constraints::{
    DistanceJoint, DistanceJointDef, FilterJointDef, Joint, JointDefBase, JointKind, JointType, MotorJoint,
    MotorJointDef, MouseJoint, MouseJointDef, PrismaticJoint, PrismaticJointDef, RevoluteJoint, RevoluteJointDef,
    WeldJoint, WeldJointDef, WheelJoint, WheelJointDef,
};
use crate::math::{Rot, Vec2};

/// Typed access to the joint data. The mutable accessor wakes the attached
/// bodies so that changes take effect.
macro_rules! typed_joint_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, id: JointId) -> Result<&$ty> {
            let index = self.joint_index(id)?;
            match &self.joints[index].kind {
                JointKind::$variant(joint) => Ok(joint),
                _ => Err(PhysicsError::InvalidJoint),
            }
        }

        pub fn $get_mut(&mut self, id: JointId) -> Result<&mut $ty> {
            let index = self.joint_index(id)?;
            if !matches!(self.joints[index].kind, JointKind::$variant(_)) {
                return Err(PhysicsError::InvalidJoint);
            }
            self.wake_joint_bodies(index);
            match &mut self.joints[index].kind {
                JointKind::$variant(joint) => Ok(joint),
                _ => Err(PhysicsError::InvalidJoint),
            }
        }
    };
}

impl PhysicsWorld {
    // Creation.

    fn create_joint(&mut self, def: &JointDefBase, kind: JointKind) -> Result<JointId> {
        let body_a = self.body_index(def.body_a)?;
        let body_b = self.body_index(def.body_b)?;
        if body_a == body_b {
            return Err(PhysicsError::SelfJoint);
        }
        if !def.local_anchor_a.is_valid() || !def.local_anchor_b.is_valid() {
            return Err(PhysicsError::InvalidDefinition("joint anchors"));
        }
        if !(def.force_threshold >= 0.0) || !(def.torque_threshold >= 0.0) {
            return Err(PhysicsError::InvalidDefinition("joint thresholds"));
        }

        let joint_type = kind.joint_type();
        let (index, generation) = self.joints.insert(Joint::new(def, body_a, body_b, 0, kind));
        self.joints[index].generation = generation;
        self.bodies[body_a].joints.push(index);
        self.bodies[body_b].joints.push(index);

        if !def.collide_connected {
            self.destroy_body_contacts(body_a, Some(body_b), false);
        }

        // A joint to an awake body wakes the other side.
        if self.bodies[body_a].awake || self.bodies[body_b].awake {
            self.wake_body(body_a);
            self.wake_body(body_b);
        }
        self.link_joint(index);

        debug!(joint = index, ?joint_type, body_a, body_b, "joint created");
        Ok(self.joint_id(index))
    }

    pub fn create_distance_joint(&mut self, def: &DistanceJointDef) -> Result<JointId> {
        if !def.length.is_finite() || def.length < 0.0 {
            return Err(PhysicsError::InvalidDefinition("distance joint length"));
        }
        self.create_joint(&def.base, JointKind::Distance(DistanceJoint::new(def)))
    }

    pub fn create_filter_joint(&mut self, def: &FilterJointDef) -> Result<JointId> {
        self.create_joint(&def.base, JointKind::Filter)
    }

    pub fn create_motor_joint(&mut self, def: &MotorJointDef) -> Result<JointId> {
        if !def.linear_offset.is_valid() || !def.angular_offset.is_finite() {
            return Err(PhysicsError::InvalidDefinition("motor joint offsets"));
        }
        self.create_joint(&def.base, JointKind::Motor(MotorJoint::new(def)))
    }

    pub fn create_mouse_joint(&mut self, def: &MouseJointDef) -> Result<JointId> {
        if !def.target.is_valid() || !(def.hertz >= 0.0) || !(def.max_force >= 0.0) {
            return Err(PhysicsError::InvalidDefinition("mouse joint"));
        }
        self.create_joint(&def.base, JointKind::Mouse(MouseJoint::new(def)))
    }

    pub fn create_prismatic_joint(&mut self, def: &PrismaticJointDef) -> Result<JointId> {
        if !def.local_axis_a.is_valid() || def.local_axis_a.length() == 0.0 {
            return Err(PhysicsError::InvalidDefinition("prismatic joint axis"));
        }
        self.create_joint(&def.base, JointKind::Prismatic(PrismaticJoint::new(def)))
    }

    pub fn create_revolute_joint(&mut self, def: &RevoluteJointDef) -> Result<JointId> {
        if !def.reference_angle.is_finite() {
            return Err(PhysicsError::InvalidDefinition("revolute joint reference angle"));
        }
        self.create_joint(&def.base, JointKind::Revolute(RevoluteJoint::new(def)))
    }

    pub fn create_weld_joint(&mut self, def: &WeldJointDef) -> Result<JointId> {
        if !def.reference_angle.is_finite() {
            return Err(PhysicsError::InvalidDefinition("weld joint reference angle"));
        }
        self.create_joint(&def.base, JointKind::Weld(WeldJoint::new(def)))
    }

    pub fn create_wheel_joint(&mut self, def: &WheelJointDef) -> Result<JointId> {
        if !def.local_axis_a.is_valid() || def.local_axis_a.length() == 0.0 {
            return Err(PhysicsError::InvalidDefinition("wheel joint axis"));
        }
        self.create_joint(&def.base, JointKind::Wheel(WheelJoint::new(def)))
    }

    // Destruction.

    pub fn destroy_joint(&mut self, id: JointId) -> Result<()> {
        let index = self.joint_index(id)?;
        self.destroy_joint_internal(index, true);
        Ok(())
    }

    pub(crate) fn destroy_joint_internal(&mut self, joint_index: usize, wake_bodies: bool) {
        self.unlink_joint(joint_index);
        let Some(joint) = self.joints.remove(joint_index) else {
            return;
        };

        for body_index in [joint.body_a, joint.body_b] {
            let joints = &mut self.bodies[body_index].joints;
            if let Some(position) = joints.iter().position(|&j| j == joint_index) {
                joints.remove(position);
            }
        }

        if wake_bodies {
            self.wake_body(joint.body_a);
            self.wake_body(joint.body_b);
        }

        // The pair may collide again.
        if !joint.collide_connected {
            self.buffer_body_proxies(joint.body_a);
        }
        debug!(joint = joint_index, "joint destroyed");
    }

    /// Queues the proxies of a body for pair finding on the next step.
    fn buffer_body_proxies(&mut self, body_index: usize) {
        for &shape_index in &self.bodies[body_index].shapes {
            if let Some(key) = self.shapes[shape_index].proxy_key {
                self.broad_phase.buffer_move(key);
            }
        }
    }

    fn wake_joint_bodies(&mut self, joint_index: usize) {
        let joint = &self.joints[joint_index];
        let (a, b) = (joint.body_a, joint.body_b);
        self.wake_body(a);
        self.wake_body(b);
    }

    // Common accessors.

    pub fn joint_is_valid(&self, id: JointId) -> bool {
        self.joint_index(id).is_ok()
    }

    pub fn joint_type(&self, id: JointId) -> Result<JointType> {
        Ok(self.joints[self.joint_index(id)?].joint_type())
    }

    pub fn joint_body_a(&self, id: JointId) -> Result<BodyId> {
        let index = self.joint_index(id)?;
        Ok(self.body_id(self.joints[index].body_a))
    }

    pub fn joint_body_b(&self, id: JointId) -> Result<BodyId> {
        let index = self.joint_index(id)?;
        Ok(self.body_id(self.joints[index].body_b))
    }

    pub fn joint_local_anchor_a(&self, id: JointId) -> Result<Vec2> {
        Ok(self.joints[self.joint_index(id)?].local_anchor_a)
    }

    pub fn joint_local_anchor_b(&self, id: JointId) -> Result<Vec2> {
        Ok(self.joints[self.joint_index(id)?].local_anchor_b)
    }

    pub fn set_joint_local_anchor_a(&mut self, id: JointId, anchor: Vec2) -> Result<()> {
        let index = self.joint_index(id)?;
        if !anchor.is_valid() {
            return Err(PhysicsError::InvalidDefinition("joint anchors"));
        }
        self.joints[index].local_anchor_a = anchor;
        Ok(())
    }

    pub fn set_joint_local_anchor_b(&mut self, id: JointId, anchor: Vec2) -> Result<()> {
        let index = self.joint_index(id)?;
        if !anchor.is_valid() {
            return Err(PhysicsError::InvalidDefinition("joint anchors"));
        }
        self.joints[index].local_anchor_b = anchor;
        Ok(())
    }

    /// Reference angle of revolute, prismatic and weld joints. Zero for
    /// the other types.
    pub fn joint_reference_angle(&self, id: JointId) -> Result<f32> {
        Ok(match &self.joints[self.joint_index(id)?].kind {
            JointKind::Revolute(joint) => joint.reference_angle(),
            JointKind::Prismatic(joint) => joint.reference_angle(),
            JointKind::Weld(joint) => joint.reference_angle(),
            _ => 0.0,
        })
    }

    /// Local axis of prismatic and wheel joints.
    pub fn joint_local_axis_a(&self, id: JointId) -> Result<Vec2> {
        match &self.joints[self.joint_index(id)?].kind {
            JointKind::Prismatic(joint) => Ok(joint.local_axis_a()),
            JointKind::Wheel(joint) => Ok(joint.local_axis_a()),
            _ => Err(PhysicsError::InvalidJoint),
        }
    }

    pub fn joint_collide_connected(&self, id: JointId) -> Result<bool> {
        Ok(self.joints[self.joint_index(id)?].collide_connected)
    }

    /// Turning collision off destroys the contacts between the bodies.
    /// Turning it on lets the broad-phase find the pairs again.
    pub fn set_joint_collide_connected(&mut self, id: JointId, flag: bool) -> Result<()> {
        let index = self.joint_index(id)?;
        let joint = &mut self.joints[index];
        if joint.collide_connected == flag {
            return Ok(());
        }
        joint.collide_connected = flag;
        let (a, b) = (joint.body_a, joint.body_b);
        if flag {
            self.buffer_body_proxies(a);
        } else {
            self.destroy_body_contacts(a, Some(b), true);
        }
        Ok(())
    }

    pub fn joint_user_data(&self, id: JointId) -> Result<u64> {
        Ok(self.joints[self.joint_index(id)?].user_data)
    }

    pub fn set_joint_user_data(&mut self, id: JointId, user_data: u64) -> Result<()> {
        let index = self.joint_index(id)?;
        self.joints[index].user_data = user_data;
        Ok(())
    }

    pub fn joint_wake_bodies(&mut self, id: JointId) -> Result<()> {
        let index = self.joint_index(id)?;
        self.wake_joint_bodies(index);
        Ok(())
    }

    /// Force applied by the joint on body B during the last step.
    pub fn joint_constraint_force(&self, id: JointId) -> Result<Vec2> {
        Ok(self.joints[self.joint_index(id)?].constraint_force)
    }

    pub fn joint_constraint_torque(&self, id: JointId) -> Result<f32> {
        Ok(self.joints[self.joint_index(id)?].constraint_torque)
    }

    pub fn joint_force_threshold(&self, id: JointId) -> Result<f32> {
        Ok(self.joints[self.joint_index(id)?].force_threshold)
    }

    pub fn set_joint_force_threshold(&mut self, id: JointId, threshold: f32) -> Result<()> {
        let index = self.joint_index(id)?;
        self.joints[index].force_threshold = threshold.max(0.0);
        Ok(())
    }

    pub fn joint_torque_threshold(&self, id: JointId) -> Result<f32> {
        Ok(self.joints[self.joint_index(id)?].torque_threshold)
    }

    pub fn set_joint_torque_threshold(&mut self, id: JointId, threshold: f32) -> Result<()> {
        let index = self.joint_index(id)?;
        self.joints[index].torque_threshold = threshold.max(0.0);
        Ok(())
    }

    /// Stiffness and damping of the rigid parts of the joint. Falls back to
    /// the world joint tuning.
    pub fn joint_constraint_tuning(&self, id: JointId) -> Result<(f32, f32)> {
        let index = self.joint_index(id)?;
        Ok(self.joints[index]
            .tuning
            .unwrap_or((self.joint_hertz, self.joint_damping_ratio)))
    }

    pub fn set_joint_constraint_tuning(&mut self, id: JointId, hertz: f32, damping_ratio: f32) -> Result<()> {
        let index = self.joint_index(id)?;
        if !(hertz >= 0.0) || !(damping_ratio >= 0.0) {
            return Err(PhysicsError::InvalidDefinition("joint tuning"));
        }
        self.joints[index].tuning = Some((hertz, damping_ratio));
        Ok(())
    }

    /// World anchors of a joint.
    fn joint_world_anchors(&self, joint: &Joint) -> (Vec2, Vec2) {
        let xf_a = self.bodies[joint.body_a].transform;
        let xf_b = self.bodies[joint.body_b].transform;
        (xf_a.apply(joint.local_anchor_a), xf_b.apply(joint.local_anchor_b))
    }

    /// Current positional error of the joint.
    pub fn joint_linear_separation(&self, id: JointId) -> Result<f32> {
        let joint = &self.joints[self.joint_index(id)?];
        let (p_a, p_b) = self.joint_world_anchors(joint);
        let d = p_b - p_a;
        let q_a = self.bodies[joint.body_a].transform.q;

        Ok(match &joint.kind {
            JointKind::Distance(distance) => {
                let length = d.length();
                if distance.is_spring_enabled() && distance.min_length() < distance.max_length() {
                    if distance.is_limit_enabled() {
                        if length < distance.min_length() {
                            distance.min_length() - length
                        } else if length > distance.max_length() {
                            length - distance.max_length()
                        } else {
                            0.0
                        }
                    } else {
                        0.0
                    }
                } else {
                    (length - distance.length()).abs()
                }
            }
            JointKind::Prismatic(prismatic) => {
                let axis = q_a.rotate(prismatic.local_axis_a()).normalize();
                let perpendicular = axis.left_perp().dot(d).abs();
                let translation = axis.dot(d);
                let limit = if prismatic.is_limit_enabled() {
                    if translation < prismatic.lower_limit() {
                        prismatic.lower_limit() - translation
                    } else if translation > prismatic.upper_limit() {
                        translation - prismatic.upper_limit()
                    } else {
                        0.0
                    }
                } else {
                    0.0
                };
                (perpendicular * perpendicular + limit * limit).sqrt()
            }
            JointKind::Wheel(wheel) => {
                let axis = q_a.rotate(wheel.local_axis_a()).normalize();
                axis.left_perp().dot(d).abs()
            }
            JointKind::Revolute(_) | JointKind::Weld(_) => d.length(),
            JointKind::Filter | JointKind::Motor(_) | JointKind::Mouse(_) => 0.0,
        })
    }

    /// Current angular error of the joint.
    pub fn joint_angular_separation(&self, id: JointId) -> Result<f32> {
        let joint = &self.joints[self.joint_index(id)?];
        let q_a = self.bodies[joint.body_a].transform.q;
        let q_b = self.bodies[joint.body_b].transform.q;
        let relative = Rot::relative_angle(q_a, q_b);

        Ok(match &joint.kind {
            JointKind::Prismatic(prismatic) => (relative - prismatic.reference_angle()).abs(),
            JointKind::Weld(weld) => (relative - weld.reference_angle()).abs(),
            JointKind::Revolute(revolute) => {
                if revolute.is_limit_enabled() {
                    let angle = revolute.angle(q_a, q_b);
                    if angle < revolute.lower_limit() {
                        revolute.lower_limit() - angle
                    } else if angle > revolute.upper_limit() {
                        angle - revolute.upper_limit()
                    } else {
                        0.0
                    }
                } else {
                    0.0
                }
            }
            _ => 0.0,
        })
    }

    // Typed accessors.

    typed_joint_access!(distance_joint, distance_joint_mut, Distance, DistanceJoint);
    typed_joint_access!(motor_joint, motor_joint_mut, Motor, MotorJoint);
    typed_joint_access!(mouse_joint, mouse_joint_mut, Mouse, MouseJoint);
    typed_joint_access!(prismatic_joint, prismatic_joint_mut, Prismatic, PrismaticJoint);
    typed_joint_access!(revolute_joint, revolute_joint_mut, Revolute, RevoluteJoint);
    typed_joint_access!(weld_joint, weld_joint_mut, Weld, WeldJoint);
    typed_joint_access!(wheel_joint, wheel_joint_mut, Wheel, WheelJoint);

    // Values that need body state.

    /// Current distance between the anchors of a distance joint.
    pub fn distance_joint_current_length(&self, id: JointId) -> Result<f32> {
        self.distance_joint(id)?;
        let joint = &self.joints[self.joint_index(id)?];
        let (p_a, p_b) = self.joint_world_anchors(joint);
        Ok((p_b - p_a).length())
    }

    pub fn distance_joint_motor_force(&self, id: JointId) -> Result<f32> {
        Ok(self.distance_joint(id)?.motor_force(self.inv_h))
    }

    /// Angle of body B relative to body A, minus the reference angle.
    pub fn revolute_joint_angle(&self, id: JointId) -> Result<f32> {
        let revolute = self.revolute_joint(id)?;
        let joint = &self.joints[self.joint_index(id)?];
        Ok(revolute.angle(self.bodies[joint.body_a].transform.q, self.bodies[joint.body_b].transform.q))
    }

    pub fn revolute_joint_motor_torque(&self, id: JointId) -> Result<f32> {
        Ok(self.revolute_joint(id)?.motor_torque(self.inv_h))
    }

    pub fn prismatic_joint_translation(&self, id: JointId) -> Result<f32> {
        let prismatic = self.prismatic_joint(id)?;
        let joint = &self.joints[self.joint_index(id)?];
        let (p_a, p_b) = self.joint_world_anchors(joint);
        Ok(prismatic.translation(self.bodies[joint.body_a].transform.q, p_a, p_b))
    }

    /// Rate of change of the translation.
    pub fn prismatic_joint_speed(&self, id: JointId) -> Result<f32> {
        let prismatic = self.prismatic_joint(id)?;
        let joint = &self.joints[self.joint_index(id)?];
        let body_a = &self.bodies[joint.body_a];
        let body_b = &self.bodies[joint.body_b];

        let axis = body_a.transform.q.rotate(prismatic.local_axis_a()).normalize();
        let r_a = body_a.transform.q.rotate(joint.local_anchor_a - body_a.local_center);
        let r_b = body_b.transform.q.rotate(joint.local_anchor_b - body_b.local_center);
        let d = (body_b.center - body_a.center) + (r_b - r_a);

        let v_a = body_a.linear_velocity;
        let v_b = body_b.linear_velocity;
        let w_a = body_a.angular_velocity;
        let w_b = body_b.angular_velocity;
        let dv = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
        Ok(d.dot(Vec2::scalar_cross(w_a, axis)) + axis.dot(dv))
    }

    pub fn prismatic_joint_motor_force(&self, id: JointId) -> Result<f32> {
        Ok(self.prismatic_joint(id)?.motor_force(self.inv_h))
    }

    pub fn wheel_joint_motor_torque(&self, id: JointId) -> Result<f32> {
        Ok(self.wheel_joint(id)?.motor_torque(self.inv_h))
    }

    /// Moves the target of a mouse joint and wakes the dragged body.
    pub fn set_mouse_joint_target(&mut self, id: JointId, target: Vec2) -> Result<()> {
        if !target.is_valid() {
            return Err(PhysicsError::InvalidDefinition("mouse joint target"));
        }
        self.mouse_joint_mut(id)?.set_target(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BodyDef, ShapeDef};
    use crate::shapes::{make_box, Circle};
    use crate::world::WorldDef;
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&WorldDef::default()).expect("world")
    }

    fn joint_base(a: BodyId, b: BodyId) -> JointDefBase {
        JointDefBase {
            body_a: a,
            body_b: b,
            ..Default::default()
        }
    }

    #[test]
    fn test_self_joint_is_rejected() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let def = FilterJointDef {
            base: joint_base(body, body),
        };
        assert_eq!(world.create_filter_joint(&def), Err(PhysicsError::SelfJoint));
    }

    #[test]
    fn test_stale_joint_handle() {
        let mut world = world();
        let a = world.create_body(&BodyDef::default()).expect("a");
        let b = world.create_body(&BodyDef::dynamic()).expect("b");
        let joint = world
            .create_filter_joint(&FilterJointDef { base: joint_base(a, b) })
            .expect("joint");
        assert_eq!(world.joint_type(joint).expect("type"), JointType::Filter);
        world.destroy_body(b).expect("destroy");
        assert!(!world.joint_is_valid(joint));
        assert_eq!(world.joint_body_a(joint), Err(PhysicsError::InvalidJoint));
        assert!(world.body_joints(a).expect("joints").is_empty());
    }

    #[test]
    fn test_wrong_joint_type_access() {
        let mut world = world();
        let a = world.create_body(&BodyDef::default()).expect("a");
        let b = world.create_body(&BodyDef::dynamic()).expect("b");
        let joint = world
            .create_weld_joint(&WeldJointDef {
                base: joint_base(a, b),
                ..Default::default()
            })
            .expect("joint");
        assert!(world.weld_joint(joint).is_ok());
        assert_eq!(world.revolute_joint(joint).err(), Some(PhysicsError::InvalidJoint));
    }

    #[test]
    fn test_pendulum_keeps_anchor_distance() {
        let mut world = world();
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        let bob = world
            .create_body(&BodyDef {
                position: Vec2::new(2.0, 0.0),
                ..BodyDef::dynamic()
            })
            .expect("bob");
        world
            .create_shape(bob, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.25))
            .expect("shape");
        let def = RevoluteJointDef {
            base: JointDefBase {
                local_anchor_b: Vec2::new(-2.0, 0.0),
                ..joint_base(ground, bob)
            },
            ..Default::default()
        };
        let joint = world.create_revolute_joint(&def).expect("joint");

        for _ in 0..120 {
            world.step(1.0 / 60.0, 4);
        }
        let position = world.body_position(bob).expect("position");
        assert_relative_eq!(position.length(), 2.0, epsilon = 0.02);
        assert!(world.joint_linear_separation(joint).expect("separation") < 0.02);
        assert!(world.revolute_joint_angle(joint).expect("angle") != 0.0);
        assert!(world.joint_constraint_force(joint).expect("force").length() > 0.0);
    }

    #[test]
    fn test_collide_connected_controls_contacts() {
        let mut world = world();
        let a = world.create_body(&BodyDef::default()).expect("a");
        world
            .create_shape(a, &ShapeDef::default(), make_box(5.0, 0.5))
            .expect("ground");
        let b = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 0.9),
                ..BodyDef::dynamic()
            })
            .expect("b");
        world
            .create_shape(b, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.body_contact_capacity(b).expect("contacts"), 1);

        let joint = world
            .create_filter_joint(&FilterJointDef { base: joint_base(a, b) })
            .expect("joint");
        assert_eq!(world.body_contact_capacity(b).expect("contacts"), 0);
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.body_contact_capacity(b).expect("contacts"), 0);

        world.set_joint_collide_connected(joint, true).expect("collide");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.body_contact_capacity(b).expect("contacts"), 1);
    }

    #[test]
    fn test_joint_tuning_falls_back_to_world() {
        let mut world = world();
        let a = world.create_body(&BodyDef::default()).expect("a");
        let b = world.create_body(&BodyDef::dynamic()).expect("b");
        let joint = world
            .create_filter_joint(&FilterJointDef { base: joint_base(a, b) })
            .expect("joint");
        assert_eq!(world.joint_constraint_tuning(joint).expect("tuning"), (60.0, 2.0));
        world.set_joint_constraint_tuning(joint, 30.0, 1.0).expect("set");
        assert_eq!(world.joint_constraint_tuning(joint).expect("tuning"), (30.0, 1.0));
    }
}
