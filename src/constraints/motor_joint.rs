use super::{apply_impulse, Constraint, JointBase, JointDefBase};
use crate::integration::{SolverBodies, StepContext};
use crate::math::{unwind_angle, Mat22, Rot, Vec2};

/// Motor joint definition. Drives body B toward a position and angle
/// relative to body A, limited by a maximum force and torque. Typically used
/// to animate a dynamic body relative to the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorJointDef {
    pub base: JointDefBase,
    /// Position of body B minus the position of body A, in body A's frame.
    pub linear_offset: Vec2,
    /// The body B angle minus body A angle in radians.
    pub angular_offset: f32,
    /// The maximum motor force in newtons.
    pub max_force: f32,
    /// The maximum motor torque in newton-meters.
    pub max_torque: f32,
    /// Position correction factor in the range `[0, 1]`.
    pub correction_factor: f32,
}

impl Default for MotorJointDef {
    fn default() -> Self {
        Self {
            base: JointDefBase::default(),
            linear_offset: Vec2::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorJoint {
    linear_offset: Vec2,
    angular_offset: f32,
    max_force: f32,
    max_torque: f32,
    correction_factor: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    delta_angle: f32,
    linear_mass: Mat22,
    angular_mass: f32,
}

impl MotorJoint {
    pub(crate) fn new(def: &MotorJointDef) -> Self {
        Self {
            linear_offset: def.linear_offset,
            angular_offset: def.angular_offset,
            max_force: def.max_force.max(0.0),
            max_torque: def.max_torque.max(0.0),
            correction_factor: def.correction_factor.clamp(0.0, 1.0),
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            delta_angle: 0.0,
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
        }
    }

    pub fn linear_offset(&self) -> Vec2 {
        self.linear_offset
    }

    pub fn set_linear_offset(&mut self, linear_offset: Vec2) {
        self.linear_offset = linear_offset;
    }

    pub fn angular_offset(&self) -> f32 {
        self.angular_offset
    }

    pub fn set_angular_offset(&mut self, angular_offset: f32) {
        self.angular_offset = unwind_angle(angular_offset);
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, max_force: f32) {
        self.max_force = max_force.max(0.0);
    }

    pub fn max_torque(&self) -> f32 {
        self.max_torque
    }

    pub fn set_max_torque(&mut self, max_torque: f32) {
        self.max_torque = max_torque.max(0.0);
    }

    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    pub fn set_correction_factor(&mut self, correction_factor: f32) {
        self.correction_factor = correction_factor.clamp(0.0, 1.0);
    }
}

impl Constraint for MotorJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let r_a = base.anchor_a;
        let r_b = base.anchor_b;

        let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();

        let ka = i_a + i_b;
        self.angular_mass = if ka > 0.0 { 1.0 / ka } else { 0.0 };
        self.delta_angle = unwind_angle(Rot::relative_angle(base.rotation_a, base.rotation_b) - self.angular_offset);

        if !context.enable_warm_starting {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies) {
        let state_a = bodies.get(base.index_a);
        let state_b = bodies.get(base.index_b);
        let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);
        let p = self.linear_impulse;
        apply_impulse(
            base,
            bodies,
            p,
            r_a.cross(p) + self.angular_impulse,
            r_b.cross(p) + self.angular_impulse,
        );
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, _use_bias: bool) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let mut state_a = bodies.get(base.index_a);
        let mut state_b = bodies.get(base.index_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        // angular constraint
        {
            let c = Rot::relative_angle(state_a.delta_rotation, state_b.delta_rotation) + self.delta_angle;
            let bias = context.inv_h * self.correction_factor * c;
            let cdot = w_b - w_a;
            let impulse = -self.angular_mass * (cdot + bias);

            let max_impulse = context.h * self.max_torque;
            let old_impulse = self.angular_impulse;
            self.angular_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.angular_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // linear constraint
        {
            let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);
            let q_a = state_a.delta_rotation.mul(base.rotation_a);
            let target = q_a.rotate(self.linear_offset);
            let separation = (state_b.delta_position - state_a.delta_position) + (r_b - r_a) + base.delta_center - target;
            let bias = context.inv_h * self.correction_factor * separation;

            let cdot = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
            let impulse = -self.linear_mass.mul_v(cdot + bias);

            let max_impulse = context.h * self.max_force;
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = max_impulse * self.linear_impulse.normalize();
            }
            let impulse = self.linear_impulse - old_impulse;

            v_a = Vec2::mul_sub(v_a, m_a, impulse);
            w_a -= i_a * r_a.cross(impulse);
            v_b = Vec2::mul_add(v_b, m_b, impulse);
            w_b += i_b * r_b.cross(impulse);
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(base.index_a, state_a);
        bodies.set(base.index_b, state_b);
    }

    fn linear_impulse(&self) -> Vec2 {
        self.linear_impulse
    }

    fn angular_impulse(&self) -> f32 {
        self.angular_impulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{context, ground_and_body, simulate};

    #[test]
    fn test_motor_drives_to_offset() {
        let (base, bodies) = ground_and_body(Vec2::new(1.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        let mut joint = MotorJoint::new(&MotorJointDef {
            linear_offset: Vec2::new(2.0, 0.0),
            angular_offset: 0.5,
            max_force: 1000.0,
            max_torque: 1000.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 60);

        let state = bodies.get(Some(0));
        assert!((state.delta_position.x - 1.0).abs() < 0.02, "{:?}", state.delta_position);
        assert!((state.delta_rotation.angle() - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_motor_force_is_capped() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let mut joint = MotorJoint::new(&MotorJointDef {
            linear_offset: Vec2::new(10.0, 0.0),
            max_force: 2.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 1);

        let max_impulse = context().h * 2.0;
        assert!(joint.linear_impulse().length() <= max_impulse + 1e-6);
    }
}
