use super::{apply_impulse, limit_coefficients, Constraint, JointBase, JointDefBase};
use super::softness::{make_soft, Softness};
use crate::integration::{SolverBodies, StepContext};
use crate::math::{unwind_angle, Mat22, Rot, Vec2};
use std::f32::consts::PI;

/// Revolute joint definition. Body B rotates about a shared point with body
/// A. The relative rotation can be limited, driven by a motor or pulled
/// toward the reference angle by a spring.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RevoluteJointDef {
    pub base: JointDefBase,
    /// The body B angle minus body A angle in the reference state (radians).
    pub reference_angle: f32,
    pub enable_spring: bool,
    /// The spring stiffness, cycles per second.
    pub hertz: f32,
    /// The spring damping ratio, non-dimensional.
    pub damping_ratio: f32,
    pub enable_limit: bool,
    /// The lower angle for the joint limit in radians.
    pub lower_angle: f32,
    /// The upper angle for the joint limit in radians.
    pub upper_angle: f32,
    pub enable_motor: bool,
    /// The maximum motor torque, typically in newton-meters.
    pub max_motor_torque: f32,
    /// The desired motor speed in radians per second.
    pub motor_speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    reference_angle: f32,
    hertz: f32,
    damping_ratio: f32,
    lower_angle: f32,
    upper_angle: f32,
    max_motor_torque: f32,
    motor_speed: f32,
    enable_spring: bool,
    enable_limit: bool,
    enable_motor: bool,

    linear_impulse: Vec2,
    spring_impulse: f32,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    delta_angle: f32,
    axial_mass: f32,
    spring_softness: Softness,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        let lower = def.lower_angle.min(def.upper_angle).clamp(-PI, PI);
        let upper = def.lower_angle.max(def.upper_angle).clamp(-PI, PI);
        Self {
            reference_angle: def.reference_angle.clamp(-PI, PI),
            hertz: def.hertz,
            damping_ratio: def.damping_ratio,
            lower_angle: lower,
            upper_angle: upper,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_spring: def.enable_spring,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            linear_impulse: Vec2::ZERO,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            delta_angle: 0.0,
            axial_mass: 0.0,
            spring_softness: Softness::default(),
        }
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Joint angle for the given body rotations, relative to the reference.
    pub fn angle(&self, q_a: Rot, q_b: Rot) -> f32 {
        unwind_angle(Rot::relative_angle(q_a, q_b) - self.reference_angle)
    }

    pub fn enable_spring(&mut self, flag: bool) {
        if flag != self.enable_spring {
            self.enable_spring = flag;
            self.spring_impulse = 0.0;
        }
    }

    pub fn is_spring_enabled(&self) -> bool {
        self.enable_spring
    }

    pub fn set_spring_hertz(&mut self, hertz: f32) {
        self.hertz = hertz;
    }

    pub fn spring_hertz(&self) -> f32 {
        self.hertz
    }

    pub fn set_spring_damping_ratio(&mut self, damping_ratio: f32) {
        self.damping_ratio = damping_ratio;
    }

    pub fn spring_damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        if lower != self.lower_angle || upper != self.upper_angle {
            self.lower_angle = lower.clamp(-PI, PI);
            self.upper_angle = upper.clamp(-PI, PI);
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    pub fn enable_motor(&mut self, flag: bool) {
        if flag != self.enable_motor {
            self.enable_motor = flag;
            self.motor_impulse = 0.0;
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    pub fn max_motor_torque(&self) -> f32 {
        self.max_motor_torque
    }

    pub fn motor_torque(&self, inv_h: f32) -> f32 {
        inv_h * self.motor_impulse
    }

    fn axial_impulse(&self) -> f32 {
        self.spring_impulse + self.motor_impulse + self.lower_impulse - self.upper_impulse
    }
}

impl Constraint for RevoluteJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        self.delta_angle = unwind_angle(Rot::relative_angle(base.rotation_a, base.rotation_b) - self.reference_angle);

        let k = base.inv_i_a + base.inv_i_b;
        self.axial_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
        self.spring_softness = make_soft(self.hertz, self.damping_ratio, context.h);

        if !context.enable_warm_starting {
            self.linear_impulse = Vec2::ZERO;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies) {
        let state_a = bodies.get(base.index_a);
        let state_b = bodies.get(base.index_b);
        let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);

        let axial = self.axial_impulse();
        let p = self.linear_impulse;
        apply_impulse(base, bodies, p, r_a.cross(p) + axial, r_b.cross(p) + axial);
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, use_bias: bool) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let mut state_a = bodies.get(base.index_a);
        let mut state_b = bodies.get(base.index_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        let joint_angle = self.delta_angle + Rot::relative_angle(state_a.delta_rotation, state_b.delta_rotation);

        // spring
        if self.enable_spring && !(self.enable_limit && self.lower_angle == self.upper_angle) && self.hertz > 0.0 {
            let c = joint_angle;
            let bias = self.spring_softness.bias_rate * c;
            let mass_scale = self.spring_softness.mass_scale;
            let impulse_scale = self.spring_softness.impulse_scale;

            let cdot = w_b - w_a;
            let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.spring_impulse;
            self.spring_impulse += impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // motor
        if self.enable_motor {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.axial_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = context.h * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        if self.enable_limit {
            // lower limit
            {
                let c = joint_angle - self.lower_angle;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let cdot = w_b - w_a;
                let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.lower_impulse;
                let new_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.lower_impulse;
                self.lower_impulse = new_impulse;

                w_a -= i_a * impulse;
                w_b += i_b * impulse;
            }

            // upper limit, signs flipped so the accumulated impulse stays positive
            {
                let c = self.upper_angle - joint_angle;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let cdot = w_a - w_b;
                let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.upper_impulse;
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;

                w_a += i_a * impulse;
                w_b -= i_b * impulse;
            }
        }

        // point to point
        {
            let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);

            let cdot = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));

            let (mut bias, mut mass_scale, mut impulse_scale) = (Vec2::ZERO, 1.0, 0.0);
            if use_bias {
                let dc_a = state_a.delta_position;
                let dc_b = state_b.delta_position;
                let separation = (dc_b - dc_a) + (r_b - r_a) + base.delta_center;
                bias = base.softness.bias_rate * separation;
                mass_scale = base.softness.mass_scale;
                impulse_scale = base.softness.impulse_scale;
            }

            let k11 = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
            let k12 = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
            let k22 = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let b = k.solve(cdot + bias);

            let impulse = Vec2::new(
                -mass_scale * b.x - impulse_scale * self.linear_impulse.x,
                -mass_scale * b.y - impulse_scale * self.linear_impulse.y,
            );
            self.linear_impulse += impulse;

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
        self.axial_impulse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{ground_and_body, simulate};
    use approx::assert_relative_eq;

    #[test]
    fn test_pin_holds_anchor() {
        // Body B at (1, 0) pinned to the origin through its own local point (-1, 0)
        let (base, bodies) = ground_and_body(Vec2::new(1.0, 0.0), Vec2::ZERO, Vec2::new(-1.0, 0.0));
        bodies.with(0, |s| s.linear_velocity = Vec2::new(0.0, 2.0));
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::default());
        simulate(&mut joint, &base, &bodies, 30);

        let state = bodies.get(Some(0));
        let anchor = base.delta_center + state.delta_position + state.delta_rotation.rotate(base.anchor_b);
        assert!(anchor.length() < 0.01, "anchor drifted to {anchor:?}");
        // The pushed body swings around the pin instead of translating
        assert!(state.angular_velocity.abs() > 0.1);
    }

    #[test]
    fn test_motor_reaches_speed() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let mut joint = RevoluteJoint::new(&RevoluteJointDef {
            enable_motor: true,
            motor_speed: 2.0,
            max_motor_torque: 1000.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 1);
        assert_relative_eq!(bodies.get(Some(0)).angular_velocity, 2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_limit_stops_rotation() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        bodies.with(0, |s| s.angular_velocity = 10.0);
        let mut joint = RevoluteJoint::new(&RevoluteJointDef {
            enable_limit: true,
            lower_angle: -0.25,
            upper_angle: 0.25,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 30);
        let angle = bodies.get(Some(0)).delta_rotation.angle();
        assert!(angle < 0.25 + 0.02, "angle {angle}");
    }

    #[test]
    fn test_limits_are_sorted() {
        let mut joint = RevoluteJoint::new(&RevoluteJointDef::default());
        joint.set_limits(1.0, -1.0);
        assert_eq!((joint.lower_limit(), joint.upper_limit()), (-1.0, 1.0));
    }
}
