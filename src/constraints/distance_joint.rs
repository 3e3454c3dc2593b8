use super::{apply_impulse, limit_coefficients, Constraint, JointBase, JointDefBase};
use super::softness::{make_soft, Softness};
use crate::common::constants::{huge, linear_slop};
use crate::integration::{SolverBodies, StepContext};
use crate::math::Vec2;

/// Distance joint definition. Connects an anchor point on body A with an
/// anchor point on body B, keeping them at a given length. The joint can be
/// made springy and limited to a range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceJointDef {
    pub base: JointDefBase,
    /// The rest length of this joint. Clamped to a stable minimum value.
    pub length: f32,
    /// Enable the distance constraint to behave like a spring. If false
    /// then the distance joint will be rigid, overriding the limit and motor.
    pub enable_spring: bool,
    /// The spring linear stiffness, cycles per second.
    pub hertz: f32,
    /// The spring linear damping ratio, non-dimensional.
    pub damping_ratio: f32,
    /// Enable/disable the joint limit.
    pub enable_limit: bool,
    /// Minimum length. Clamped to a stable minimum value.
    pub min_length: f32,
    /// Maximum length. Must be greater than or equal to the minimum length.
    pub max_length: f32,
    /// Enable/disable the joint motor.
    pub enable_motor: bool,
    /// The maximum motor force, usually in newtons.
    pub max_motor_force: f32,
    /// The desired motor speed, usually in meters per second.
    pub motor_speed: f32,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            base: JointDefBase::default(),
            length: 1.0,
            enable_spring: false,
            hertz: 0.0,
            damping_ratio: 0.0,
            enable_limit: false,
            min_length: 0.0,
            max_length: huge(),
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJoint {
    length: f32,
    hertz: f32,
    damping_ratio: f32,
    min_length: f32,
    max_length: f32,
    max_motor_force: f32,
    motor_speed: f32,
    enable_spring: bool,
    enable_limit: bool,
    enable_motor: bool,

    impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    motor_impulse: f32,

    axial_mass: f32,
    distance_softness: Softness,
    /// Axis of the last solve, for force reporting.
    axis: Vec2,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        let slop = linear_slop();
        let min_length = def.min_length.clamp(slop, huge());
        let mut joint = Self {
            length: def.length.clamp(slop, huge()),
            hertz: def.hertz,
            damping_ratio: def.damping_ratio,
            min_length,
            max_length: def.max_length.clamp(min_length, huge()),
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_spring: def.enable_spring,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            motor_impulse: 0.0,
            axial_mass: 0.0,
            distance_softness: Softness::default(),
            axis: Vec2::ZERO,
        };
        joint.set_length(def.length);
        joint
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    /// Sets the rest length, clamped to a stable range. Resets impulses.
    pub fn set_length(&mut self, length: f32) {
        self.length = length.clamp(linear_slop(), huge());
        self.impulse = 0.0;
        self.lower_impulse = 0.0;
        self.upper_impulse = 0.0;
    }

    pub fn enable_spring(&mut self, flag: bool) {
        self.enable_spring = flag;
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
        self.enable_limit = flag;
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    /// Sets the length range. Resets the limit impulses.
    pub fn set_length_range(&mut self, min_length: f32, max_length: f32) {
        let slop = linear_slop();
        let min_length = min_length.clamp(slop, huge());
        let max_length = max_length.clamp(slop, huge());
        self.min_length = min_length.min(max_length);
        self.max_length = min_length.max(max_length);
        self.impulse = 0.0;
        self.lower_impulse = 0.0;
        self.upper_impulse = 0.0;
    }

    pub fn min_length(&self) -> f32 {
        self.min_length
    }

    pub fn max_length(&self) -> f32 {
        self.max_length
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
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

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    /// Motor force applied during the last step.
    pub fn motor_force(&self, inv_h: f32) -> f32 {
        inv_h * self.motor_impulse
    }

    fn axial_impulse(&self) -> f32 {
        self.impulse + self.lower_impulse - self.upper_impulse + self.motor_impulse
    }
}

impl Constraint for DistanceJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let r_a = base.anchor_a;
        let r_b = base.anchor_b;
        let separation = r_b - r_a + base.delta_center;
        let axis = separation.normalize();

        let cr_a = r_a.cross(axis);
        let cr_b = r_b.cross(axis);
        let k = m_a + m_b + i_a * cr_a * cr_a + i_b * cr_b * cr_b;
        self.axial_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
        self.distance_softness = make_soft(self.hertz, self.damping_ratio, context.h);
        self.axis = axis;

        if !context.enable_warm_starting {
            self.impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
            self.motor_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies) {
        let state_a = bodies.get(base.index_a);
        let state_b = bodies.get(base.index_b);
        let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);
        let d = (state_b.delta_position - state_a.delta_position) + base.delta_center + (r_b - r_a);
        let axis = d.normalize();

        let p = self.axial_impulse() * axis;
        apply_impulse(base, bodies, p, r_a.cross(p), r_b.cross(p));
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, use_bias: bool) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let mut state_a = bodies.get(base.index_a);
        let mut state_b = bodies.get(base.index_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        // current anchors
        let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);
        let d = (state_b.delta_position - state_a.delta_position) + base.delta_center + (r_b - r_a);
        let (length, axis) = d.length_and_normalize();
        self.axis = axis;

        let apply = |impulse: f32, v_a: &mut Vec2, w_a: &mut f32, v_b: &mut Vec2, w_b: &mut f32| {
            let p = impulse * axis;
            *v_a = Vec2::mul_sub(*v_a, m_a, p);
            *w_a -= i_a * r_a.cross(p);
            *v_b = Vec2::mul_add(*v_b, m_b, p);
            *w_b += i_b * r_b.cross(p);
        };

        // joint is soft if the spring is enabled and the range is open
        if self.enable_spring && (self.min_length < self.max_length || !self.enable_limit) {
            if self.hertz > 0.0 {
                let vr = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
                let cdot = axis.dot(vr);
                let c = length - self.length;
                let bias = self.distance_softness.bias_rate * c;
                let mass_scale = self.distance_softness.mass_scale;
                let impulse_scale = self.distance_softness.impulse_scale;

                let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.impulse;
                self.impulse += impulse;
                apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }
        } else {
            // rigid constraint
            let vr = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
            let cdot = axis.dot(vr);
            let c = length - self.length;

            let (mut bias, mut mass_scale, mut impulse_scale) = (0.0, 1.0, 0.0);
            if use_bias {
                bias = base.softness.bias_rate * c;
                mass_scale = base.softness.mass_scale;
                impulse_scale = base.softness.impulse_scale;
            }

            let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.impulse;
            self.impulse += impulse;
            apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
        }

        if self.enable_limit && self.min_length < self.max_length {
            // lower limit
            {
                let vr = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
                let cdot = axis.dot(vr);
                let c = length - self.min_length;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.lower_impulse;
                let new_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.lower_impulse;
                self.lower_impulse = new_impulse;
                apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }

            // upper limit, signs flipped to keep the impulse positive
            {
                let vr = (v_a + Vec2::scalar_cross(w_a, r_a)) - (v_b + Vec2::scalar_cross(w_b, r_b));
                let cdot = axis.dot(vr);
                let c = self.max_length - length;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.upper_impulse;
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;
                apply(-impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }
        }

        if self.enable_motor {
            let vr = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));
            let cdot = axis.dot(vr);
            let impulse = self.axial_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = context.h * self.max_motor_force;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;
            apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(base.index_a, state_a);
        bodies.set(base.index_b, state_b);
    }

    fn linear_impulse(&self) -> Vec2 {
        self.axial_impulse() * self.axis
    }

    fn angular_impulse(&self) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{ground_and_body, simulate};
    use approx::assert_relative_eq;

    fn current_length(base: &JointBase, bodies: &SolverBodies) -> f32 {
        let state = bodies.get(Some(0));
        let r_b = state.delta_rotation.rotate(base.anchor_b);
        (base.delta_center + state.delta_position + r_b - base.anchor_a).length()
    }

    #[test]
    fn test_rigid_length_is_restored() {
        let (base, bodies) = ground_and_body(Vec2::new(2.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        let mut joint = DistanceJoint::new(&DistanceJointDef {
            length: 1.5,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 60);
        assert_relative_eq!(current_length(&base, &bodies), 1.5, epsilon = 0.01);
    }

    #[test]
    fn test_limit_only_acts_outside_range() {
        let (base, bodies) = ground_and_body(Vec2::new(2.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        let mut joint = DistanceJoint::new(&DistanceJointDef {
            enable_spring: true,
            enable_limit: true,
            min_length: 1.0,
            max_length: 3.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 10);
        // Inside the range and zero spring stiffness: nothing moves
        assert_relative_eq!(current_length(&base, &bodies), 2.0, epsilon = 1e-4);

        let (base, bodies) = ground_and_body(Vec2::new(4.0, 0.0), Vec2::ZERO, Vec2::ZERO);
        simulate(&mut joint, &base, &bodies, 60);
        assert!(current_length(&base, &bodies) < 3.0 + 0.01);
    }

    #[test]
    fn test_length_clamping() {
        let mut joint = DistanceJoint::new(&DistanceJointDef::default());
        joint.set_length(-1.0);
        assert_eq!(joint.length(), linear_slop());
        joint.set_length_range(4.0, 2.0);
        assert_eq!((joint.min_length(), joint.max_length()), (2.0, 4.0));
    }
}
