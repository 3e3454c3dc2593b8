use super::softness::{make_soft, Softness};
use super::{Constraint, JointBase, JointDefBase};
use crate::integration::{SolverBodies, StepContext};
use crate::math::{Mat22, Vec2};

/// Stiffness of the rotational damping applied to the dragged body.
const ANGULAR_HERTZ: f32 = 0.5;
const ANGULAR_DAMPING_RATIO: f32 = 0.1;

/// Mouse joint definition. Drags a point on body B toward a world target
/// with a soft spring. Body A is usually a static ground body and is not
/// affected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MouseJointDef {
    pub base: JointDefBase,
    /// The initial target point in world space.
    pub target: Vec2,
    /// Stiffness in hertz.
    pub hertz: f32,
    /// Damping ratio, non-dimensional.
    pub damping_ratio: f32,
    /// Maximum force, typically in newtons.
    pub max_force: f32,
}

impl Default for MouseJointDef {
    fn default() -> Self {
        Self {
            base: JointDefBase::default(),
            target: Vec2::ZERO,
            hertz: 4.0,
            damping_ratio: 1.0,
            max_force: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseJoint {
    target: Vec2,
    hertz: f32,
    damping_ratio: f32,
    max_force: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    linear_softness: Softness,
    angular_softness: Softness,
    linear_mass: Mat22,
    angular_mass: f32,
    /// `center_b - target` at the start of the step.
    delta_center: Vec2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef) -> Self {
        Self {
            target: def.target,
            hertz: def.hertz,
            damping_ratio: def.damping_ratio,
            max_force: def.max_force.max(0.0),
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            linear_softness: Softness::default(),
            angular_softness: Softness::default(),
            linear_mass: Mat22::ZERO,
            angular_mass: 0.0,
            delta_center: Vec2::ZERO,
        }
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn spring_hertz(&self) -> f32 {
        self.hertz
    }

    pub fn set_spring_hertz(&mut self, hertz: f32) {
        self.hertz = hertz;
    }

    pub fn spring_damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn set_spring_damping_ratio(&mut self, damping_ratio: f32) {
        self.damping_ratio = damping_ratio;
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, max_force: f32) {
        self.max_force = max_force.max(0.0);
    }
}

impl Constraint for MouseJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let (m_b, i_b) = (base.inv_mass_b, base.inv_i_b);
        let r_b = base.anchor_b;

        self.linear_softness = make_soft(self.hertz, self.damping_ratio, context.h);
        self.angular_softness = make_soft(ANGULAR_HERTZ, ANGULAR_DAMPING_RATIO, context.h);

        let k11 = m_b + i_b * r_b.y * r_b.y;
        let k12 = -i_b * r_b.x * r_b.y;
        let k22 = m_b + i_b * r_b.x * r_b.x;
        self.linear_mass = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22)).inverse();
        self.angular_mass = if i_b > 0.0 { 1.0 / i_b } else { 0.0 };
        self.delta_center = base.center_b - self.target;

        if !context.enable_warm_starting {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies) {
        let mut state_b = bodies.get(base.index_b);
        let r_b = state_b.delta_rotation.rotate(base.anchor_b);
        state_b.linear_velocity = Vec2::mul_add(state_b.linear_velocity, base.inv_mass_b, self.linear_impulse);
        state_b.angular_velocity += base.inv_i_b * (r_b.cross(self.linear_impulse) + self.angular_impulse);
        bodies.set(base.index_b, state_b);
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, _use_bias: bool) {
        let (m_b, i_b) = (base.inv_mass_b, base.inv_i_b);
        let mut state_b = bodies.get(base.index_b);
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        // Soft angular damping without bias slows the spin of the dragged body
        {
            let impulse = -self.angular_softness.mass_scale * self.angular_mass * w_b
                - self.angular_softness.impulse_scale * self.angular_impulse;
            self.angular_impulse += impulse;
            w_b += i_b * impulse;
        }

        let max_impulse = self.max_force * context.h;
        {
            let r_b = state_b.delta_rotation.rotate(base.anchor_b);
            let cdot = v_b + Vec2::scalar_cross(w_b, r_b);

            let separation = state_b.delta_position + r_b + self.delta_center;
            let bias = self.linear_softness.bias_rate * separation;
            let mass_scale = self.linear_softness.mass_scale;
            let impulse_scale = self.linear_softness.impulse_scale;

            let b = self.linear_mass.mul_v(cdot + bias);
            let impulse = Vec2::new(
                -mass_scale * b.x - impulse_scale * self.linear_impulse.x,
                -mass_scale * b.y - impulse_scale * self.linear_impulse.y,
            );

            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = max_impulse * self.linear_impulse.normalize();
            }
            let impulse = self.linear_impulse - old_impulse;

            v_b = Vec2::mul_add(v_b, m_b, impulse);
            w_b += i_b * r_b.cross(impulse);
        }

        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
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
    use crate::constraints::test_support::{ground_and_body, simulate};

    #[test]
    fn test_mouse_pulls_body_to_target() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let target = Vec2::new(1.0, 0.5);
        let mut joint = MouseJoint::new(&MouseJointDef {
            target,
            hertz: 5.0,
            damping_ratio: 0.7,
            max_force: 1000.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 120);

        let position = base.center_b + bodies.get(Some(0)).delta_position;
        assert!(position.distance(target) < 0.05, "{position:?}");
    }

    #[test]
    fn test_zero_force_does_nothing() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let mut joint = MouseJoint::new(&MouseJointDef {
            target: Vec2::new(3.0, 0.0),
            max_force: 0.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 10);
        assert_eq!(bodies.get(Some(0)).delta_position, Vec2::ZERO);
    }
}
