use super::{apply_impulse, Constraint, JointBase, JointDefBase};
use super::softness::{make_soft, Softness};
use crate::integration::{SolverBodies, StepContext};
use crate::math::{unwind_angle, Mat22, Rot, Vec2};

/// Weld joint definition. Glues two bodies together. Zero stiffness makes
/// that part of the weld rigid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WeldJointDef {
    pub base: JointDefBase,
    /// The body B angle minus body A angle in the reference state (radians).
    pub reference_angle: f32,
    /// Linear stiffness expressed as cycles per second. Use zero for maximum stiffness.
    pub linear_hertz: f32,
    /// Angular stiffness as cycles per second. Use zero for maximum stiffness.
    pub angular_hertz: f32,
    pub linear_damping_ratio: f32,
    pub angular_damping_ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeldJoint {
    reference_angle: f32,
    linear_hertz: f32,
    linear_damping_ratio: f32,
    angular_hertz: f32,
    angular_damping_ratio: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,

    linear_softness: Softness,
    angular_softness: Softness,
    delta_angle: f32,
    axial_mass: f32,
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        Self {
            reference_angle: def.reference_angle,
            linear_hertz: def.linear_hertz,
            linear_damping_ratio: def.linear_damping_ratio,
            angular_hertz: def.angular_hertz,
            angular_damping_ratio: def.angular_damping_ratio,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            linear_softness: Softness::default(),
            angular_softness: Softness::default(),
            delta_angle: 0.0,
            axial_mass: 0.0,
        }
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    pub fn set_reference_angle(&mut self, angle: f32) {
        self.reference_angle = unwind_angle(angle);
    }

    pub fn linear_hertz(&self) -> f32 {
        self.linear_hertz
    }

    pub fn set_linear_hertz(&mut self, hertz: f32) {
        self.linear_hertz = hertz;
    }

    pub fn linear_damping_ratio(&self) -> f32 {
        self.linear_damping_ratio
    }

    pub fn set_linear_damping_ratio(&mut self, damping_ratio: f32) {
        self.linear_damping_ratio = damping_ratio;
    }

    pub fn angular_hertz(&self) -> f32 {
        self.angular_hertz
    }

    pub fn set_angular_hertz(&mut self, hertz: f32) {
        self.angular_hertz = hertz;
    }

    pub fn angular_damping_ratio(&self) -> f32 {
        self.angular_damping_ratio
    }

    pub fn set_angular_damping_ratio(&mut self, damping_ratio: f32) {
        self.angular_damping_ratio = damping_ratio;
    }
}

impl Constraint for WeldJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let ka = base.inv_i_a + base.inv_i_b;
        self.axial_mass = if ka > 0.0 { 1.0 / ka } else { 0.0 };

        self.linear_softness = if self.linear_hertz == 0.0 {
            context.joint_softness
        } else {
            make_soft(self.linear_hertz, self.linear_damping_ratio, context.h)
        };
        self.angular_softness = if self.angular_hertz == 0.0 {
            context.joint_softness
        } else {
            make_soft(self.angular_hertz, self.angular_damping_ratio, context.h)
        };
        self.delta_angle = unwind_angle(Rot::relative_angle(base.rotation_a, base.rotation_b) - self.reference_angle);

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

    fn solve(&mut self, base: &JointBase, _context: &StepContext, bodies: &SolverBodies, use_bias: bool) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let mut state_a = bodies.get(base.index_a);
        let mut state_b = bodies.get(base.index_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        // angular constraint
        {
            let (mut bias, mut mass_scale, mut impulse_scale) = (0.0, 1.0, 0.0);
            if use_bias || self.angular_hertz > 0.0 {
                let c = Rot::relative_angle(state_a.delta_rotation, state_b.delta_rotation) + self.delta_angle;
                bias = self.angular_softness.bias_rate * c;
                mass_scale = self.angular_softness.mass_scale;
                impulse_scale = self.angular_softness.impulse_scale;
            }

            let cdot = w_b - w_a;
            let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.angular_impulse;
            self.angular_impulse += impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // linear constraint
        {
            let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);

            let (mut bias, mut mass_scale, mut impulse_scale) = (Vec2::ZERO, 1.0, 0.0);
            if use_bias || self.linear_hertz > 0.0 {
                let dc_a = state_a.delta_position;
                let dc_b = state_b.delta_position;
                let c = (dc_b - dc_a) + (r_b - r_a) + base.delta_center;
                bias = self.linear_softness.bias_rate * c;
                mass_scale = self.linear_softness.mass_scale;
                impulse_scale = self.linear_softness.impulse_scale;
            }

            let cdot = (v_b + Vec2::scalar_cross(w_b, r_b)) - (v_a + Vec2::scalar_cross(w_a, r_a));

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
        self.angular_impulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{ground_and_body, simulate};

    #[test]
    fn test_rigid_weld_holds_pose() {
        let (base, bodies) = ground_and_body(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0), Vec2::ZERO);
        bodies.with(0, |s| {
            s.linear_velocity = Vec2::new(-2.0, 3.0);
            s.angular_velocity = -4.0;
        });
        let mut joint = WeldJoint::new(&WeldJointDef::default());
        simulate(&mut joint, &base, &bodies, 30);

        let state = bodies.get(Some(0));
        assert!(state.delta_position.length() < 0.02, "{:?}", state.delta_position);
        assert!(state.delta_rotation.angle().abs() < 0.02);
        assert!(state.linear_velocity.length() < 0.1);
    }

    #[test]
    fn test_soft_weld_springs_back() {
        let (base, bodies) = ground_and_body(Vec2::new(1.5, 0.0), Vec2::new(1.0, 0.0), Vec2::ZERO);
        let mut joint = WeldJoint::new(&WeldJointDef {
            linear_hertz: 2.0,
            linear_damping_ratio: 1.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 1);
        // A soft spring has only started pulling back after one step
        let moved = -bodies.get(Some(0)).delta_position.x;
        assert!(moved > 0.0 && moved < 0.25, "moved {moved}");
    }
}
