use super::{apply_impulse, limit_coefficients, Constraint, JointBase, JointDefBase};
use super::softness::{make_soft, Softness};
use crate::integration::{SolverBodies, StepContext};
use crate::math::Vec2;

/// Wheel joint definition. Body B travels along a line fixed in body A and
/// rotates freely, with a suspension spring along the line. Designed for
/// vehicles.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WheelJointDef {
    pub base: JointDefBase,
    /// The local translation unit axis in body A.
    pub local_axis_a: Vec2,
    pub enable_spring: bool,
    /// Spring stiffness in hertz.
    pub hertz: f32,
    /// Spring damping ratio, non-dimensional.
    pub damping_ratio: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// The maximum motor torque, typically in newton-meters.
    pub max_motor_torque: f32,
    /// The desired motor speed in radians per second.
    pub motor_speed: f32,
}

impl Default for WheelJointDef {
    fn default() -> Self {
        Self {
            base: JointDefBase::default(),
            local_axis_a: Vec2::Y,
            enable_spring: true,
            hertz: 1.0,
            damping_ratio: 0.7,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WheelJoint {
    local_axis_a: Vec2,
    hertz: f32,
    damping_ratio: f32,
    lower_translation: f32,
    upper_translation: f32,
    max_motor_torque: f32,
    motor_speed: f32,
    enable_spring: bool,
    enable_limit: bool,
    enable_motor: bool,

    perp_impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    axis_a: Vec2,
    perp_mass: f32,
    motor_mass: f32,
    axial_mass: f32,
    spring_softness: Softness,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> Self {
        Self {
            local_axis_a: def.local_axis_a.normalize(),
            hertz: def.hertz,
            damping_ratio: def.damping_ratio,
            lower_translation: def.lower_translation.min(def.upper_translation),
            upper_translation: def.lower_translation.max(def.upper_translation),
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            enable_spring: def.enable_spring,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            perp_impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis_a: Vec2::ZERO,
            perp_mass: 0.0,
            motor_mass: 0.0,
            axial_mass: 0.0,
            spring_softness: Softness::default(),
        }
    }

    pub fn local_axis_a(&self) -> Vec2 {
        self.local_axis_a
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
        self.lower_translation
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
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
        self.spring_impulse + self.lower_impulse - self.upper_impulse
    }
}

impl Constraint for WheelJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        self.axis_a = base.rotation_a.rotate(self.local_axis_a);

        let r_a = base.anchor_a;
        let r_b = base.anchor_b;
        let d = base.delta_center + r_b - r_a;
        let axis = self.axis_a;
        let perp = axis.left_perp();

        // perpendicular constraint (keep wheel on line)
        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);
        let kp = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        self.perp_mass = if kp > 0.0 { 1.0 / kp } else { 0.0 };

        // spring constraint
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let ka = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
        self.axial_mass = if ka > 0.0 { 1.0 / ka } else { 0.0 };
        self.spring_softness = make_soft(self.hertz, self.damping_ratio, context.h);

        let km = i_a + i_b;
        self.motor_mass = if km > 0.0 { 1.0 / km } else { 0.0 };

        if !context.enable_warm_starting {
            self.perp_impulse = 0.0;
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

        let d = (state_b.delta_position - state_a.delta_position) + base.delta_center + r_b - r_a;
        let axis = state_a.delta_rotation.rotate(self.axis_a);
        let perp = axis.left_perp();

        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let axial = self.axial_impulse();
        let p = axial * axis + self.perp_impulse * perp;
        let l_a = axial * a1 + self.perp_impulse * s1 + self.motor_impulse;
        let l_b = axial * a2 + self.perp_impulse * s2 + self.motor_impulse;
        apply_impulse(base, bodies, p, l_a, l_b);
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, use_bias: bool) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        let mut state_a = bodies.get(base.index_a);
        let mut state_b = bodies.get(base.index_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        let fixed_rotation = i_a + i_b == 0.0;

        let (r_a, r_b) = base.current_anchors(state_a.delta_rotation, state_b.delta_rotation);
        let d = (state_b.delta_position - state_a.delta_position) + base.delta_center + r_b - r_a;
        let axis = state_a.delta_rotation.rotate(self.axis_a);
        let translation = axis.dot(d);

        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);

        let axial_cdot =
            |v_a: Vec2, w_a: f32, v_b: Vec2, w_b: f32| axis.dot(v_b - v_a) + a2 * w_b - a1 * w_a;
        let apply = |impulse: f32, v_a: &mut Vec2, w_a: &mut f32, v_b: &mut Vec2, w_b: &mut f32| {
            let p = impulse * axis;
            *v_a = Vec2::mul_sub(*v_a, m_a, p);
            *w_a -= i_a * impulse * a1;
            *v_b = Vec2::mul_add(*v_b, m_b, p);
            *w_b += i_b * impulse * a2;
        };

        // motor constraint
        if self.enable_motor && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = context.h * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // spring constraint
        if self.enable_spring {
            // This is a real spring and should be applied even during relax
            let c = translation;
            let bias = self.spring_softness.bias_rate * c;
            let mass_scale = self.spring_softness.mass_scale;
            let impulse_scale = self.spring_softness.impulse_scale;

            let cdot = axial_cdot(v_a, w_a, v_b, w_b);
            let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.spring_impulse;
            self.spring_impulse += impulse;
            apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
        }

        if self.enable_limit {
            // lower limit
            {
                let c = translation - self.lower_translation;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let cdot = axial_cdot(v_a, w_a, v_b, w_b);
                let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.lower_impulse;
                let new_impulse = (self.lower_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.lower_impulse;
                self.lower_impulse = new_impulse;
                apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }

            // upper limit, signs flipped
            {
                let c = self.upper_translation - translation;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let cdot = -axial_cdot(v_a, w_a, v_b, w_b);
                let impulse = -mass_scale * self.axial_mass * (cdot + bias) - impulse_scale * self.upper_impulse;
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;
                apply(-impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }
        }

        // point to line constraint
        {
            let perp = axis.left_perp();

            let (mut bias, mut mass_scale, mut impulse_scale) = (0.0, 1.0, 0.0);
            if use_bias {
                let c = perp.dot(d);
                bias = base.softness.bias_rate * c;
                mass_scale = base.softness.mass_scale;
                impulse_scale = base.softness.impulse_scale;
            }

            let s1 = (d + r_a).cross(perp);
            let s2 = r_b.cross(perp);
            let cdot = perp.dot(v_b - v_a) + s2 * w_b - s1 * w_a;

            let impulse = -mass_scale * self.perp_mass * (cdot + bias) - impulse_scale * self.perp_impulse;
            self.perp_impulse += impulse;

            let p = impulse * perp;
            v_a = Vec2::mul_sub(v_a, m_a, p);
            w_a -= i_a * impulse * s1;
            v_b = Vec2::mul_add(v_b, m_b, p);
            w_b += i_b * impulse * s2;
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(base.index_a, state_a);
        bodies.set(base.index_b, state_b);
    }

    fn linear_impulse(&self) -> Vec2 {
        self.perp_impulse * self.axis_a.left_perp() + self.axial_impulse() * self.axis_a
    }

    fn angular_impulse(&self) -> f32 {
        self.motor_impulse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::{context, ground_and_body, simulate};
    use approx::assert_relative_eq;

    #[test]
    fn test_wheel_stays_on_line_and_spins_freely() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        bodies.with(0, |s| {
            s.linear_velocity = Vec2::new(2.0, 0.0);
            s.angular_velocity = 3.0;
        });
        let mut joint = WheelJoint::new(&WheelJointDef {
            enable_spring: false,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 10);
        let state = bodies.get(Some(0));
        // the default axis is vertical, so horizontal motion is removed
        assert_relative_eq!(state.linear_velocity.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(state.angular_velocity, 3.0, epsilon = 1e-3);
    }

    #[test]
    fn test_suspension_spring_pulls_back() {
        let (base, bodies) = ground_and_body(Vec2::new(0.0, -0.5), Vec2::ZERO, Vec2::ZERO);
        let mut joint = WheelJoint::new(&WheelJointDef {
            hertz: 5.0,
            damping_ratio: 1.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 120);
        let y = -0.5 + bodies.get(Some(0)).delta_position.y;
        assert!(y.abs() < 0.05, "y {y}");
    }

    #[test]
    fn test_motor_spins_wheel() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let mut joint = WheelJoint::new(&WheelJointDef {
            enable_motor: true,
            motor_speed: -6.0,
            max_motor_torque: 1000.0,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 1);
        assert_relative_eq!(bodies.get(Some(0)).angular_velocity, -6.0, epsilon = 1e-3);
    }

    #[test]
    fn test_motor_torque_is_capped() {
        let (base, bodies) = ground_and_body(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let max_motor_torque = 100.0;
        let mut joint = WheelJoint::new(&WheelJointDef {
            enable_motor: true,
            motor_speed: -6.0,
            max_motor_torque,
            ..Default::default()
        });
        simulate(&mut joint, &base, &bodies, 1);
        // unit inertia, so one step gains at most torque * dt
        let dt = context().dt;
        assert_relative_eq!(bodies.get(Some(0)).angular_velocity, -max_motor_torque * dt, epsilon = 1e-3);

        simulate(&mut joint, &base, &bodies, 10);
        assert_relative_eq!(bodies.get(Some(0)).angular_velocity, -6.0, epsilon = 1e-3);
    }
}
