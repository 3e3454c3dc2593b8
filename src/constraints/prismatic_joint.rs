use super::{apply_impulse, limit_coefficients, Constraint, JointBase, JointDefBase};
use super::softness::{make_soft, Softness};
use crate::integration::{SolverBodies, StepContext};
use crate::math::{Mat22, Rot, Vec2};

/// Prismatic joint definition. Body B slides along an axis fixed in body A
/// and cannot rotate relative to it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PrismaticJointDef {
    pub base: JointDefBase,
    /// The local translation unit axis in body A.
    pub local_axis_a: Vec2,
    /// The constrained angle between the bodies: body B angle minus body A angle.
    pub reference_angle: f32,
    pub enable_spring: bool,
    pub hertz: f32,
    pub damping_ratio: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    /// The maximum motor force, typically in newtons.
    pub max_motor_force: f32,
    /// The desired motor speed, typically in meters per second.
    pub motor_speed: f32,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            base: JointDefBase::default(),
            local_axis_a: Vec2::X,
            reference_angle: 0.0,
            enable_spring: false,
            hertz: 0.0,
            damping_ratio: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    local_axis_a: Vec2,
    reference_angle: f32,
    hertz: f32,
    damping_ratio: f32,
    lower_translation: f32,
    upper_translation: f32,
    max_motor_force: f32,
    motor_speed: f32,
    enable_spring: bool,
    enable_limit: bool,
    enable_motor: bool,

    /// Perpendicular and angular impulse.
    impulse: Vec2,
    spring_impulse: f32,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,

    axis_a: Vec2,
    delta_angle: f32,
    axial_mass: f32,
    spring_softness: Softness,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        Self {
            local_axis_a: def.local_axis_a.normalize(),
            reference_angle: def.reference_angle,
            hertz: def.hertz,
            damping_ratio: def.damping_ratio,
            lower_translation: def.lower_translation.min(def.upper_translation),
            upper_translation: def.lower_translation.max(def.upper_translation),
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_spring: def.enable_spring,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            impulse: Vec2::ZERO,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis_a: Vec2::ZERO,
            delta_angle: 0.0,
            axial_mass: 0.0,
            spring_softness: Softness::default(),
        }
    }

    pub fn local_axis_a(&self) -> Vec2 {
        self.local_axis_a
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Translation of world anchor `p_b` relative to `p_a` along the axis.
    pub fn translation(&self, q_a: Rot, p_a: Vec2, p_b: Vec2) -> f32 {
        q_a.rotate(self.local_axis_a).dot(p_b - p_a)
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

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    pub fn max_motor_force(&self) -> f32 {
        self.max_motor_force
    }

    pub fn motor_force(&self, inv_h: f32) -> f32 {
        inv_h * self.motor_impulse
    }

    fn axial_impulse(&self) -> f32 {
        self.spring_impulse + self.motor_impulse + self.lower_impulse - self.upper_impulse
    }
}

impl Constraint for PrismaticJoint {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        let (m_a, i_a, m_b, i_b) = (base.inv_mass_a, base.inv_i_a, base.inv_mass_b, base.inv_i_b);
        self.axis_a = base.rotation_a.rotate(self.local_axis_a);
        self.delta_angle = Rot::relative_angle(base.rotation_a, base.rotation_b) - self.reference_angle;

        let r_a = base.anchor_a;
        let r_b = base.anchor_b;
        let d = base.delta_center + r_b - r_a;
        let a1 = (d + r_a).cross(self.axis_a);
        let a2 = r_b.cross(self.axis_a);

        let k = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
        self.axial_mass = if k > 0.0 { 1.0 / k } else { 0.0 };
        self.spring_softness = make_soft(self.hertz, self.damping_ratio, context.h);

        if !context.enable_warm_starting {
            self.impulse = Vec2::ZERO;
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

        // impulse is applied at anchor B
        let a1 = (d + r_a).cross(axis);
        let a2 = r_b.cross(axis);
        let axial = self.axial_impulse();

        let perp = axis.left_perp();
        let s1 = (d + r_a).cross(perp);
        let s2 = r_b.cross(perp);

        let p = axial * axis + self.impulse.x * perp;
        let l_a = axial * a1 + self.impulse.x * s1 + self.impulse.y;
        let l_b = axial * a2 + self.impulse.x * s2 + self.impulse.y;
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

        // spring
        if self.enable_spring && self.hertz > 0.0 {
            let c = translation;
            let bias = self.spring_softness.bias_rate * c;
            let mass_scale = self.spring_softness.mass_scale;
            let impulse_scale = self.spring_softness.impulse_scale;

            let cdot = axial_cdot(v_a, w_a, v_b, w_b);
            let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.spring_impulse;
            self.spring_impulse += impulse;
            apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
        }

        // motor
        if self.enable_motor {
            let cdot = axial_cdot(v_a, w_a, v_b, w_b);
            let impulse = self.axial_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = context.h * self.max_motor_force;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;
            apply(impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
        }

        if self.enable_limit {
            // lower limit
            {
                let c = translation - self.lower_translation;
                let (bias, mass_scale, impulse_scale) = limit_coefficients(c, base, context, use_bias);

                let cdot = axial_cdot(v_a, w_a, v_b, w_b);
                let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.lower_impulse;
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
                let impulse = -self.axial_mass * mass_scale * (cdot + bias) - impulse_scale * self.upper_impulse;
                let new_impulse = (self.upper_impulse + impulse).max(0.0);
                let impulse = new_impulse - self.upper_impulse;
                self.upper_impulse = new_impulse;
                apply(-impulse, &mut v_a, &mut w_a, &mut v_b, &mut w_b);
            }
        }

        // the perpendicular and angular rows in block form
        {
            let perp = axis.left_perp();
            let s1 = (d + r_a).cross(perp);
            let s2 = r_b.cross(perp);

            let cdot = Vec2::new(perp.dot(v_b - v_a) + s2 * w_b - s1 * w_a, w_b - w_a);

            let (mut bias, mut mass_scale, mut impulse_scale) = (Vec2::ZERO, 1.0, 0.0);
            if use_bias {
                let c = Vec2::new(
                    perp.dot(d),
                    Rot::relative_angle(state_a.delta_rotation, state_b.delta_rotation) + self.delta_angle,
                );
                bias = base.softness.bias_rate * c;
                mass_scale = base.softness.mass_scale;
                impulse_scale = base.softness.impulse_scale;
            }

            let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let k12 = i_a * s1 + i_b * s2;
            let mut k22 = i_a + i_b;
            if k22 == 0.0 {
                // for bodies with fixed rotation
                k22 = 1.0;
            }
            let k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
            let b = k.solve(cdot + bias);

            let impulse = Vec2::new(
                -mass_scale * b.x - impulse_scale * self.impulse.x,
                -mass_scale * b.y - impulse_scale * self.impulse.y,
            );
            self.impulse += impulse;

            let p = impulse.x * perp;
            let l_a = impulse.x * s1 + impulse.y;
            let l_b = impulse.x * s2 + impulse.y;

            v_a = Vec2::mul_sub(v_a, m_a, p);
            w_a -= i_a * l_a;
            v_b = Vec2::mul_add(v_b, m_b, p);
            w_b += i_b * l_b;
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(base.index_a, state_a);
        bodies.set(base.index_b, state_b);
    }

    fn linear_impulse(&self) -> Vec2 {
        self.impulse.x * self.axis_a.left_perp() + self.axial_impulse() * self.axis_a
    }

    fn angular_impulse(&self) -> f32 {
        self.impulse.y
    }
}
