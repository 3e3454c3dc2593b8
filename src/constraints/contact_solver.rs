//! Soft-step contact constraints: prepare, warm start, solve, relax,
//! restitution and impulse storage.

use super::softness::Softness;
use crate::collision::manifold::Manifold;
use crate::integration::{SolverBodies, StepContext};
use crate::math::Vec2;

/// Mass and velocity of one side of a constraint at prepare time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConstraintBody {
    /// Solver slot, `None` for static or sleeping bodies.
    pub index: Option<usize>,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ContactConstraintPoint {
    /// Anchors relative to the body centers of mass, fixed for the step.
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub base_separation: f32,
    /// Normal velocity before the solve, used by restitution.
    pub relative_velocity: f32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub total_normal_impulse: f32,
    pub max_normal_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ContactConstraint {
    /// Index of the contact this constraint was built from.
    pub contact: usize,
    pub index_a: Option<usize>,
    pub index_b: Option<usize>,
    pub points: [ContactConstraintPoint; 2],
    pub point_count: usize,
    pub normal: Vec2,
    pub inv_mass_a: f32,
    pub inv_i_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub rolling_resistance: f32,
    pub rolling_mass: f32,
    pub rolling_impulse: f32,
    pub softness: Softness,
}

/// Surface values mixed from the two shapes of a contact.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ContactSurface {
    pub friction: f32,
    pub restitution: f32,
    pub rolling_resistance: f32,
    pub tangent_speed: f32,
}

impl ContactConstraint {
    /// Builds the constraint from a manifold whose anchors are relative to
    /// the body centers of mass.
    pub fn prepare(
        contact: usize,
        manifold: &Manifold,
        surface: ContactSurface,
        body_a: &ConstraintBody,
        body_b: &ConstraintBody,
        context: &StepContext,
    ) -> Self {
        let (m_a, i_a) = (body_a.inv_mass, body_a.inv_inertia);
        let (m_b, i_b) = (body_b.inv_mass, body_b.inv_inertia);
        let (v_a, w_a) = (body_a.linear_velocity, body_a.angular_velocity);
        let (v_b, w_b) = (body_b.linear_velocity, body_b.angular_velocity);

        // Stiffer for static contacts to avoid bodies getting pushed through the ground
        let softness = if m_a == 0.0 || m_b == 0.0 {
            context.static_softness
        } else {
            context.contact_softness
        };
        let warm_start_scale = if context.enable_warm_starting { 1.0 } else { 0.0 };

        let normal = manifold.normal;
        let tangent = normal.right_perp();

        let mut points = [ContactConstraintPoint::default(); 2];
        for (cp, mp) in points.iter_mut().zip(manifold.points()) {
            let r_a = mp.anchor_a;
            let r_b = mp.anchor_b;

            let rn_a = r_a.cross(normal);
            let rn_b = r_b.cross(normal);
            let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

            let rt_a = r_a.cross(tangent);
            let rt_b = r_b.cross(tangent);
            let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;

            let vr_a = v_a + Vec2::scalar_cross(w_a, r_a);
            let vr_b = v_b + Vec2::scalar_cross(w_b, r_b);

            *cp = ContactConstraintPoint {
                anchor_a: r_a,
                anchor_b: r_b,
                base_separation: mp.separation - (r_b - r_a).dot(normal),
                relative_velocity: normal.dot(vr_b - vr_a),
                normal_impulse: warm_start_scale * mp.normal_impulse,
                tangent_impulse: warm_start_scale * mp.tangent_impulse,
                total_normal_impulse: 0.0,
                max_normal_impulse: 0.0,
                normal_mass: if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 },
                tangent_mass: if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 },
            };
        }

        let k = i_a + i_b;
        Self {
            contact,
            index_a: body_a.index,
            index_b: body_b.index,
            points,
            point_count: manifold.point_count,
            normal,
            inv_mass_a: m_a,
            inv_i_a: i_a,
            inv_mass_b: m_b,
            inv_i_b: i_b,
            friction: surface.friction,
            restitution: surface.restitution,
            tangent_speed: surface.tangent_speed,
            rolling_resistance: surface.rolling_resistance,
            rolling_mass: if k > 0.0 { 1.0 / k } else { 0.0 },
            rolling_impulse: warm_start_scale * manifold.rolling_impulse,
            softness,
        }
    }

    pub fn warm_start(&self, bodies: &SolverBodies) {
        let mut state_a = bodies.get(self.index_a);
        let mut state_b = bodies.get(self.index_b);
        let (m_a, i_a, m_b, i_b) = (self.inv_mass_a, self.inv_i_a, self.inv_mass_b, self.inv_i_b);

        let normal = self.normal;
        let tangent = normal.right_perp();

        for cp in &self.points[..self.point_count] {
            let p = cp.normal_impulse * normal + cp.tangent_impulse * tangent;
            state_a.angular_velocity -= i_a * cp.anchor_a.cross(p);
            state_a.linear_velocity = Vec2::mul_add(state_a.linear_velocity, -m_a, p);
            state_b.angular_velocity += i_b * cp.anchor_b.cross(p);
            state_b.linear_velocity = Vec2::mul_add(state_b.linear_velocity, m_b, p);
        }

        state_a.angular_velocity -= i_a * self.rolling_impulse;
        state_b.angular_velocity += i_b * self.rolling_impulse;

        bodies.set(self.index_a, state_a);
        bodies.set(self.index_b, state_b);
    }

    /// One velocity iteration. With `use_bias` the soft position correction
    /// is applied; without it the solve only removes velocity error (relax).
    pub fn solve(&mut self, bodies: &SolverBodies, context: &StepContext, use_bias: bool) {
        let mut state_a = bodies.get(self.index_a);
        let mut state_b = bodies.get(self.index_b);
        let (m_a, i_a, m_b, i_b) = (self.inv_mass_a, self.inv_i_a, self.inv_mass_b, self.inv_i_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        let dq_a = state_a.delta_rotation;
        let dq_b = state_b.delta_rotation;
        let dp = state_b.delta_position - state_a.delta_position;

        let normal = self.normal;
        let tangent = normal.right_perp();
        let softness = self.softness;
        let mut total_normal_impulse = 0.0;

        for cp in self.points[..self.point_count].iter_mut() {
            // compute current separation
            let pr_a = dq_a.rotate(cp.anchor_a);
            let pr_b = dq_b.rotate(cp.anchor_b);
            let d = dp + (pr_b - pr_a);
            let s = normal.dot(d) + cp.base_separation;

            let mut velocity_bias = 0.0;
            let mut mass_scale = 1.0;
            let mut impulse_scale = 0.0;
            if s > 0.0 {
                // speculative
                velocity_bias = s * context.inv_h;
            } else if use_bias {
                velocity_bias = (softness.bias_rate * s).max(-context.contact_push_max_velocity);
                mass_scale = softness.mass_scale;
                impulse_scale = softness.impulse_scale;
            }

            let r_a = cp.anchor_a;
            let r_b = cp.anchor_b;
            let vr_a = v_a + Vec2::scalar_cross(w_a, r_a);
            let vr_b = v_b + Vec2::scalar_cross(w_b, r_b);
            let vn = (vr_b - vr_a).dot(normal);

            let mut impulse = -cp.normal_mass * mass_scale * (vn + velocity_bias) - impulse_scale * cp.normal_impulse;

            // clamp the accumulated impulse
            let new_impulse = (cp.normal_impulse + impulse).max(0.0);
            impulse = new_impulse - cp.normal_impulse;
            cp.normal_impulse = new_impulse;
            cp.max_normal_impulse = cp.max_normal_impulse.max(impulse);
            cp.total_normal_impulse += new_impulse;
            total_normal_impulse += new_impulse;

            let p = impulse * normal;
            v_a = Vec2::mul_sub(v_a, m_a, p);
            w_a -= i_a * r_a.cross(p);
            v_b = Vec2::mul_add(v_b, m_b, p);
            w_b += i_b * r_b.cross(p);
        }

        // Friction
        for cp in self.points[..self.point_count].iter_mut() {
            let r_a = cp.anchor_a;
            let r_b = cp.anchor_b;
            let vr_a = v_a + Vec2::scalar_cross(w_a, r_a);
            let vr_b = v_b + Vec2::scalar_cross(w_b, r_b);
            let vt = (vr_b - vr_a).dot(tangent);

            let mut impulse = -cp.tangent_mass * (vt - self.tangent_speed);

            let max_friction = self.friction * cp.normal_impulse;
            let new_impulse = (cp.tangent_impulse + impulse).clamp(-max_friction, max_friction);
            impulse = new_impulse - cp.tangent_impulse;
            cp.tangent_impulse = new_impulse;

            let p = impulse * tangent;
            v_a = Vec2::mul_sub(v_a, m_a, p);
            w_a -= i_a * r_a.cross(p);
            v_b = Vec2::mul_add(v_b, m_b, p);
            w_b += i_b * r_b.cross(p);
        }

        // Rolling resistance
        if self.rolling_resistance > 0.0 {
            let mut delta_lambda = -self.rolling_mass * (w_b - w_a);
            let lambda = self.rolling_impulse;
            let max_lambda = self.rolling_resistance * total_normal_impulse;
            self.rolling_impulse = (lambda + delta_lambda).clamp(-max_lambda, max_lambda);
            delta_lambda = self.rolling_impulse - lambda;
            w_a -= i_a * delta_lambda;
            w_b += i_b * delta_lambda;
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(self.index_a, state_a);
        bodies.set(self.index_b, state_b);
    }

    /// Bounce pass run once after the sub-steps.
    pub fn apply_restitution(&mut self, bodies: &SolverBodies, context: &StepContext) {
        if self.restitution == 0.0 {
            return;
        }

        let mut state_a = bodies.get(self.index_a);
        let mut state_b = bodies.get(self.index_b);
        let (m_a, i_a, m_b, i_b) = (self.inv_mass_a, self.inv_i_a, self.inv_mass_b, self.inv_i_b);

        let mut v_a = state_a.linear_velocity;
        let mut w_a = state_a.angular_velocity;
        let mut v_b = state_b.linear_velocity;
        let mut w_b = state_b.angular_velocity;

        let normal = self.normal;
        let threshold = context.restitution_threshold;

        for cp in self.points[..self.point_count].iter_mut() {
            // Skip slow approaches and speculative points that never pushed
            if cp.relative_velocity > -threshold || cp.max_normal_impulse == 0.0 {
                continue;
            }

            let r_a = cp.anchor_a;
            let r_b = cp.anchor_b;
            let vr_a = v_a + Vec2::scalar_cross(w_a, r_a);
            let vr_b = v_b + Vec2::scalar_cross(w_b, r_b);
            let vn = (vr_b - vr_a).dot(normal);

            let mut impulse = -cp.normal_mass * (vn + self.restitution * cp.relative_velocity);

            let new_impulse = (cp.normal_impulse + impulse).max(0.0);
            impulse = new_impulse - cp.normal_impulse;
            cp.normal_impulse = new_impulse;
            cp.max_normal_impulse = cp.max_normal_impulse.max(impulse);
            cp.total_normal_impulse += impulse;

            let p = impulse * normal;
            v_a = Vec2::mul_sub(v_a, m_a, p);
            w_a -= i_a * r_a.cross(p);
            v_b = Vec2::mul_add(v_b, m_b, p);
            w_b += i_b * r_b.cross(p);
        }

        state_a.linear_velocity = v_a;
        state_a.angular_velocity = w_a;
        state_b.linear_velocity = v_b;
        state_b.angular_velocity = w_b;
        bodies.set(self.index_a, state_a);
        bodies.set(self.index_b, state_b);
    }

    /// Copies the accumulated impulses into the manifold for warm starting
    /// the next step.
    pub fn store_impulses(&self, manifold: &mut Manifold) {
        manifold.rolling_impulse = self.rolling_impulse;
        for (mp, cp) in manifold.points_mut().iter_mut().zip(&self.points) {
            mp.normal_impulse = cp.normal_impulse;
            mp.tangent_impulse = cp.tangent_impulse;
            mp.total_normal_impulse = cp.total_normal_impulse;
            mp.normal_velocity = cp.relative_velocity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::manifold::ManifoldPoint;
    use crate::constraints::softness::make_soft;
    use crate::integration::BodySim;
    use crate::math::Transform;
    use approx::assert_relative_eq;

    fn context() -> StepContext {
        let h = 1.0 / 240.0;
        StepContext {
            dt: 4.0 * h,
            inv_dt: 60.0,
            h,
            inv_h: 240.0,
            sub_step_count: 4,
            gravity: Vec2::new(0.0, -10.0),
            joint_softness: make_soft(60.0, 2.0, h),
            contact_softness: make_soft(30.0, 10.0, h),
            static_softness: make_soft(60.0, 10.0, h),
            restitution_threshold: 1.0,
            max_linear_speed: 400.0,
            contact_push_max_velocity: 3.0,
            enable_warm_starting: true,
        }
    }

    fn sim(is_dynamic: bool) -> BodySim {
        BodySim {
            transform: Transform::IDENTITY,
            center: Vec2::ZERO,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 1.0,
            inv_mass: 1.0,
            inv_inertia: 1.0,
            min_extent: 0.5,
            max_extent: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            is_dynamic,
            allow_fast_rotation: false,
        }
    }

    /// Ball B falling onto static ground A with the contact point straight
    /// below the ball center.
    fn falling_contact(speed: f32, restitution: f32) -> (ContactConstraint, SolverBodies) {
        let mut manifold = Manifold {
            normal: Vec2::new(0.0, 1.0),
            point_count: 1,
            ..Default::default()
        };
        manifold.points[0] = ManifoldPoint {
            anchor_a: Vec2::new(0.0, 0.5),
            anchor_b: Vec2::new(0.0, -0.5),
            separation: 0.0,
            id: 0,
            ..Default::default()
        };

        let bodies = SolverBodies::new(&[sim(true)], std::iter::once((Vec2::new(0.0, -speed), 0.0)));
        let ground = ConstraintBody::default();
        let ball = ConstraintBody {
            index: Some(0),
            inv_mass: 1.0,
            inv_inertia: 1.0,
            linear_velocity: Vec2::new(0.0, -speed),
            angular_velocity: 0.0,
        };
        let surface = ContactSurface {
            friction: 0.6,
            restitution,
            ..Default::default()
        };
        let constraint = ContactConstraint::prepare(7, &manifold, surface, &ground, &ball, &context());
        (constraint, bodies)
    }

    #[test]
    fn test_solve_stops_approach() {
        let (mut constraint, bodies) = falling_contact(2.0, 0.0);
        assert_eq!(constraint.contact, 7);
        assert_relative_eq!(constraint.points[0].relative_velocity, -2.0);

        constraint.solve(&bodies, &context(), false);
        let state = bodies.get(Some(0));
        assert_relative_eq!(state.linear_velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(constraint.points[0].normal_impulse, 2.0, epsilon = 1e-5);

        // Static side never changes
        assert_eq!(bodies.get(None).linear_velocity, Vec2::ZERO);
    }

    #[test]
    fn test_restitution_bounces() {
        let (mut constraint, bodies) = falling_contact(4.0, 0.5);
        let ctx = context();
        constraint.solve(&bodies, &ctx, false);
        constraint.apply_restitution(&bodies, &ctx);
        assert_relative_eq!(bodies.get(Some(0)).linear_velocity.y, 2.0, epsilon = 1e-4);

        let mut manifold = Manifold {
            point_count: 1,
            ..Default::default()
        };
        constraint.store_impulses(&mut manifold);
        assert_relative_eq!(manifold.points[0].normal_impulse, 6.0, epsilon = 1e-4);
        assert_relative_eq!(manifold.points[0].normal_velocity, -4.0);
    }

    #[test]
    fn test_slow_contacts_do_not_bounce() {
        let (mut constraint, bodies) = falling_contact(0.5, 1.0);
        let ctx = context();
        constraint.solve(&bodies, &ctx, false);
        constraint.apply_restitution(&bodies, &ctx);
        assert_relative_eq!(bodies.get(Some(0)).linear_velocity.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_warm_start_applies_stored_impulse() {
        let (mut constraint, bodies) = falling_contact(0.0, 0.0);
        constraint.points[0].normal_impulse = 0.25;
        constraint.warm_start(&bodies);
        assert_relative_eq!(bodies.get(Some(0)).linear_velocity.y, 0.25);
    }
}
