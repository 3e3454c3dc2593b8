//! Constraints between bodies: the contact solver, soft constraint math
//! and the joint types.
//!
//! Every joint implements [`Constraint`]. The world prepares a [`JointBase`]
//! from the body states at the start of the step and then drives the
//! constraint through warm starting and the biased and relaxed solves of
//! each sub-step.

pub mod contact_solver;
pub mod distance_joint;
pub mod motor_joint;
pub mod mouse_joint;
pub mod prismatic_joint;
pub mod revolute_joint;
pub mod softness;
pub mod weld_joint;
pub mod wheel_joint;

pub use distance_joint::{DistanceJoint, DistanceJointDef};
pub use motor_joint::{MotorJoint, MotorJointDef};
pub use mouse_joint::{MouseJoint, MouseJointDef};
pub use prismatic_joint::{PrismaticJoint, PrismaticJointDef};
pub use revolute_joint::{RevoluteJoint, RevoluteJointDef};
pub use softness::{make_soft, Softness};
pub use weld_joint::{WeldJoint, WeldJointDef};
pub use wheel_joint::{WheelJoint, WheelJointDef};

use crate::common::BodyId;
use crate::integration::{SolverBodies, StepContext};
use crate::math::{Rot, Vec2};

/// The solver interface shared by all joint types.
pub(crate) trait Constraint {
    /// Computes effective masses and clears impulses when warm starting is
    /// disabled.
    fn prepare(&mut self, base: &JointBase, context: &StepContext);

    /// Applies the impulses accumulated in the previous step.
    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies);

    /// One velocity iteration. `use_bias` enables position correction.
    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, use_bias: bool);

    /// Accumulated linear impulse in world space, for reporting forces.
    fn linear_impulse(&self) -> Vec2;

    /// Accumulated angular impulse, for reporting torques.
    fn angular_impulse(&self) -> f32;
}

/// Per-step data common to all joints: solver slots, masses and anchors
/// relative to the centers of mass.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JointBase {
    pub index_a: Option<usize>,
    pub index_b: Option<usize>,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    /// `center_b - center_a` at the start of the step.
    pub delta_center: Vec2,
    /// World center of mass of body B at the start of the step.
    pub center_b: Vec2,
    pub rotation_a: Rot,
    pub rotation_b: Rot,
    /// Position correction softness for the rigid parts of the joint.
    pub softness: Softness,
}

impl JointBase {
    /// Current anchors, rotated by the sub-step rotation deltas.
    #[inline]
    pub fn current_anchors(&self, dq_a: Rot, dq_b: Rot) -> (Vec2, Vec2) {
        (dq_a.rotate(self.anchor_a), dq_b.rotate(self.anchor_b))
    }
}

/// Lower and upper limit bias for a speculative or soft limit row.
/// Returns `(bias, mass_scale, impulse_scale)`.
#[inline]
pub(crate) fn limit_coefficients(c: f32, base: &JointBase, context: &StepContext, use_bias: bool) -> (f32, f32, f32) {
    if c > 0.0 {
        // speculation
        (c * context.inv_h, 1.0, 0.0)
    } else if use_bias {
        (
            base.softness.bias_rate * c,
            base.softness.mass_scale,
            base.softness.impulse_scale,
        )
    } else {
        (0.0, 1.0, 0.0)
    }
}

/// The joint type tag.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum JointType {
    Distance,
    Filter,
    Motor,
    Mouse,
    Prismatic,
    Revolute,
    Weld,
    Wheel,
}

/// Fields shared by every joint definition.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct JointDefBase {
    /// The first attached body.
    pub body_a: BodyId,
    /// The second attached body.
    pub body_b: BodyId,
    /// The local anchor point relative to body A's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to body B's origin.
    pub local_anchor_b: Vec2,
    /// Set this flag to true if the attached bodies should collide.
    pub collide_connected: bool,
    /// A joint event is reported when the constraint force exceeds this.
    pub force_threshold: f32,
    /// A joint event is reported when the constraint torque exceeds this.
    pub torque_threshold: f32,
    /// User data.
    pub user_data: u64,
}

impl Default for JointDefBase {
    fn default() -> Self {
        Self {
            body_a: BodyId::NULL,
            body_b: BodyId::NULL,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            collide_connected: false,
            force_threshold: f32::MAX,
            torque_threshold: f32::MAX,
            user_data: 0,
        }
    }
}

/// A joint that only prevents collision between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterJointDef {
    pub base: JointDefBase,
}

/// Type specific joint data.
#[derive(Debug, Clone)]
pub(crate) enum JointKind {
    Distance(DistanceJoint),
    Filter,
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Revolute(RevoluteJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

macro_rules! dispatch {
    ($self:expr, $joint:ident => $body:expr, filter => $filter:expr) => {
        match $self {
            JointKind::Distance($joint) => $body,
            JointKind::Motor($joint) => $body,
            JointKind::Mouse($joint) => $body,
            JointKind::Prismatic($joint) => $body,
            JointKind::Revolute($joint) => $body,
            JointKind::Weld($joint) => $body,
            JointKind::Wheel($joint) => $body,
            JointKind::Filter => $filter,
        }
    };
}

impl JointKind {
    pub fn joint_type(&self) -> JointType {
        match self {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Filter => JointType::Filter,
            JointKind::Motor(_) => JointType::Motor,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Wheel(_) => JointType::Wheel,
        }
    }
}

impl Constraint for JointKind {
    fn prepare(&mut self, base: &JointBase, context: &StepContext) {
        dispatch!(self, j => j.prepare(base, context), filter => ())
    }

    fn warm_start(&mut self, base: &JointBase, bodies: &SolverBodies) {
        dispatch!(self, j => j.warm_start(base, bodies), filter => ())
    }

    fn solve(&mut self, base: &JointBase, context: &StepContext, bodies: &SolverBodies, use_bias: bool) {
        dispatch!(self, j => j.solve(base, context, bodies, use_bias), filter => ())
    }

    fn linear_impulse(&self) -> Vec2 {
        dispatch!(self, j => j.linear_impulse(), filter => Vec2::ZERO)
    }

    fn angular_impulse(&self) -> f32 {
        dispatch!(self, j => j.angular_impulse(), filter => 0.0)
    }
}

/// The world's record of a joint.
#[derive(Debug, Clone)]
pub(crate) struct Joint {
    pub generation: u16,
    pub body_a: usize,
    pub body_b: usize,
    /// Anchors relative to the body origins.
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub collide_connected: bool,
    pub user_data: u64,
    pub force_threshold: f32,
    pub torque_threshold: f32,
    /// Per-joint override of the world joint tuning.
    pub tuning: Option<(f32, f32)>,
    pub island: Option<usize>,
    /// Force and torque applied during the last step.
    pub constraint_force: Vec2,
    pub constraint_torque: f32,
    pub kind: JointKind,
}

impl Joint {
    pub fn new(def: &JointDefBase, body_a: usize, body_b: usize, generation: u16, kind: JointKind) -> Self {
        Self {
            generation,
            body_a,
            body_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            collide_connected: def.collide_connected,
            user_data: def.user_data,
            force_threshold: def.force_threshold,
            torque_threshold: def.torque_threshold,
            tuning: None,
            island: None,
            constraint_force: Vec2::ZERO,
            constraint_torque: 0.0,
            kind,
        }
    }

    pub fn joint_type(&self) -> JointType {
        self.kind.joint_type()
    }
}

/// Applies a linear impulse `p` at `r_a`/`r_b` plus an angular impulse to
/// the pair of body states. Used by warm starting.
#[inline]
pub(crate) fn apply_impulse(
    base: &JointBase,
    bodies: &SolverBodies,
    p: Vec2,
    angular_a: f32,
    angular_b: f32,
) {
    let mut state_a = bodies.get(base.index_a);
    let mut state_b = bodies.get(base.index_b);
    state_a.linear_velocity = Vec2::mul_sub(state_a.linear_velocity, base.inv_mass_a, p);
    state_a.angular_velocity -= base.inv_i_a * angular_a;
    state_b.linear_velocity = Vec2::mul_add(state_b.linear_velocity, base.inv_mass_b, p);
    state_b.angular_velocity += base.inv_i_b * angular_b;
    bodies.set(base.index_a, state_a);
    bodies.set(base.index_b, state_b);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::integration::BodySim;
    use crate::math::Transform;

    pub fn context() -> StepContext {
        let h = 1.0 / 240.0;
        StepContext {
            dt: 4.0 * h,
            inv_dt: 60.0,
            h,
            inv_h: 240.0,
            sub_step_count: 4,
            gravity: Vec2::ZERO,
            joint_softness: make_soft(60.0, 2.0, h),
            contact_softness: make_soft(30.0, 10.0, h),
            static_softness: make_soft(60.0, 10.0, h),
            restitution_threshold: 1.0,
            max_linear_speed: 400.0,
            contact_push_max_velocity: 3.0,
            enable_warm_starting: true,
        }
    }

    pub fn sim(inv_mass: f32, inv_inertia: f32) -> BodySim {
        BodySim {
            transform: Transform::IDENTITY,
            center: Vec2::ZERO,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 },
            inv_mass,
            inv_inertia,
            min_extent: 0.5,
            max_extent: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            is_dynamic: inv_mass > 0.0,
            allow_fast_rotation: false,
        }
    }

    /// Static body A at the origin and a unit dynamic body B at `center_b`.
    pub fn ground_and_body(center_b: Vec2, anchor_a: Vec2, anchor_b: Vec2) -> (JointBase, SolverBodies) {
        let bodies = SolverBodies::new(&[sim(1.0, 1.0)], std::iter::once((Vec2::ZERO, 0.0)));
        let ctx = context();
        let base = JointBase {
            index_a: None,
            index_b: Some(0),
            inv_mass_a: 0.0,
            inv_mass_b: 1.0,
            inv_i_a: 0.0,
            inv_i_b: 1.0,
            anchor_a,
            anchor_b,
            delta_center: center_b,
            center_b,
            rotation_a: Rot::IDENTITY,
            rotation_b: Rot::IDENTITY,
            softness: ctx.joint_softness,
        };
        (base, bodies)
    }

    /// Runs a full step worth of sub-steps on a single joint, integrating
    /// positions of body B so that position error is corrected.
    pub fn simulate<C: Constraint>(joint: &mut C, base: &JointBase, bodies: &SolverBodies, steps: usize) {
        let ctx = context();
        joint.prepare(base, &ctx);
        for _ in 0..steps {
            for _ in 0..ctx.sub_step_count {
                joint.warm_start(base, bodies);
                joint.solve(base, &ctx, bodies, true);
                bodies.with(0, |s| crate::integration::integrator::integrate_positions(&ctx, s));
                joint.solve(base, &ctx, bodies, false);
            }
        }
    }
}
