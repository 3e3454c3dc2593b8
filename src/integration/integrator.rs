use super::{BodySim, BodyState, StepContext};
use crate::common::constants::MAX_ROTATION;
use crate::math::Vec2;

/// Applies gravity, forces and damping to a body's velocity for one
/// sub-step, then clamps the result. Returns true if the linear speed had to
/// be capped.
pub(crate) fn integrate_velocities(context: &StepContext, sim: &BodySim, state: &mut BodyState) -> bool {
    if !sim.is_dynamic {
        return false;
    }

    let h = context.h;
    let max_angular_speed = MAX_ROTATION * context.inv_h;
    let max_linear_speed = context.max_linear_speed;

    let mut v = state.linear_velocity;
    let mut w = state.angular_velocity;

    // Damping by the Pade approximation of exp(-c * h)
    let linear_damping = 1.0 / (1.0 + h * sim.linear_damping);
    let angular_damping = 1.0 / (1.0 + h * sim.angular_damping);

    let linear_velocity_delta =
        h * sim.inv_mass * Vec2::mul_add(sim.force, sim.mass * sim.gravity_scale, context.gravity);
    let angular_velocity_delta = h * sim.inv_inertia * sim.torque;

    v = Vec2::mul_add(linear_velocity_delta, linear_damping, v);
    w = angular_velocity_delta + angular_damping * w;

    let mut capped = false;
    if v.length_squared() > max_linear_speed * max_linear_speed {
        v = max_linear_speed * v.normalize();
        capped = true;
    }

    if w * w > max_angular_speed * max_angular_speed && !sim.allow_fast_rotation {
        w = w.clamp(-max_angular_speed, max_angular_speed);
    }

    state.linear_velocity = v;
    state.angular_velocity = w;
    capped
}

/// Advances the accumulated position and rotation deltas by one sub-step.
pub(crate) fn integrate_positions(context: &StepContext, state: &mut BodyState) {
    state.delta_rotation = state.delta_rotation.integrate(context.h * state.angular_velocity);
    state.delta_position = Vec2::mul_add(state.delta_position, context.h, state.linear_velocity);
}

/// Speed used to decide whether a body may sleep. Position corrections
/// count at half weight so that a body pushed by the solver stays awake.
pub(crate) fn sleep_velocity(state: &BodyState, max_extent: f32, inv_dt: f32) -> f32 {
    let max_velocity = state.linear_velocity.length() + state.angular_velocity.abs() * max_extent;
    let max_delta_position = state.delta_position.length() + state.delta_rotation.s.abs() * max_extent;
    max_velocity.max(0.5 * inv_dt * max_delta_position)
}
