//! Per-step solver data for awake bodies and the velocity/position
//! integrator that advances it.

pub mod integrator;

use crate::constraints::softness::Softness;
use crate::math::{Rot, Transform, Vec2};
use parking_lot::Mutex;

/// The velocity state the constraint solver reads and writes. Positions
/// are accumulated as deltas from the start of the step so that anchors
/// stay precise far from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BodyState {
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub delta_position: Vec2,
    pub delta_rotation: Rot,
}

impl BodyState {
    /// State of a body that never moves, used for static bodies.
    pub const IDENTITY: BodyState = BodyState {
        linear_velocity: Vec2::ZERO,
        angular_velocity: 0.0,
        delta_position: Vec2::ZERO,
        delta_rotation: Rot::IDENTITY,
    };
}

impl Default for BodyState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Everything the solver needs about an awake body besides its velocity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodySim {
    pub transform: Transform,
    pub center: Vec2,
    pub force: Vec2,
    pub torque: f32,
    pub mass: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub min_extent: f32,
    pub max_extent: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub is_dynamic: bool,
    pub allow_fast_rotation: bool,
}

/// Solver body states behind per-body locks. Constraints of one graph color
/// never share a dynamic body, so the locks are uncontended; they exist so
/// the colored stages can run on any task system without unsafe aliasing.
#[derive(Debug, Default)]
pub(crate) struct SolverBodies {
    states: Vec<Mutex<BodyState>>,
    dynamic: Vec<bool>,
}

impl SolverBodies {
    pub fn new(sims: &[BodySim], velocities: impl Iterator<Item = (Vec2, f32)>) -> Self {
        let states = velocities
            .map(|(v, w)| {
                Mutex::new(BodyState {
                    linear_velocity: v,
                    angular_velocity: w,
                    ..BodyState::IDENTITY
                })
            })
            .collect();
        Self {
            states,
            dynamic: sims.iter().map(|s| s.is_dynamic).collect(),
        }
    }

    /// Copy of a body state. `None` is a static body.
    #[inline]
    pub fn get(&self, index: Option<usize>) -> BodyState {
        match index {
            Some(i) => *self.states[i].lock(),
            None => BodyState::IDENTITY,
        }
    }

    /// Writes back a state produced by a constraint. Non-dynamic bodies are
    /// never changed by constraints.
    #[inline]
    pub fn set(&self, index: Option<usize>, state: BodyState) {
        if let Some(i) = index {
            if self.dynamic[i] {
                *self.states[i].lock() = state;
            }
        }
    }

    /// Unconditional access for the integration stages.
    #[inline]
    pub fn with<R>(&self, index: usize, f: impl FnOnce(&mut BodyState) -> R) -> R {
        f(&mut self.states[index].lock())
    }
}

/// Step parameters shared by every solver stage.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepContext {
    /// Full time step.
    pub dt: f32,
    pub inv_dt: f32,
    /// Sub-step.
    pub h: f32,
    pub inv_h: f32,
    pub sub_step_count: usize,
    pub gravity: Vec2,
    pub joint_softness: Softness,
    pub contact_softness: Softness,
    pub static_softness: Softness,
    pub restitution_threshold: f32,
    pub max_linear_speed: f32,
    pub contact_push_max_velocity: f32,
    pub enable_warm_starting: bool,
}
