//! The simulation world: object registry, stepping, events and queries.
//!
//! A [`PhysicsWorld`] owns every body, shape, chain, joint and contact
//! created in it. Objects are addressed by generational handles; a handle
//! whose object was destroyed is rejected with an `Invalid*` error instead
//! of aliasing whatever reuses the slot.

mod body;
mod chain;
mod contact;
pub mod def;
pub mod events;
mod graph;
mod island;
mod joint;
mod physics_world;
mod query;
mod sensor;
mod shape;
mod solver;
pub mod task;

pub use def::{
    ContactData, Counters, CustomFilterFn, ExplosionDef, MixingFn, PreSolveFn, Profile, RayResult, WorldDef,
};
pub use events::{
    BodyEvents, BodyMoveEvent, ContactBeginTouchEvent, ContactEndTouchEvent, ContactEvents, ContactHitEvent,
    JointEvent, JointEvents, SensorBeginTouchEvent, SensorEndTouchEvent, SensorEvents,
};
pub use physics_world::PhysicsWorld;
pub use task::{partition, SerialTaskSystem, TaskFn, TaskSystem};

#[cfg(feature = "parallel")]
pub use task::RayonTaskSystem;

use parking_lot::{const_mutex, Mutex};

use crate::common::constants::MAX_WORLDS;
use crate::common::{PhysicsError, Result, WorldId};

#[derive(Debug, Clone, Copy)]
struct WorldSlot {
    generation: u16,
    in_use: bool,
}

/// Process wide table of world slots. World ids are handed out lowest free
/// slot first, and each release bumps the slot generation so that ids of
/// destroyed worlds stay invalid.
static WORLD_SLOTS: Mutex<Vec<WorldSlot>> = const_mutex(Vec::new());

pub(crate) fn acquire_world_id() -> Result<WorldId> {
    let mut slots = WORLD_SLOTS.lock();
    let index = match slots.iter().position(|slot| !slot.in_use) {
        Some(index) => index,
        None if slots.len() < MAX_WORLDS => {
            slots.push(WorldSlot {
                generation: 0,
                in_use: false,
            });
            slots.len() - 1
        }
        None => return Err(PhysicsError::WorldCapacityExceeded(MAX_WORLDS)),
    };

    let slot = &mut slots[index];
    slot.in_use = true;
    Ok(WorldId {
        index1: index as u16 + 1,
        generation: slot.generation,
    })
}

pub(crate) fn release_world_id(id: WorldId) {
    let mut slots = WORLD_SLOTS.lock();
    if let Some(slot) = slots.get_mut(id.index1 as usize - 1) {
        if slot.in_use && slot.generation == id.generation {
            slot.in_use = false;
            slot.generation = slot.generation.wrapping_add(1);
        }
    }
}

/// True while the world this id refers to is alive.
pub fn world_is_valid(id: WorldId) -> bool {
    if id.is_null() || id.index1 as usize > MAX_WORLDS {
        return false;
    }
    let slots = WORLD_SLOTS.lock();
    matches!(slots.get(id.index1 as usize - 1), Some(slot) if slot.in_use && slot.generation == id.generation)
}
