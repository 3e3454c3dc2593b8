//! Shared definitions: constants, handles, errors, materials and utilities.

pub mod constants;
pub mod base;
pub mod error;
pub mod id;
pub mod material;

pub use base::{hash, length_units_per_meter, set_length_units_per_meter, version, Timer, Version, HASH_INIT};
pub use error::{PhysicsError, Result};
pub use id::{BodyId, ChainId, JointId, ShapeId, WorldId};
pub use material::{Filter, QueryFilter, SurfaceMaterial};
