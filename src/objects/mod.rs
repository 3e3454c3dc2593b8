//! Simulated objects: bodies, shapes and chains as stored by the world.

pub mod body;
pub mod chain;
pub mod shape;

pub use body::{BodyDef, BodyType};
pub use chain::ChainDef;
pub use shape::ShapeDef;

pub(crate) use body::Body;
pub(crate) use chain::Chain;
pub(crate) use shape::Shape;
