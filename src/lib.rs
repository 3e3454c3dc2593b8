//! rigid2d: a 2D rigid body physics engine.
//!
//! A [`PhysicsWorld`] owns bodies, shapes, chains and joints and advances
//! them with a sub-stepped soft constraint solver. Objects are addressed
//! through generational handles ([`BodyId`], [`ShapeId`], [`JointId`],
//! [`ChainId`]) that are rejected once their object is destroyed.
//!
//! ```
//! use rigid2d::{BodyDef, Circle, PhysicsWorld, ShapeDef, Vec2, WorldDef};
//!
//! let mut world = PhysicsWorld::new(&WorldDef::default()).unwrap();
//! let body = world
//!     .create_body(&BodyDef {
//!         position: Vec2::new(0.0, 4.0),
//!         ..BodyDef::dynamic()
//!     })
//!     .unwrap();
//! world
//!     .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
//!     .unwrap();
//! world.step(1.0 / 60.0, 4);
//! assert!(world.body_position(body).unwrap().y < 4.0);
//! ```

pub mod collision;
pub mod common;
pub mod constraints;
pub mod ffi;
pub mod integration;
pub mod math;
pub mod objects;
pub mod shapes;
pub mod world;

// Re-export key types for easier use
pub use collision::{CastOutput, DynamicTree, Manifold, RayCastInput, ShapeProxy, AABB};
pub use common::{BodyId, ChainId, Filter, JointId, PhysicsError, QueryFilter, Result, ShapeId, SurfaceMaterial, WorldId};
pub use constraints::{
    DistanceJointDef, FilterJointDef, JointDefBase, JointType, MotorJointDef, MouseJointDef, PrismaticJointDef,
    RevoluteJointDef, WeldJointDef, WheelJointDef,
};
pub use math::{Rot, Transform, Vec2};
pub use objects::{BodyDef, BodyType, ChainDef, ShapeDef};
pub use shapes::{make_box, Capsule, ChainSegment, Circle, MassData, Polygon, Segment, ShapeGeometry, ShapeType};
pub use world::{ExplosionDef, PhysicsWorld, WorldDef};
