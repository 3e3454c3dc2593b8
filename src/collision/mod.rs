//! Collision detection: bounding boxes, casts, GJK distance, time of impact,
//! contact manifolds, the dynamic tree and the broad-phase.

pub mod aabb;
pub mod broad_phase;
pub mod cast;
pub mod chain_manifold;
pub mod distance;
pub mod dynamic_tree;
pub mod manifold;
pub mod mover;
pub mod toi;

// Re-export key types
pub use aabb::AABB;
pub use broad_phase::BroadPhase;
pub use cast::{is_valid_ray, CastOutput, RayCastInput, ShapeCastInput};
pub use chain_manifold::{collide_chain_segment_and_capsule, collide_chain_segment_and_circle, collide_chain_segment_and_polygon};
pub use distance::{
    get_sweep_transform, make_offset_proxy, make_proxy, segment_distance, shape_cast, shape_distance, DistanceInput,
    DistanceOutput, SegmentDistanceResult, ShapeCastPairInput, ShapeProxy, Simplex, SimplexCache, SimplexVertex, Sweep,
};
pub use dynamic_tree::{DynamicTree, TreeStats, NULL_NODE};
pub use manifold::*;
pub use mover::{clip_vector, collide_mover, solve_planes, CollisionPlane, PlaneResult, PlaneSolverResult};
pub use toi::{time_of_impact, ToiInput, ToiOutput, ToiState};
