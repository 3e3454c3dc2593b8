//! Math primitives: vectors, rotations, transforms, planes and small matrices.

pub mod mat22;
pub mod plane;
pub mod rotation;
pub mod transform;
pub mod vec2;

pub use mat22::Mat22;
pub use plane::Plane;
pub use rotation::{compute_cos_sin, unwind_angle, CosSin, Rot};
pub use transform::Transform;
pub use vec2::Vec2;

/// True for finite floats (not NaN and not infinite).
#[inline]
pub fn is_valid_float(a: f32) -> bool {
    a.is_finite()
}
