//! Ray and shape cast inputs and the shared cast output.

use crate::collision::distance::ShapeProxy;
use crate::common::constants::huge;
use crate::math::Vec2;

/// Low level ray cast input data.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    /// Start point of the ray cast.
    pub origin: Vec2,
    /// Translation of the ray cast.
    pub translation: Vec2,
    /// The maximum fraction of the translation to consider, typically 1.
    pub max_fraction: f32,
}

impl RayCastInput {
    pub fn new(origin: Vec2, translation: Vec2) -> Self {
        Self {
            origin,
            translation,
            max_fraction: 1.0,
        }
    }

    /// Rejects rays that would produce NaN or meaningless results.
    pub fn is_valid(&self) -> bool {
        is_valid_ray(self)
    }
}

/// Validates a ray cast input: finite values, a fraction in `[0, huge)` and a
/// bounded translation.
pub fn is_valid_ray(input: &RayCastInput) -> bool {
    input.origin.is_valid()
        && input.translation.is_valid()
        && input.max_fraction.is_finite()
        && input.max_fraction >= 0.0
        && input.max_fraction < huge()
        && input.translation.length_squared() < huge() * huge()
}

/// Low level shape cast input in generic form. This allows casting an
/// arbitrary point cloud wrapped with a radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCastInput {
    /// The shape being cast.
    pub proxy: ShapeProxy,
    /// The translation of the shape cast.
    pub translation: Vec2,
    /// The maximum fraction of the translation to consider, typically 1.
    pub max_fraction: f32,
    /// Allow shape cast to encroach when initially touching.
    pub can_encroach: bool,
}

/// Output for ray casts and shape casts.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CastOutput {
    /// The surface normal at the hit point.
    pub normal: Vec2,
    /// The surface hit point.
    pub point: Vec2,
    /// The fraction of the input translation at collision.
    pub fraction: f32,
    /// The number of iterations used.
    pub iterations: usize,
    /// Did the cast hit?
    pub hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_validation() {
        assert!(RayCastInput::new(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_valid());
        assert!(!RayCastInput::new(Vec2::new(f32::NAN, 0.0), Vec2::new(1.0, 0.0)).is_valid());
        let negative = RayCastInput {
            max_fraction: -1.0,
            ..RayCastInput::new(Vec2::ZERO, Vec2::X)
        };
        assert!(!negative.is_valid());
    }
}
