use super::mass::MassData;
use super::segment::Segment;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::math::{Transform, Vec2};

/// A line segment with one-sided collision. Only collides on the right side.
/// Several of these are generated for a chain shape.
///
/// ghost1 -> point1 -> point2 -> ghost2
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainSegment {
    /// The tail ghost vertex.
    pub ghost1: Vec2,
    /// The line segment.
    pub segment: Segment,
    /// The head ghost vertex.
    pub ghost2: Vec2,
    /// The owning chain shape index, or -1 when free standing.
    pub chain_id: i32,
}

impl ChainSegment {
    pub fn new(ghost1: Vec2, point1: Vec2, point2: Vec2, ghost2: Vec2) -> Self {
        Self {
            ghost1,
            segment: Segment::new(point1, point2),
            ghost2,
            chain_id: -1,
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        self.segment.compute_mass(density)
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        self.segment.compute_aabb(xf)
    }

    /// Ray cast in local space. Rays coming from the left side are ignored.
    pub fn ray_cast(&self, input: &RayCastInput) -> CastOutput {
        self.segment.ray_cast(input, true)
    }

    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        self.segment.shape_cast(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_segment_is_one_sided() {
        let chain = ChainSegment::new(
            Vec2::new(-2.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        );

        // The right side of a left-to-right segment faces down
        let from_below = RayCastInput::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 2.0));
        let hit = chain.ray_cast(&from_below);
        assert!(hit.hit);
        assert_eq!(hit.normal, Vec2::new(0.0, -1.0));

        let from_above = RayCastInput::new(Vec2::new(0.0, 1.0), Vec2::new(0.0, -2.0));
        assert!(!chain.ray_cast(&from_above).hit);
    }
}
