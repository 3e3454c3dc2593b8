use super::mass::MassData;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, shape_cast, ShapeCastPairInput};
use crate::math::{Transform, Vec2};

/// A line segment with two-sided collision.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub point1: Vec2,
    pub point2: Vec2,
}

impl Segment {
    pub fn new(point1: Vec2, point2: Vec2) -> Self {
        Self { point1, point2 }
    }

    /// Calculates the length of the line segment.
    pub fn length(&self) -> f32 {
        self.point1.distance(self.point2)
    }

    /// Segments have no area and therefore no mass. The centroid is still
    /// reported so bodies made only of segments get a sensible center.
    pub fn compute_mass(&self, _density: f32) -> MassData {
        MassData {
            mass: 0.0,
            center: Vec2::lerp(self.point1, self.point2, 0.5),
            rotational_inertia: 0.0,
        }
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        let v1 = xf.apply(self.point1);
        let v2 = xf.apply(self.point2);
        AABB {
            min: v1.min(v2),
            max: v1.max(v2),
        }
    }

    /// Ray cast in local space. A one-sided segment ignores rays coming from
    /// its left side.
    pub fn ray_cast(&self, input: &RayCastInput, one_sided: bool) -> CastOutput {
        let mut output = CastOutput::default();

        if one_sided {
            // Skip left-side collision
            let offset = (input.origin - self.point1).cross(self.point2 - self.point1);
            if offset < 0.0 {
                return output;
            }
        }

        let p1 = input.origin;
        let d = input.translation;

        let v1 = self.point1;
        let v2 = self.point2;
        let (length, e_unit) = (v2 - v1).length_and_normalize();
        if length == 0.0 {
            return output;
        }

        // Normal points to the right, looking from v1 towards v2
        let mut normal = e_unit.right_perp();

        // Intersect the ray with the infinite segment using the normal,
        // similar to intersecting a ray with an infinite plane
        // p = p1 + t * d
        // dot(normal, p - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        let denominator = normal.dot(d);

        if denominator == 0.0 {
            // parallel
            return output;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            // out of ray range
            return output;
        }

        // Intersection point on the infinite segment
        let p = Vec2::mul_add(p1, t, d);

        // Position of p along the segment
        let s = (p - v1).dot(e_unit);
        if s < 0.0 || length < s {
            // out of segment range
            return output;
        }

        if numerator > 0.0 {
            normal = -normal;
        }

        output.fraction = t;
        output.point = p;
        output.normal = normal;
        output.hit = true;
        output
    }

    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        shape_cast(&ShapeCastPairInput {
            proxy_a: make_proxy(&[self.point1, self.point2], 0.0),
            proxy_b: input.proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::IDENTITY,
            translation_b: input.translation,
            max_fraction: input.max_fraction,
            can_encroach: input.can_encroach,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segment_ray_cast_two_sided() {
        let segment = Segment::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));

        let from_above = RayCastInput::new(Vec2::new(0.5, 1.0), Vec2::new(0.0, -2.0));
        let output = segment.ray_cast(&from_above, false);
        assert!(output.hit);
        assert_relative_eq!(output.fraction, 0.5);
        assert_eq!(output.normal, Vec2::new(0.0, 1.0));

        let from_below = RayCastInput::new(Vec2::new(0.5, -1.0), Vec2::new(0.0, 2.0));
        let output = segment.ray_cast(&from_below, false);
        assert!(output.hit);
        assert_eq!(output.normal, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_segment_ray_cast_one_sided() {
        // Right side of (-1,0)->(1,0) is below the segment
        let segment = Segment::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let from_above = RayCastInput::new(Vec2::new(0.5, 1.0), Vec2::new(0.0, -2.0));
        assert!(!segment.ray_cast(&from_above, true).hit);
        let from_below = RayCastInput::new(Vec2::new(0.5, -1.0), Vec2::new(0.0, 2.0));
        assert!(segment.ray_cast(&from_below, true).hit);
    }

    #[test]
    fn test_segment_misses_past_end() {
        let segment = Segment::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let input = RayCastInput::new(Vec2::new(2.0, 1.0), Vec2::new(0.0, -2.0));
        assert!(!segment.ray_cast(&input, false).hit);
        assert_eq!(segment.compute_mass(1.0).mass, 0.0);
    }
}
