use super::mass::MassData;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, shape_cast, ShapeCastPairInput};
use crate::math::{Transform, Vec2};
use std::f32::consts::PI;

/// A solid circle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Circle {
    /// The local center.
    pub center: Vec2,
    /// The radius.
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let rr = self.radius * self.radius;
        let mass = density * PI * rr;
        MassData {
            mass,
            center: self.center,
            // inertia about the centroid
            rotational_inertia: mass * 0.5 * rr,
        }
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        let p = xf.apply(self.center);
        let r = Vec2::new(self.radius, self.radius);
        AABB { min: p - r, max: p + r }
    }

    /// Exact containment test in local space.
    pub fn test_point(&self, point: Vec2) -> bool {
        point.distance_squared(self.center) <= self.radius * self.radius
    }

    /// Ray cast in local space. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> CastOutput {
        let mut output = CastOutput::default();
        let p = self.center;

        // Shift the ray so the circle center is the origin
        let s = input.origin - p;
        let (length, d) = input.translation.length_and_normalize();
        if length == 0.0 {
            // zero length ray
            return output;
        }

        // Closest point on the ray to the origin
        // solve: dot(s + t * d, d) = 0
        let t = -s.dot(d);
        let c = Vec2::mul_add(s, t, d);
        let cc = c.dot(c);
        let rr = self.radius * self.radius;
        if cc > rr {
            // closest point is outside the circle
            return output;
        }

        // Pythagoras
        let h = (rr - cc).sqrt();
        let fraction = t - h;
        if fraction < 0.0 || input.max_fraction * length < fraction {
            // outside the range of the ray segment
            return output;
        }

        // hit point relative to center
        let hit_point = Vec2::mul_add(s, fraction, d);
        output.fraction = fraction / length;
        output.normal = hit_point.normalize();
        output.point = Vec2::mul_add(p, self.radius, output.normal);
        output.hit = true;
        output
    }

    /// Casts a point cloud against this circle, in local space.
    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        shape_cast(&ShapeCastPairInput {
            proxy_a: make_proxy(&[self.center], self.radius),
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
    fn test_circle_mass() {
        let circle = Circle::new(Vec2::new(1.0, 0.0), 0.5);
        let md = circle.compute_mass(1.0);
        assert_relative_eq!(md.mass, PI * 0.25);
        assert_eq!(md.center, Vec2::new(1.0, 0.0));
        assert_relative_eq!(md.rotational_inertia, 0.5 * md.mass * 0.25);
    }

    #[test]
    fn test_circle_ray_cast() {
        let circle = Circle::new(Vec2::ZERO, 1.0);
        let input = RayCastInput::new(Vec2::new(-3.0, 0.0), Vec2::new(6.0, 0.0));
        let output = circle.ray_cast(&input);
        assert!(output.hit);
        assert_relative_eq!(output.fraction, 2.0 / 6.0);
        assert_relative_eq!(output.normal.x, -1.0);
        assert_relative_eq!(output.point.x, -1.0);

        // Too short to reach the circle
        let short = RayCastInput { max_fraction: 0.2, ..input };
        assert!(!circle.ray_cast(&short).hit);
    }

    #[test]
    fn test_circle_point_and_aabb() {
        let circle = Circle::new(Vec2::new(0.0, 1.0), 0.5);
        assert!(circle.test_point(Vec2::new(0.0, 1.4)));
        assert!(!circle.test_point(Vec2::new(0.0, 1.6)));
        let aabb = circle.compute_aabb(Transform::from_angle(Vec2::new(2.0, 0.0), 0.0));
        assert_eq!(aabb.min, Vec2::new(1.5, 0.5));
        assert_eq!(aabb.max, Vec2::new(2.5, 1.5));
    }
}
