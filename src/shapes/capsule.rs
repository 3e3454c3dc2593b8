use super::circle::Circle;
use super::mass::MassData;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, shape_cast, ShapeCastPairInput};
use crate::math::{Transform, Vec2};
use std::f32::consts::PI;

/// A solid capsule: two semicircles connected by a rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Capsule {
    /// Local center of the first semicircle.
    pub center1: Vec2,
    /// Local center of the second semicircle.
    pub center2: Vec2,
    /// The radius of the semicircles.
    pub radius: f32,
}

impl Capsule {
    pub fn new(center1: Vec2, center2: Vec2, radius: f32) -> Self {
        Self {
            center1,
            center2,
            radius,
        }
    }

    pub fn length(&self) -> f32 {
        self.center1.distance(self.center2)
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let radius = self.radius;
        let rr = radius * radius;
        let p1 = self.center1;
        let p2 = self.center2;
        let length = (p2 - p1).length();
        let ll = length * length;

        let circle_mass = density * (PI * rr);
        let box_mass = density * (2.0 * radius * length);

        // Two offset half circles, both halves add up to a full circle and
        // each half is offset by half the length. The semicircle centroid is
        // at 4r/(3pi), so the parallel axis theorem is applied twice:
        // m * ((h + lc)^2 - lc^2) = m * (h^2 + 2 * h * lc)
        let lc = 4.0 * radius / (3.0 * PI);
        let h = 0.5 * length;

        let circle_inertia = circle_mass * (0.5 * rr + h * h + 2.0 * h * lc);
        let box_inertia = box_mass * (4.0 * rr + ll) / 12.0;

        MassData {
            mass: circle_mass + box_mass,
            center: Vec2::lerp(p1, p2, 0.5),
            rotational_inertia: circle_inertia + box_inertia,
        }
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        let v1 = xf.apply(self.center1);
        let v2 = xf.apply(self.center2);
        let r = Vec2::new(self.radius, self.radius);
        AABB {
            min: v1.min(v2) - r,
            max: v1.max(v2) + r,
        }
    }

    pub fn test_point(&self, point: Vec2) -> bool {
        let rr = self.radius * self.radius;
        let p1 = self.center1;
        let d = self.center2 - p1;
        let dd = d.dot(d);
        if dd == 0.0 {
            // Capsule is really a circle
            return point.distance_squared(p1) <= rr;
        }

        // Closest point on the capsule segment
        let t = ((point - p1).dot(d) / dd).clamp(0.0, 1.0);
        let c = Vec2::mul_add(p1, t, d);
        point.distance_squared(c) <= rr
    }

    /// Ray cast in local space. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> CastOutput {
        let mut output = CastOutput::default();

        let v1 = self.center1;
        let v2 = self.center2;
        let (capsule_length, a) = (v2 - v1).length_and_normalize();

        if capsule_length < f32::EPSILON {
            // Capsule is really a circle
            return Circle::new(v1, self.radius).ray_cast(input);
        }

        let p1 = input.origin;
        let d = input.translation;

        // Ray from capsule start to ray start
        let q = p1 - v1;
        let qa = q.dot(a);

        // Vector to ray start that is perpendicular to the capsule axis
        let qp = Vec2::mul_add(q, -qa, a);

        let radius = self.radius;

        // Does the ray start within the infinite length capsule?
        if qp.dot(qp) < radius * radius {
            if qa < 0.0 {
                // start point behind capsule segment
                return Circle::new(v1, radius).ray_cast(input);
            }
            if qa > capsule_length {
                // start point ahead of capsule segment
                return Circle::new(v2, radius).ray_cast(input);
            }
            // ray starts inside capsule
            return output;
        }

        // Perpendicular to the capsule axis, pointing right
        let mut n = Vec2::new(a.y, -a.x);

        let (ray_length, u) = d.length_and_normalize();

        // Intersect the ray with the infinite length capsule
        // v1 + radius * n + s1 * a = p1 + s2 * u
        // v1 - radius * n + s1 * a = p1 + s2 * u
        // s1 * a - s2 * u = b, with b = q + radius * n or b = q - radius * n
        // Cramer's rule [a -u]
        let den = -a.x * u.y + u.x * a.y;
        if -f32::EPSILON < den && den < f32::EPSILON {
            // Ray is parallel to the capsule and outside the infinite capsule
            return output;
        }

        let b1 = Vec2::mul_sub(q, radius, n);
        let b2 = Vec2::mul_add(q, radius, n);

        let inv_den = 1.0 / den;

        // Cramer's rule [a b1]
        let s21 = (a.x * b1.y - b1.x * a.y) * inv_den;

        // Cramer's rule [a b2]
        let s22 = (a.x * b2.y - b2.x * a.y) * inv_den;

        let (s2, b) = if s21 < s22 {
            (s21, b1)
        } else {
            n = -n;
            (s22, b2)
        };

        if s2 < 0.0 || input.max_fraction * ray_length < s2 {
            return output;
        }

        // Cramer's rule [b -u]
        let s1 = (-b.x * u.y + u.x * b.y) * inv_den;

        if s1 < 0.0 {
            // ray passes behind capsule segment (v1)
            Circle::new(v1, radius).ray_cast(input)
        } else if capsule_length < s1 {
            // ray passes ahead of capsule segment (v2)
            Circle::new(v2, radius).ray_cast(input)
        } else {
            // ray hits the capsule side
            output.fraction = s2 / ray_length;
            output.point = Vec2::lerp(v1, v2, s1 / capsule_length) + radius * n;
            output.normal = n;
            output.hit = true;
            output
        }
    }

    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        shape_cast(&ShapeCastPairInput {
            proxy_a: make_proxy(&[self.center1, self.center2], self.radius),
            proxy_b: input.proxy,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::IDENTITY,
            translation_b: input.translation,
            max_fraction: input.max_fraction,
            can_encroach: input.can_encroach,
        })
    }
}
