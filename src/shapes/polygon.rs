use super::capsule::Capsule;
use super::circle::Circle;
use super::hull::{validate_hull, Hull};
use super::mass::MassData;
use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, shape_cast, shape_distance, DistanceInput, ShapeCastPairInput, SimplexCache};
use crate::common::constants::MAX_POLYGON_VERTICES;
use crate::math::{Rot, Transform, Vec2};
use tracing::warn;

/// A solid convex polygon. It is assumed that the interior of the polygon is
/// to the left of each edge. Polygons have at most eight vertices and may be
/// rounded by a radius.
///
/// Polygons are built from a [`Hull`] or one of the box helpers so that the
/// winding, normals and centroid are always consistent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    /// Outward edge normals. Normal `i` belongs to the edge from vertex `i`
    /// to vertex `i + 1`.
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    pub centroid: Vec2,
    /// External radius for rounded polygons.
    pub radius: f32,
    pub count: usize,
}

impl Default for Polygon {
    fn default() -> Self {
        make_square(0.5)
    }
}

/// Centroid of a counter-clockwise convex loop using a triangle fan.
pub fn compute_polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    let count = vertices.len();
    if count == 0 {
        return Vec2::ZERO;
    }

    let mut center = Vec2::ZERO;
    let mut area = 0.0;

    // Get a reference point for forming triangles. Use the first vertex to
    // reduce round-off errors.
    let origin = vertices[0];
    let inv3 = 1.0 / 3.0;

    for i in 1..count.saturating_sub(1) {
        // Triangle edges
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let a = 0.5 * e1.cross(e2);

        // Area weighted centroid
        center = Vec2::mul_add(center, a * inv3, e1 + e2);
        area += a;
    }

    if area <= f32::EPSILON {
        // Degenerate loop, fall back to the vertex average
        let sum = vertices.iter().fold(Vec2::ZERO, |acc, v| acc + *v);
        return sum * (1.0 / count as f32);
    }

    origin + center * (1.0 / area)
}

/// Makes a convex polygon from a convex hull. Invalid hulls fall back to a
/// unit square with a warning.
pub fn make_polygon(hull: &Hull, radius: f32) -> Polygon {
    if !validate_hull(hull) {
        warn!(count = hull.count, "invalid hull passed to make_polygon");
        return make_square(0.5);
    }

    let count = hull.count;
    let mut shape = Polygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        centroid: Vec2::ZERO,
        radius,
        count,
    };

    // Copy vertices
    shape.vertices[..count].copy_from_slice(hull.points());

    // Compute normals. Ensure the edges have non-zero length.
    for i in 0..count {
        let i2 = if i + 1 < count { i + 1 } else { 0 };
        let edge = shape.vertices[i2] - shape.vertices[i];
        debug_assert!(edge.length_squared() > f32::EPSILON * f32::EPSILON);
        shape.normals[i] = edge.cross_scalar(1.0).normalize();
    }

    shape.centroid = compute_polygon_centroid(shape.vertices());
    shape
}

/// Makes a convex polygon from a hull with its points moved into the frame
/// given by `position` and `rotation`.
pub fn make_offset_polygon(hull: &Hull, position: Vec2, rotation: Rot) -> Polygon {
    make_offset_rounded_polygon(hull, position, rotation, 0.0)
}

/// Offset variant of [`make_polygon`] with a rounding radius.
pub fn make_offset_rounded_polygon(hull: &Hull, position: Vec2, rotation: Rot, radius: f32) -> Polygon {
    if !validate_hull(hull) {
        warn!(count = hull.count, "invalid hull passed to make_offset_rounded_polygon");
        return make_square(0.5);
    }

    let transform = Transform::new(position, rotation);
    let mut moved = *hull;
    for p in moved.points[..moved.count].iter_mut() {
        *p = transform.apply(*p);
    }
    make_polygon(&moved, radius)
}

/// Polygon form of a capsule, used by the polygon collision routines.
pub fn make_capsule(p1: Vec2, p2: Vec2, radius: f32) -> Polygon {
    let mut shape = Polygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        centroid: Vec2::lerp(p1, p2, 0.5),
        radius,
        count: 2,
    };
    shape.vertices[0] = p1;
    shape.vertices[1] = p2;

    let axis = (p2 - p1).normalize();
    let normal = axis.right_perp();

    shape.normals[0] = normal;
    shape.normals[1] = -normal;
    shape
}

/// Square with the given half width, centered on the local origin.
pub fn make_square(half_width: f32) -> Polygon {
    make_box(half_width, half_width)
}

/// Box with the given half extents, centered on the local origin.
pub fn make_box(half_width: f32, half_height: f32) -> Polygon {
    let mut shape = Polygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        centroid: Vec2::ZERO,
        radius: 0.0,
        count: 4,
    };
    shape.vertices[0] = Vec2::new(-half_width, -half_height);
    shape.vertices[1] = Vec2::new(half_width, -half_height);
    shape.vertices[2] = Vec2::new(half_width, half_height);
    shape.vertices[3] = Vec2::new(-half_width, half_height);
    shape.normals[0] = Vec2::new(0.0, -1.0);
    shape.normals[1] = Vec2::new(1.0, 0.0);
    shape.normals[2] = Vec2::new(0.0, 1.0);
    shape.normals[3] = Vec2::new(-1.0, 0.0);
    shape
}

/// Box with rounded corners. The radius is added to the half extents.
pub fn make_rounded_box(half_width: f32, half_height: f32, radius: f32) -> Polygon {
    let mut shape = make_box(half_width, half_height);
    shape.radius = radius;
    shape
}

/// Box centered on `center` and rotated by `rotation`.
pub fn make_offset_box(half_width: f32, half_height: f32, center: Vec2, rotation: Rot) -> Polygon {
    make_offset_rounded_box(half_width, half_height, center, rotation, 0.0)
}

/// Rounded box centered on `center` and rotated by `rotation`.
pub fn make_offset_rounded_box(half_width: f32, half_height: f32, center: Vec2, rotation: Rot, radius: f32) -> Polygon {
    let xf = Transform::new(center, rotation);
    let mut shape = make_rounded_box(half_width, half_height, radius);
    for i in 0..4 {
        shape.vertices[i] = xf.apply(shape.vertices[i]);
        shape.normals[i] = xf.q.rotate(shape.normals[i]);
    }
    shape.centroid = center;
    shape
}

/// Moves a polygon into another frame.
pub fn transform_polygon(transform: Transform, polygon: &Polygon) -> Polygon {
    let mut p = *polygon;
    for i in 0..p.count {
        p.vertices[i] = transform.apply(p.vertices[i]);
        p.normals[i] = transform.q.rotate(p.normals[i]);
    }
    p.centroid = transform.apply(p.centroid);
    p
}

impl Polygon {
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        // Polygon mass, centroid, and inertia.
        // Let rho be the polygon density in mass per unit area.
        // Then:
        // mass = rho * int(dA)
        // centroid.x = (1/mass) * rho * int(x * dA)
        // centroid.y = (1/mass) * rho * int(y * dA)
        // I = rho * int((x*x + y*y) * dA)
        //
        // We can compute these integrals by summing all the integrals
        // for each triangle of the polygon. To evaluate the integral
        // for a single triangle, we make a change of variables to
        // the (u,v) coordinates of the triangle:
        // x = x0 + e1x * u + e2x * v
        // y = y0 + e1y * u + e2y * v
        // where 0 <= u && 0 <= v && u + v <= 1.
        //
        // We integrate u from [0,1-v] and then v from [0,1].
        // We also need to use the Jacobian of the transformation:
        // D = cross(e1, e2)
        //
        // Simplification: triangle centroid = (1/3) * (p1 + p2 + p3)
        //
        // The rest of the derivation is handled by computer algebra.

        if self.count == 1 {
            return Circle::new(self.vertices[0], self.radius).compute_mass(density);
        }

        if self.count == 2 {
            return Capsule::new(self.vertices[0], self.vertices[1], self.radius).compute_mass(density);
        }

        let count = self.count;
        let radius = self.radius;
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];

        if radius > 0.0 {
            // Approximate mass of rounded polygons by pushing out the vertices.
            let sqrt2 = 1.412;
            for i in 0..count {
                let j = if i == 0 { count - 1 } else { i - 1 };
                let n1 = self.normals[j];
                let n2 = self.normals[i];

                let mid = (n1 + n2).normalize();
                vertices[i] = Vec2::mul_add(self.vertices[i], sqrt2 * radius, mid);
            }
        } else {
            vertices[..count].copy_from_slice(self.vertices());
        }

        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut rotational_inertia = 0.0;

        // Get a reference point for forming triangles. Use the first vertex
        // to reduce round-off errors.
        let r = vertices[0];
        let inv3 = 1.0 / 3.0;

        for i in 1..count - 1 {
            // Triangle edges
            let e1 = vertices[i] - r;
            let e2 = vertices[i + 1] - r;

            let d = e1.cross(e2);

            let triangle_area = 0.5 * d;
            area += triangle_area;

            // Area weighted centroid, r at origin
            center = Vec2::mul_add(center, triangle_area * inv3, e1 + e2);

            let (ex1, ey1) = (e1.x, e1.y);
            let (ex2, ey2) = (e2.x, e2.y);

            let intx2 = ex1 * ex1 + ex2 * ex1 + ex2 * ex2;
            let inty2 = ey1 * ey1 + ey2 * ey1 + ey2 * ey2;

            rotational_inertia += (0.25 * inv3 * d) * (intx2 + inty2);
        }

        if area <= 0.0 {
            return MassData {
                mass: 0.0,
                center: self.centroid,
                rotational_inertia: 0.0,
            };
        }

        let mass = density * area;

        // Center of mass, shift back from origin at r
        let center = center * (1.0 / area);

        // Inertia about r, shifted to the center of mass
        let inertia = density * rotational_inertia - mass * center.dot(center);

        MassData {
            mass,
            center: r + center,
            rotational_inertia: inertia,
        }
    }

    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        let mut lower = xf.apply(self.vertices[0]);
        let mut upper = lower;

        for v in self.vertices().iter().skip(1) {
            let v = xf.apply(*v);
            lower = lower.min(v);
            upper = upper.max(v);
        }

        let r = Vec2::new(self.radius, self.radius);
        AABB {
            min: lower - r,
            max: upper + r,
        }
    }

    /// Exact point containment, including the rounded skin.
    pub fn test_point(&self, point: Vec2) -> bool {
        let input = DistanceInput {
            proxy_a: make_proxy(self.vertices(), 0.0),
            proxy_b: make_proxy(&[point], 0.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::IDENTITY,
            use_radii: false,
        };

        let mut cache = SimplexCache::default();
        let output = shape_distance(&input, &mut cache, None);

        output.distance <= self.radius
    }

    /// Ray cast in local space. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> CastOutput {
        if self.radius == 0.0 {
            let mut output = CastOutput::default();

            // Put the ray into the polygon's frame of reference.
            let p1 = input.origin;
            let d = input.translation;

            let mut lower = 0.0;
            let mut upper = input.max_fraction;

            let mut index = None;

            for i in 0..self.count {
                // p = p1 + a * d
                // dot(normal, p - v) = 0
                // dot(normal, p1 - v) + a * dot(normal, d) = 0
                let numerator = self.normals[i].dot(self.vertices[i] - p1);
                let denominator = self.normals[i].dot(d);

                if denominator == 0.0 {
                    if numerator < 0.0 {
                        return output;
                    }
                } else if denominator < 0.0 && numerator < lower * denominator {
                    // Increase lower. The segment enters this half-space.
                    lower = numerator / denominator;
                    index = Some(i);
                } else if denominator > 0.0 && numerator < upper * denominator {
                    // Decrease upper. The segment exits this half-space.
                    upper = numerator / denominator;
                }

                if upper < lower {
                    return output;
                }
            }

            if let Some(i) = index {
                output.fraction = lower;
                output.normal = self.normals[i];
                output.point = Vec2::mul_add(p1, lower, d);
                output.hit = true;
            }

            return output;
        }

        // Rounded polygon, cast a point against it
        let cast_input = ShapeCastInput {
            proxy: make_proxy(&[input.origin], 0.0),
            translation: input.translation,
            max_fraction: input.max_fraction,
            can_encroach: false,
        };
        self.shape_cast(&cast_input)
    }

    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        shape_cast(&ShapeCastPairInput {
            proxy_a: make_proxy(self.vertices(), self.radius),
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
    use crate::shapes::hull::compute_hull;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_mass() {
        let b = make_box(1.0, 0.5);
        let mass = b.compute_mass(2.0);
        assert_relative_eq!(mass.mass, 4.0, epsilon = 1e-5);
        assert_relative_eq!(mass.center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mass.center.y, 0.0, epsilon = 1e-5);
        // m * (w^2 + h^2) / 12 with w = 2 and h = 1
        assert_relative_eq!(mass.rotational_inertia, 4.0 * 5.0 / 12.0, epsilon = 1e-4);
    }

    #[test]
    fn test_offset_box_mass_is_about_centroid() {
        let centered = make_box(0.5, 0.5).compute_mass(1.0);
        let offset = make_offset_box(0.5, 0.5, Vec2::new(3.0, -2.0), Rot::from_angle(0.3)).compute_mass(1.0);
        assert_relative_eq!(offset.mass, centered.mass, epsilon = 1e-5);
        assert_relative_eq!(offset.center.x, 3.0, epsilon = 1e-4);
        assert_relative_eq!(offset.center.y, -2.0, epsilon = 1e-4);
        assert_relative_eq!(offset.rotational_inertia, centered.rotational_inertia, epsilon = 1e-4);
    }

    #[test]
    fn test_polygon_from_hull_matches_box() {
        let points = [
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let hull = compute_hull(&points);
        let polygon = make_polygon(&hull, 0.0);
        assert_eq!(polygon.count, 4);
        for n in polygon.normals() {
            assert!(n.is_normalized());
        }
        assert_relative_eq!(polygon.centroid.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(polygon.compute_mass(1.0).mass, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_hull_falls_back_to_square() {
        let polygon = make_polygon(&Hull::default(), 0.0);
        assert_eq!(polygon.count, 4);
        assert_eq!(polygon.vertices[2], Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_polygon_ray_cast() {
        let b = make_box(1.0, 1.0);
        let input = RayCastInput::new(Vec2::new(-3.0, 0.5), Vec2::new(6.0, 0.0));
        let output = b.ray_cast(&input);
        assert!(output.hit);
        assert_relative_eq!(output.fraction, 2.0 / 6.0, epsilon = 1e-6);
        assert_eq!(output.normal, Vec2::new(-1.0, 0.0));
        assert_relative_eq!(output.point.x, -1.0, epsilon = 1e-6);

        let inside = RayCastInput::new(Vec2::ZERO, Vec2::new(6.0, 0.0));
        assert!(!b.ray_cast(&inside).hit);

        let miss = RayCastInput::new(Vec2::new(-3.0, 1.5), Vec2::new(6.0, 0.0));
        assert!(!b.ray_cast(&miss).hit);
    }

    #[test]
    fn test_rounded_polygon_ray_cast() {
        let b = make_rounded_box(1.0, 1.0, 0.25);
        let input = RayCastInput::new(Vec2::new(-3.0, 0.0), Vec2::new(6.0, 0.0));
        let output = b.ray_cast(&input);
        assert!(output.hit);
        assert!((output.point.x + 1.25).abs() < 0.01);
        assert!(output.normal.x < -0.99);
    }

    #[test]
    fn test_polygon_test_point_and_aabb() {
        let b = make_offset_box(1.0, 0.5, Vec2::new(2.0, 0.0), Rot::IDENTITY);
        assert!(b.test_point(Vec2::new(2.5, 0.25)));
        assert!(!b.test_point(Vec2::new(0.5, 0.0)));

        let aabb = b.compute_aabb(Transform::new(Vec2::new(0.0, 1.0), Rot::IDENTITY));
        assert_relative_eq!(aabb.min.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(aabb.max.y, 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_transform_polygon() {
        let b = make_box(1.0, 0.5);
        let xf = Transform::new(Vec2::new(1.0, 2.0), Rot::from_angle(std::f32::consts::FRAC_PI_2));
        let moved = transform_polygon(xf, &b);
        assert_relative_eq!(moved.centroid.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(moved.centroid.y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(moved.normals[0].x, 1.0, epsilon = 1e-6);
    }
}
