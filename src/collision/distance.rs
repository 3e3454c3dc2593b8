//! GJK distance between convex point clouds, segment distance, and the
//! conservative-advancement shape cast built on top of them.

use crate::collision::cast::CastOutput;
use crate::common::constants::{linear_slop, MAX_POLYGON_VERTICES};
use crate::math::{Rot, Transform, Vec2};

/// A convex point cloud with a radius, used by GJK.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeProxy {
    /// The point cloud.
    pub points: [Vec2; MAX_POLYGON_VERTICES],
    /// The number of points.
    pub count: usize,
    /// The external radius of the point cloud.
    pub radius: f32,
}

impl Default for ShapeProxy {
    fn default() -> Self {
        Self {
            points: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count: 0,
            radius: 0.0,
        }
    }
}

impl ShapeProxy {
    /// Points in use.
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.count]
    }

    /// Index of the point furthest along `direction`.
    pub fn find_support(&self, direction: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.points[0].dot(direction);
        for (i, p) in self.points().iter().enumerate().skip(1) {
            let value = p.dot(direction);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }
}

/// Makes a proxy for use in GJK. At most eight points are used.
pub fn make_proxy(points: &[Vec2], radius: f32) -> ShapeProxy {
    let count = points.len().min(MAX_POLYGON_VERTICES);
    let mut proxy = ShapeProxy {
        count,
        radius,
        ..Default::default()
    };
    proxy.points[..count].copy_from_slice(&points[..count]);
    proxy
}

/// Makes a proxy with the points moved into a parent frame.
pub fn make_offset_proxy(points: &[Vec2], radius: f32, position: Vec2, rotation: Rot) -> ShapeProxy {
    let count = points.len().min(MAX_POLYGON_VERTICES);
    let transform = Transform::new(position, rotation);
    let mut proxy = ShapeProxy {
        count,
        radius,
        ..Default::default()
    };
    for (dst, src) in proxy.points.iter_mut().zip(points.iter().take(count)) {
        *dst = transform.apply(*src);
    }
    proxy
}

/// Warm start data for GJK. Zero initialize for the first call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimplexCache {
    /// The number of stored simplex points.
    pub count: u16,
    /// Vertex indices on shape A.
    pub index_a: [u8; 3],
    /// Vertex indices on shape B.
    pub index_b: [u8; 3],
}

/// Input for [`shape_distance`].
#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Subtract the proxy radii from the reported distance.
    pub use_radii: bool,
}

/// Output of [`shape_distance`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceOutput {
    /// Closest point on shape A.
    pub point_a: Vec2,
    /// Closest point on shape B.
    pub point_b: Vec2,
    /// Normal pointing from A to B. Zero if the cores overlap.
    pub normal: Vec2,
    pub distance: f32,
    /// Number of GJK iterations used.
    pub iterations: usize,
    /// Number of simplex vertices at termination.
    pub simplex_count: usize,
}

/// A vertex of the Minkowski difference `B - A`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimplexVertex {
    /// Support point in proxy A.
    pub w_a: Vec2,
    /// Support point in proxy B.
    pub w_b: Vec2,
    /// `w_b - w_a`
    pub w: Vec2,
    /// Barycentric coordinate of the closest point.
    pub a: f32,
    pub index_a: usize,
    pub index_b: usize,
}

/// Simplex of up to three vertices, exposed for diagnostics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Simplex {
    pub v1: SimplexVertex,
    pub v2: SimplexVertex,
    pub v3: SimplexVertex,
    pub count: usize,
}

/// Result of [`segment_distance`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentDistanceResult {
    /// The closest point on the first segment.
    pub closest1: Vec2,
    /// The closest point on the second segment.
    pub closest2: Vec2,
    /// The barycentric coordinate on the first segment.
    pub fraction1: f32,
    /// The barycentric coordinate on the second segment.
    pub fraction2: f32,
    /// The squared distance between the closest points.
    pub distance_squared: f32,
}

/// Closest points between segments `p1-q1` and `p2-q2`.
pub fn segment_distance(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> SegmentDistanceResult {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let dd1 = d1.dot(d1);
    let dd2 = d2.dot(d2);
    let rd1 = r.dot(d1);
    let rd2 = r.dot(d2);

    let eps_sqr = f32::EPSILON * f32::EPSILON;

    let (fraction1, fraction2) = if dd1 < eps_sqr || dd2 < eps_sqr {
        // Handle all degeneracies
        if dd1 >= eps_sqr {
            // Segment 2 is degenerate
            ((-rd1 / dd1).clamp(0.0, 1.0), 0.0)
        } else if dd2 >= eps_sqr {
            // Segment 1 is degenerate
            (0.0, (rd2 / dd2).clamp(0.0, 1.0))
        } else {
            (0.0, 0.0)
        }
    } else {
        let d12 = d1.dot(d2);
        let denom = dd1 * dd2 - d12 * d12;

        // Fraction on segment 1, zero when parallel
        let mut f1 = if denom != 0.0 {
            ((d12 * rd2 - rd1 * dd2) / denom).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Point on segment 2 closest to p1 + f1 * d1
        let mut f2 = (d12 * f1 + rd2) / dd2;

        // Clamping segment 2 requires a do over on segment 1
        if f2 < 0.0 {
            f2 = 0.0;
            f1 = (-rd1 / dd1).clamp(0.0, 1.0);
        } else if f2 > 1.0 {
            f2 = 1.0;
            f1 = ((d12 - rd1) / dd1).clamp(0.0, 1.0);
        }
        (f1, f2)
    };

    let closest1 = Vec2::mul_add(p1, fraction1, d1);
    let closest2 = Vec2::mul_add(p2, fraction2, d2);
    SegmentDistanceResult {
        closest1,
        closest2,
        fraction1,
        fraction2,
        distance_squared: closest1.distance_squared(closest2),
    }
}

fn make_simplex_vertex(proxy_a: &ShapeProxy, proxy_b: &ShapeProxy, xf: Transform, index_a: usize, index_b: usize) -> SimplexVertex {
    let w_a = proxy_a.points[index_a];
    let w_b = xf.apply(proxy_b.points[index_b]);
    SimplexVertex {
        w_a,
        w_b,
        w: w_b - w_a,
        a: 1.0,
        index_a,
        index_b,
    }
}

fn make_simplex_from_cache(cache: &SimplexCache, proxy_a: &ShapeProxy, proxy_b: &ShapeProxy, xf: Transform) -> Simplex {
    let mut simplex = Simplex::default();
    let count = (cache.count as usize).min(3);
    for i in 0..count {
        let index_a = (cache.index_a[i] as usize).min(proxy_a.count.saturating_sub(1));
        let index_b = (cache.index_b[i] as usize).min(proxy_b.count.saturating_sub(1));
        *simplex.vertex_mut(i) = make_simplex_vertex(proxy_a, proxy_b, xf, index_a, index_b);
    }
    simplex.count = count;

    // Start from the first vertices when the cache is empty
    if simplex.count == 0 {
        simplex.v1 = make_simplex_vertex(proxy_a, proxy_b, xf, 0, 0);
        simplex.count = 1;
    }
    simplex
}

impl Simplex {
    fn vertex_mut(&mut self, i: usize) -> &mut SimplexVertex {
        match i {
            0 => &mut self.v1,
            1 => &mut self.v2,
            _ => &mut self.v3,
        }
    }

    fn vertex(&self, i: usize) -> &SimplexVertex {
        match i {
            0 => &self.v1,
            1 => &self.v2,
            _ => &self.v3,
        }
    }

    fn to_cache(&self) -> SimplexCache {
        let mut cache = SimplexCache {
            count: self.count as u16,
            ..Default::default()
        };
        for i in 0..self.count {
            let v = self.vertex(i);
            cache.index_a[i] = v.index_a as u8;
            cache.index_b[i] = v.index_b as u8;
        }
        cache
    }

    /// Direction from the simplex towards the origin.
    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v1.w,
            2 => {
                let e12 = self.v2.w - self.v1.w;
                let sgn = e12.cross(-self.v1.w);
                if sgn > 0.0 {
                    // Origin is left of e12
                    e12.left_perp()
                } else {
                    e12.right_perp()
                }
            }
            _ => Vec2::ZERO,
        }
    }

    /// Closest points on A and B in the frame of A.
    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v1.w_a, self.v1.w_b),
            2 => (
                self.v1.a * self.v1.w_a + self.v2.a * self.v2.w_a,
                self.v1.a * self.v1.w_b + self.v2.a * self.v2.w_b,
            ),
            3 => {
                let a = self.v1.a * self.v1.w_a + self.v2.a * self.v2.w_a + self.v3.a * self.v3.w_a;
                // Triangle contains the origin, so the witness points coincide
                (a, a)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    // Solve a line segment using barycentric coordinates.
    //
    // p = a1 * w1 + a2 * w2
    // a1 + a2 = 1
    //
    // The vector from the origin to the closest point on the line is
    // perpendicular to the line.
    // e12 = w2 - w1
    // dot(p, e) = 0
    // a1 * dot(w1, e) + a2 * dot(w2, e) = 0
    fn solve2(&mut self) {
        let w1 = self.v1.w;
        let w2 = self.v2.w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // a2 <= 0, so we clamp it to 0
            self.v1.a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // a1 <= 0, so we clamp it to 0
            self.v2.a = 1.0;
            self.count = 1;
            self.v1 = self.v2;
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v1.a = d12_1 * inv_d12;
        self.v2.a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions:
    // - points[2]
    // - edge points[0]-points[2]
    // - edge points[1]-points[2]
    // - inside the triangle
    fn solve3(&mut self) {
        let w1 = self.v1.w;
        let w2 = self.v2.w;
        let w3 = self.v3.w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v1.a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v1.a = d12_1 * inv_d12;
            self.v2.a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v1.a = d13_1 * inv_d13;
            self.v3.a = d13_2 * inv_d13;
            self.count = 2;
            self.v2 = self.v3;
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v2.a = 1.0;
            self.count = 1;
            self.v1 = self.v2;
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v3.a = 1.0;
            self.count = 1;
            self.v1 = self.v3;
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v2.a = d23_1 * inv_d23;
            self.v3.a = d23_2 * inv_d23;
            self.count = 2;
            self.v1 = self.v3;
            return;
        }

        // Must be in triangle123
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v1.a = d123_1 * inv_d123;
        self.v2.a = d123_2 * inv_d123;
        self.v3.a = d123_3 * inv_d123;
        self.count = 3;
    }
}

const GJK_MAX_ITERATIONS: usize = 20;

/// Computes the closest points between two convex proxies using GJK.
///
/// The cache warm starts the simplex and is updated on return. Pass a zeroed
/// cache for a cold start. When `simplexes` is provided each intermediate
/// simplex is recorded for debugging.
pub fn shape_distance(input: &DistanceInput, cache: &mut SimplexCache, mut simplexes: Option<&mut Vec<Simplex>>) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    if proxy_a.count == 0 || proxy_b.count == 0 {
        return DistanceOutput::default();
    }

    // Work in the frame of A
    let xf = input.transform_a.inv_mul(input.transform_b);

    let mut simplex = make_simplex_from_cache(cache, proxy_a, proxy_b, xf);
    let mut non_unit_normal = Vec2::ZERO;

    // Vertices of the previous simplex, used to detect cycling
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iteration = 0;
    while iteration < GJK_MAX_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.vertex(i).index_a;
            save_b[i] = simplex.vertex(i).index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        if let Some(record) = simplexes.as_deref_mut() {
            record.push(simplex);
        }

        // Three points means the origin is inside the triangle
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();

        // Ensure the search direction is numerically fit
        if d.dot(d) < f32::EPSILON * f32::EPSILON {
            break;
        }
        non_unit_normal = -d;

        // support = support(b, d) - support(a, -d)
        let index_a = proxy_a.find_support(-d);
        let index_b = proxy_b.find_support(xf.q.inv_rotate(d));
        let vertex = make_simplex_vertex(proxy_a, proxy_b, xf, index_a, index_b);

        iteration += 1;

        // Duplicate support points are the main termination criterion
        let duplicate = (0..save_count).any(|i| save_a[i] == index_a && save_b[i] == index_b);
        if duplicate {
            break;
        }

        *simplex.vertex_mut(simplex.count) = vertex;
        simplex.count += 1;
    }

    let (local_a, local_b) = simplex.witness_points();
    let mut distance = local_a.distance(local_b);
    let mut local_normal = if distance > f32::EPSILON {
        (local_b - local_a) * (1.0 / distance)
    } else {
        non_unit_normal.normalize()
    };
    if simplex.count == 3 {
        // Cores overlap; there is no meaningful separating direction
        local_normal = Vec2::ZERO;
        distance = 0.0;
    }

    *cache = simplex.to_cache();

    let mut point_a = local_a;
    let mut point_b = local_b;
    if input.use_radii {
        if distance < f32::EPSILON {
            // Shapes are too close to safely compute a normal
            let p = Vec2::lerp(point_a, point_b, 0.5);
            point_a = p;
            point_b = p;
            distance = 0.0;
        } else {
            // Keep the closest points on the perimeter even when overlapped so
            // the points move smoothly
            let r_a = proxy_a.radius;
            let r_b = proxy_b.radius;
            distance = (distance - r_a - r_b).max(0.0);
            point_a = Vec2::mul_add(point_a, r_a, local_normal);
            point_b = Vec2::mul_sub(point_b, r_b, local_normal);
        }
    }

    let xf_a = input.transform_a;
    DistanceOutput {
        point_a: xf_a.apply(point_a),
        point_b: xf_a.apply(point_b),
        normal: xf_a.q.rotate(local_normal),
        distance,
        iterations: iteration,
        simplex_count: simplex.count,
    }
}

/// Input for [`shape_cast`]: proxy B moves by `translation_b` against a
/// stationary proxy A.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCastPairInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub translation_b: Vec2,
    /// The fraction of the translation to consider, typically 1.
    pub max_fraction: f32,
    /// Allows shapes with a radius to move slightly closer if already touching.
    pub can_encroach: bool,
}

const SHAPE_CAST_MAX_ITERATIONS: usize = 20;

/// Casts proxy B along its translation against proxy A using conservative
/// advancement driven by GJK.
///
/// An initial overlap reports `hit` with fraction zero and a zero normal.
pub fn shape_cast(input: &ShapeCastPairInput) -> CastOutput {
    let slop = linear_slop();
    let total_radius = input.proxy_a.radius + input.proxy_b.radius;
    let mut target = slop.max(total_radius - slop);
    let tolerance = 0.25 * slop;

    let mut cache = SimplexCache::default();
    let mut alpha = 0.0;

    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a,
        proxy_b: input.proxy_b,
        transform_a: input.transform_a,
        transform_b: input.transform_b,
        use_radii: false,
    };

    let delta2 = input.translation_b;
    let mut output = CastOutput::default();

    for iteration in 0..SHAPE_CAST_MAX_ITERATIONS {
        output.iterations += 1;

        let distance_output = shape_distance(&distance_input, &mut cache, None);

        if distance_output.distance < target + tolerance {
            if iteration == 0 {
                if input.can_encroach && distance_output.distance > 2.0 * slop {
                    target = distance_output.distance - slop;
                } else {
                    // Initial overlap
                    output.hit = true;

                    // Compute a common point
                    let c1 = Vec2::mul_add(distance_output.point_a, input.proxy_a.radius, distance_output.normal);
                    let c2 = Vec2::mul_add(distance_output.point_b, -input.proxy_b.radius, distance_output.normal);
                    output.point = Vec2::lerp(c1, c2, 0.5);
                    return output;
                }
            } else {
                // Regular hit
                output.fraction = alpha;
                output.point = Vec2::mul_add(distance_output.point_a, input.proxy_a.radius, distance_output.normal);
                output.normal = distance_output.normal;
                output.hit = true;
                return output;
            }
        }

        // Check if the shapes are approaching each other
        let denominator = delta2.dot(distance_output.normal);
        if denominator >= 0.0 {
            // Miss
            return output;
        }

        // Advance the sweep
        alpha += (target - distance_output.distance) / denominator;
        if alpha >= input.max_fraction {
            // Miss
            return output;
        }

        distance_input.transform_b.p = Vec2::mul_add(input.transform_b.p, alpha, delta2);
    }

    // Failure
    output
}

/// Describes the motion of a body over a time step, used for continuous
/// collision. The center of mass is swept linearly and the rotation is
/// interpolated.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    /// Local center of mass position.
    pub local_center: Vec2,
    /// Starting center of mass world position.
    pub c1: Vec2,
    /// Ending center of mass world position.
    pub c2: Vec2,
    /// Starting world rotation.
    pub q1: Rot,
    /// Ending world rotation.
    pub q2: Rot,
}

impl Sweep {
    /// Transform of the body origin at `time` in `[0, 1]`.
    pub fn transform_at(&self, time: f32) -> Transform {
        let p = (1.0 - time) * self.c1 + time * self.c2;
        let q = Rot::new(
            (1.0 - time) * self.q1.c + time * self.q2.c,
            (1.0 - time) * self.q1.s + time * self.q2.s,
        )
        .normalize();

        // Shift to origin
        Transform::new(p - q.rotate(self.local_center), q)
    }
}

/// Evaluates the transform of a sweep at `time` in `[0, 1]`.
pub fn get_sweep_transform(sweep: &Sweep, time: f32) -> Transform {
    sweep.transform_at(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(half: f32) -> ShapeProxy {
        make_proxy(
            &[
                Vec2::new(-half, -half),
                Vec2::new(half, -half),
                Vec2::new(half, half),
                Vec2::new(-half, half),
            ],
            0.0,
        )
    }

    #[test]
    fn test_unit_circles_distance_with_radii() {
        let circle = make_proxy(&[Vec2::ZERO], 1.0);
        let input = DistanceInput {
            proxy_a: circle,
            proxy_b: circle,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(3.0, 0.0), Rot::IDENTITY),
            use_radii: true,
        };
        let mut cache = SimplexCache::default();
        let output = shape_distance(&input, &mut cache, None);
        assert_relative_eq!(output.distance, 1.0, epsilon = 1e-6);
        assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(output.point_b.x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(output.normal.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_box_distance_and_warm_start() {
        let input = DistanceInput {
            proxy_a: square(0.5),
            proxy_b: square(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_angle(Vec2::new(2.0, 0.25), 0.0),
            use_radii: false,
        };
        let mut cache = SimplexCache::default();
        let first = shape_distance(&input, &mut cache, None);
        assert_relative_eq!(first.distance, 1.0, epsilon = 1e-5);
        assert!(cache.count > 0);

        // A warm started call from the same configuration converges at least as fast
        let second = shape_distance(&input, &mut cache, None);
        assert_relative_eq!(second.distance, 1.0, epsilon = 1e-5);
        assert!(second.iterations <= first.iterations);
    }

    #[test]
    fn test_overlapping_cores_report_zero() {
        let input = DistanceInput {
            proxy_a: square(1.0),
            proxy_b: square(1.0),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::from_angle(Vec2::new(0.5, 0.1), 0.3),
            use_radii: false,
        };
        let output = shape_distance(&input, &mut SimplexCache::default(), None);
        assert_eq!(output.distance, 0.0);
    }

    #[test]
    fn test_segment_distance() {
        let result = segment_distance(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.0, 3.0),
        );
        assert_relative_eq!(result.distance_squared, 1.0);
        assert_relative_eq!(result.fraction1, 0.5);
        assert_relative_eq!(result.fraction2, 0.0);

        // Degenerate second segment behaves like a point
        let point = segment_distance(Vec2::ZERO, Vec2::new(2.0, 0.0), Vec2::new(3.0, 1.0), Vec2::new(3.0, 1.0));
        assert_relative_eq!(point.closest1.x, 2.0);
        assert_relative_eq!(point.distance_squared, 2.0);
    }

    #[test]
    fn test_shape_cast_hits_box() {
        let input = ShapeCastPairInput {
            proxy_a: square(0.5),
            proxy_b: make_proxy(&[Vec2::ZERO], 0.25),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(-4.0, 0.0), Rot::IDENTITY),
            translation_b: Vec2::new(8.0, 0.0),
            max_fraction: 1.0,
            can_encroach: false,
        };
        let output = shape_cast(&input);
        assert!(output.hit);
        // Contact when the circle center reaches x = -0.75
        assert_relative_eq!(output.fraction, 3.25 / 8.0, epsilon = 2e-3);
        assert_relative_eq!(output.normal.x, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_shape_cast_initial_overlap() {
        let input = ShapeCastPairInput {
            proxy_a: square(0.5),
            proxy_b: square(0.5),
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(0.25, 0.0), Rot::IDENTITY),
            translation_b: Vec2::new(1.0, 0.0),
            max_fraction: 1.0,
            can_encroach: false,
        };
        let output = shape_cast(&input);
        assert!(output.hit);
        assert_eq!(output.fraction, 0.0);
        assert_eq!(output.normal, Vec2::ZERO);
    }

    #[test]
    fn test_sweep_transform_endpoints() {
        let sweep = Sweep {
            local_center: Vec2::new(0.5, 0.0),
            c1: Vec2::new(0.0, 0.0),
            c2: Vec2::new(2.0, 0.0),
            q1: Rot::IDENTITY,
            q2: Rot::IDENTITY,
        };
        let xf = get_sweep_transform(&sweep, 0.5);
        assert_relative_eq!(xf.p.x, 0.5);
        assert_relative_eq!(xf.p.y, 0.0);
    }
}
