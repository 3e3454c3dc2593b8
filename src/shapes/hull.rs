//! Convex hull computation (quickhull) for polygon construction.

use crate::common::constants::{linear_slop, MAX_POLYGON_VERTICES};
use crate::math::Vec2;

/// A convex hull with counter-clockwise winding and no collinear points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hull {
    pub points: [Vec2; MAX_POLYGON_VERTICES],
    pub count: usize,
}

impl Hull {
    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.count]
    }

    fn push(&mut self, point: Vec2) {
        if self.count < MAX_POLYGON_VERTICES {
            self.points[self.count] = point;
            self.count += 1;
        }
    }

    /// Computes the hull of a point cloud. See [`compute_hull`].
    pub fn compute(points: &[Vec2]) -> Hull {
        compute_hull(points)
    }

    /// See [`validate_hull`].
    pub fn validate(&self) -> bool {
        validate_hull(self)
    }
}

// quickhull recursion
fn recurse_hull(p1: Vec2, p2: Vec2, ps: &[Vec2]) -> Hull {
    let mut hull = Hull::default();
    if ps.is_empty() {
        return hull;
    }

    // edge vector pointing from p1 to p2
    let e = (p2 - p1).normalize();

    // discard points left of e and find the point furthest to the right of e
    let mut right_points = Vec::with_capacity(ps.len());
    let mut best_index = 0;
    let mut best_distance = (ps[0] - p1).cross(e);
    for (i, p) in ps.iter().enumerate() {
        let distance = (*p - p1).cross(e);
        if distance > best_distance {
            best_index = i;
            best_distance = distance;
        }
        if distance > 0.0 {
            right_points.push(*p);
        }
    }

    if best_distance < 2.0 * linear_slop() {
        return hull;
    }

    let best_point = ps[best_index];

    // hull to the right of p1-best_point
    let hull1 = recurse_hull(p1, best_point, &right_points);

    // hull to the right of best_point-p2
    let hull2 = recurse_hull(best_point, p2, &right_points);

    // stitch together the hulls with the best point
    for p in hull1.points() {
        hull.push(*p);
    }
    hull.push(best_point);
    for p in hull2.points() {
        hull.push(*p);
    }
    hull
}

/// Computes the convex hull of up to eight points with quickhull.
///
/// Points closer than a few linear slops are welded and collinear points are
/// removed. Returns an empty hull (count zero) when the input has fewer than
/// three points, more than eight points, or is degenerate.
pub fn compute_hull(points: &[Vec2]) -> Hull {
    let mut hull = Hull::default();
    let count = points.len();
    if !(3..=MAX_POLYGON_VERTICES).contains(&count) {
        return hull;
    }

    let slop = linear_slop();
    let tol_sqr = 16.0 * slop * slop;

    // Aggressive point welding; the first point always remains. Also compute
    // the bounding box for later.
    let mut lower = Vec2::new(f32::MAX, f32::MAX);
    let mut upper = Vec2::new(-f32::MAX, -f32::MAX);
    let mut ps: Vec<Vec2> = Vec::with_capacity(count);
    for (i, &vi) in points.iter().enumerate() {
        lower = lower.min(vi);
        upper = upper.max(vi);
        let unique = points[..i].iter().all(|&vj| vi.distance_squared(vj) >= tol_sqr);
        if unique {
            ps.push(vi);
        }
    }

    if ps.len() < 3 {
        // all points very close together
        return hull;
    }

    // Find an extreme point as the first point on the hull
    let c = Vec2::lerp(lower, upper, 0.5);
    let mut f1 = 0;
    let mut dsq1 = c.distance_squared(ps[0]);
    for (i, p) in ps.iter().enumerate().skip(1) {
        let dsq = c.distance_squared(*p);
        if dsq > dsq1 {
            f1 = i;
            dsq1 = dsq;
        }
    }

    // remove p1 from the working set
    let p1 = ps.swap_remove(f1);

    let mut f2 = 0;
    let mut dsq2 = p1.distance_squared(ps[0]);
    for (i, p) in ps.iter().enumerate().skip(1) {
        let dsq = p1.distance_squared(*p);
        if dsq > dsq2 {
            f2 = i;
            dsq2 = dsq;
        }
    }

    // remove p2 from the working set
    let p2 = ps.swap_remove(f2);

    // split the points into points that are left and right of the line p1-p2
    let mut right_points = Vec::with_capacity(ps.len());
    let mut left_points = Vec::with_capacity(ps.len());
    let e = (p2 - p1).normalize();
    for p in &ps {
        let d = (*p - p1).cross(e);
        // slop used here to skip points that are very close to the line p1-p2
        if d >= 2.0 * slop {
            right_points.push(*p);
        } else if d <= -2.0 * slop {
            left_points.push(*p);
        }
    }

    let hull1 = recurse_hull(p1, p2, &right_points);
    let hull2 = recurse_hull(p2, p1, &left_points);

    if hull1.count == 0 && hull2.count == 0 {
        // all points collinear
        return hull;
    }

    // stitch together the hulls
    hull.push(p1);
    for p in hull1.points() {
        hull.push(*p);
    }
    hull.push(p2);
    for p in hull2.points() {
        hull.push(*p);
    }

    // merge collinear points
    let mut searching = true;
    while searching && hull.count > 2 {
        searching = false;

        for i in 0..hull.count {
            let i2 = (i + 1) % hull.count;
            let i3 = (i + 2) % hull.count;

            let s1 = hull.points[i];
            let s2 = hull.points[i2];
            let s3 = hull.points[i3];

            // unit edge vector for s1-s3
            let r = (s3 - s1).normalize();

            let distance = (s2 - s1).cross(r);
            if distance <= 2.0 * slop {
                // remove the midpoint from the hull
                for j in i2..hull.count - 1 {
                    hull.points[j] = hull.points[j + 1];
                }
                hull.count -= 1;

                // continue searching for collinear points
                searching = true;
                break;
            }
        }
    }

    if hull.count < 3 {
        // all points collinear
        hull.count = 0;
    }

    hull
}

/// Checks that a hull is convex, counter-clockwise and free of collinear
/// points. Expensive; intended for validating user input.
pub fn validate_hull(hull: &Hull) -> bool {
    if hull.count < 3 || MAX_POLYGON_VERTICES < hull.count {
        return false;
    }

    // every point must be behind every edge
    for i in 0..hull.count {
        let i1 = i;
        let i2 = if i < hull.count - 1 { i1 + 1 } else { 0 };
        let p = hull.points[i1];
        let e = (hull.points[i2] - p).normalize();

        for j in 0..hull.count {
            // skip points that subtend the current edge
            if j == i1 || j == i2 {
                continue;
            }

            let distance = (hull.points[j] - p).cross(e);
            if distance >= 0.0 {
                return false;
            }
        }
    }

    // test for collinear points
    let slop = linear_slop();
    for i in 0..hull.count {
        let p1 = hull.points[i];
        let p2 = hull.points[(i + 1) % hull.count];
        let p3 = hull.points[(i + 2) % hull.count];

        let e = (p3 - p1).normalize();
        let distance = (p2 - p1).cross(e);
        if distance <= slop {
            // p1-p2-p3 are collinear
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_hull_of_square_with_interior_point() {
        let points = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let hull = compute_hull(&points);
        assert_eq!(hull.count, 4);
        assert!(validate_hull(&hull));
    }

    #[test]
    fn test_hull_removes_collinear_points() {
        let points = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let hull = compute_hull(&points);
        assert_eq!(hull.count, 4);
    }

    #[test]
    fn test_degenerate_hulls_are_empty() {
        let collinear = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert_eq!(compute_hull(&collinear).count, 0);
        let welded = [Vec2::new(0.0, 0.0), Vec2::new(0.001, 0.0), Vec2::new(0.0, 0.001)];
        assert_eq!(compute_hull(&welded).count, 0);
        assert_eq!(compute_hull(&[Vec2::ZERO, Vec2::X]).count, 0);
        assert!(!validate_hull(&Hull::default()));
    }

    #[test]
    fn test_random_hulls_validate() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let count = rng.gen_range(3..=MAX_POLYGON_VERTICES);
            let points: Vec<Vec2> = (0..count)
                .map(|_| Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)))
                .collect();
            let hull = compute_hull(&points);
            if hull.count > 0 {
                assert!(validate_hull(&hull), "invalid hull from {points:?}");
            }
        }
    }
}
