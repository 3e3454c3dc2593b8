//! Collision planes for kinematic character movers.
//!
//! A mover is a capsule that is moved by the game rather than simulated. The
//! world gathers one plane per nearby shape and [`solve_planes`] finds a
//! translation that respects all of them at once.

use crate::collision::distance::{make_proxy, shape_distance, DistanceInput, SimplexCache};
use crate::common::constants::linear_slop;
use crate::math::{Plane, Transform, Vec2};
use crate::shapes::{Capsule, ShapeGeometry};

const PLANE_SOLVER_MAX_ITERATIONS: usize = 20;

/// Result of colliding a mover with one shape.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaneResult {
    /// The collision plane between the mover and the shape. The normal
    /// points toward the mover and the offset is the penetration depth.
    pub plane: Plane,
    /// The collision point on the shape.
    pub point: Vec2,
    /// Did the mover touch the shape?
    pub hit: bool,
}

/// A collision plane fed to the plane solver.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CollisionPlane {
    pub plane: Plane,
    /// Maximum push the plane may apply. Use `f32::MAX` for rigid planes and
    /// smaller values for soft ones.
    pub push_limit: f32,
    /// Push accumulated by the solver, output.
    pub push: f32,
    /// Whether [`clip_vector`] should remove velocity into this plane.
    pub clip_velocity: bool,
}

impl CollisionPlane {
    pub fn rigid(plane: Plane) -> Self {
        Self {
            plane,
            push_limit: f32::MAX,
            push: 0.0,
            clip_velocity: true,
        }
    }
}

/// Result of [`solve_planes`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PlaneSolverResult {
    /// The translation of the mover.
    pub translation: Vec2,
    /// Iterations used by the solver, for diagnostics.
    pub iteration_count: usize,
}

/// Iteratively projects `target_delta` against the planes. Each plane keeps
/// an accumulated push clamped to `[0, push_limit]`. Stops when a sweep over
/// all planes moves less than the linear slop or at the iteration cap.
pub fn solve_planes(target_delta: Vec2, planes: &mut [CollisionPlane]) -> PlaneSolverResult {
    for plane in planes.iter_mut() {
        plane.push = 0.0;
    }

    let slop = linear_slop();
    let mut delta = target_delta;
    let tolerance = slop;

    let mut iteration = 0;
    while iteration < PLANE_SOLVER_MAX_ITERATIONS {
        let mut total_push = 0.0;
        for plane in planes.iter_mut() {
            // Add slop to prevent jitter
            let separation = plane.plane.separation(delta) + slop;

            let mut push = -separation;

            // Clamp accumulated push
            let accumulated = plane.push;
            plane.push = (plane.push + push).clamp(0.0, plane.push_limit);
            push = plane.push - accumulated;
            delta = Vec2::mul_add(delta, push, plane.plane.normal);

            total_push += push.abs();
        }

        if total_push < tolerance {
            break;
        }
        iteration += 1;
    }

    if iteration == PLANE_SOLVER_MAX_ITERATIONS {
        tracing::warn!(plane_count = planes.len(), "plane solver reached the iteration limit");
    }

    PlaneSolverResult {
        translation: delta,
        iteration_count: iteration,
    }
}

/// Removes the component of `vector` that points into pushing planes with
/// velocity clipping enabled.
pub fn clip_vector(vector: Vec2, planes: &[CollisionPlane]) -> Vec2 {
    let mut v = vector;
    for plane in planes {
        if plane.push == 0.0 || !plane.clip_velocity {
            continue;
        }
        v = Vec2::mul_sub(v, v.dot(plane.plane.normal).min(0.0), plane.plane.normal);
    }
    v
}

/// Collides a mover, given in the shape's local frame, with the shape's
/// core points.
fn collide_mover_local(points: &[Vec2], radius: f32, mover: &Capsule) -> PlaneResult {
    let input = DistanceInput {
        proxy_a: make_proxy(points, 0.0),
        proxy_b: make_proxy(&[mover.center1, mover.center2], mover.radius),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };

    let total_radius = mover.radius + radius;
    let mut cache = SimplexCache::default();
    let output = shape_distance(&input, &mut cache, None);
    if output.distance <= total_radius {
        return PlaneResult {
            plane: Plane::new(output.normal, total_radius - output.distance),
            point: output.point_a,
            hit: true,
        };
    }
    PlaneResult::default()
}

/// Collides a mover capsule in world space with a shape placed at
/// `transform`. The plane and point are returned in world space.
pub fn collide_mover(geometry: &ShapeGeometry, transform: Transform, mover: &Capsule) -> PlaneResult {
    let local_mover = Capsule::new(
        transform.apply_inverse(mover.center1),
        transform.apply_inverse(mover.center2),
        mover.radius,
    );

    let local = match geometry {
        ShapeGeometry::Circle(circle) => collide_mover_local(&[circle.center], circle.radius, &local_mover),
        ShapeGeometry::Capsule(capsule) => {
            collide_mover_local(&[capsule.center1, capsule.center2], capsule.radius, &local_mover)
        }
        ShapeGeometry::Segment(segment) => {
            collide_mover_local(&[segment.point1, segment.point2], 0.0, &local_mover)
        }
        ShapeGeometry::Polygon(polygon) => collide_mover_local(polygon.vertices(), polygon.radius, &local_mover),
        ShapeGeometry::ChainSegment(chain) => {
            collide_mover_local(&[chain.segment.point1, chain.segment.point2], 0.0, &local_mover)
        }
    };

    if !local.hit {
        return local;
    }

    PlaneResult {
        plane: Plane::new(transform.q.rotate(local.plane.normal), local.plane.offset),
        point: transform.apply(local.point),
        hit: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;
    use crate::shapes::{make_box, Circle};
    use approx::assert_relative_eq;

    #[test]
    fn test_mover_on_ground_box() {
        let ground = ShapeGeometry::Polygon(make_box(10.0, 0.5));
        let mover = Capsule::new(Vec2::new(0.0, 0.9), Vec2::new(0.0, 1.5), 0.5);
        let result = collide_mover(&ground, Transform::IDENTITY, &mover);
        assert!(result.hit);
        assert_relative_eq!(result.plane.normal.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.plane.offset, 0.1, epsilon = 1e-5);
        assert_relative_eq!(result.point.y, 0.5, epsilon = 1e-5);

        let far = Capsule::new(Vec2::new(0.0, 3.0), Vec2::new(0.0, 4.0), 0.5);
        assert!(!collide_mover(&ground, Transform::IDENTITY, &far).hit);
    }

    #[test]
    fn test_mover_respects_shape_transform() {
        let circle = ShapeGeometry::Circle(Circle::new(Vec2::ZERO, 1.0));
        let xf = Transform::new(Vec2::new(5.0, 0.0), Rot::from_angle(1.0));
        let mover = Capsule::new(Vec2::new(6.2, -0.5), Vec2::new(6.2, 0.5), 0.5);
        let result = collide_mover(&circle, xf, &mover);
        assert!(result.hit);
        assert_relative_eq!(result.plane.normal.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.plane.offset, 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_solve_planes_slides_along_floor() {
        let mut planes = [CollisionPlane::rigid(Plane::new(Vec2::Y, 0.0))];
        let result = solve_planes(Vec2::new(1.0, -1.0), &mut planes);
        assert_relative_eq!(result.translation.x, 1.0);
        // The solver leaves the mover resting within the slop
        assert_relative_eq!(result.translation.y, -linear_slop(), epsilon = 1e-6);
        assert!(planes[0].push > 0.0);

        let clipped = clip_vector(Vec2::new(3.0, -2.0), &planes);
        assert_relative_eq!(clipped.x, 3.0);
        assert_relative_eq!(clipped.y, 0.0);
    }

    #[test]
    fn test_solve_planes_corner() {
        let mut planes = [
            CollisionPlane::rigid(Plane::new(Vec2::Y, 0.0)),
            CollisionPlane::rigid(Plane::new(Vec2::X, 0.0)),
        ];
        let result = solve_planes(Vec2::new(-1.0, -1.0), &mut planes);
        assert!(result.translation.x >= -linear_slop() - 1e-6);
        assert!(result.translation.y >= -linear_slop() - 1e-6);
        assert!(result.iteration_count < PLANE_SOLVER_MAX_ITERATIONS);
    }

    #[test]
    fn test_soft_plane_limits_push() {
        let mut plane = CollisionPlane::rigid(Plane::new(Vec2::Y, 0.0));
        plane.push_limit = 0.25;
        let mut planes = [plane];
        let result = solve_planes(Vec2::new(0.0, -1.0), &mut planes);
        assert_relative_eq!(result.translation.y, -0.75, epsilon = 1e-6);
    }
}
