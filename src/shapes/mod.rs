//! Convex shape primitives and the tagged geometry attached to bodies.

pub mod capsule;
pub mod chain_segment;
pub mod circle;
pub mod hull;
pub mod mass;
pub mod polygon;
pub mod segment;

pub use capsule::Capsule;
pub use chain_segment::ChainSegment;
pub use circle::Circle;
pub use hull::{compute_hull, validate_hull, Hull};
pub use mass::{combine_mass, MassData};
pub use polygon::{
    compute_polygon_centroid, make_box, make_capsule, make_offset_box, make_offset_polygon, make_offset_rounded_box,
    make_offset_rounded_polygon, make_polygon, make_rounded_box, make_square, transform_polygon, Polygon,
};
pub use segment::Segment;

use crate::collision::aabb::AABB;
use crate::collision::cast::{CastOutput, RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, ShapeProxy};
use crate::math::{Transform, Vec2};

/// Shape type tag. The order matters for the manifold function table.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeType {
    Circle,
    Capsule,
    Segment,
    Polygon,
    ChainSegment,
}

impl ShapeType {
    pub const COUNT: usize = 5;
}

/// Geometry of a shape in body-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeGeometry {
    Circle(Circle),
    Capsule(Capsule),
    Segment(Segment),
    Polygon(Polygon),
    ChainSegment(ChainSegment),
}

impl ShapeGeometry {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            ShapeGeometry::Circle(_) => ShapeType::Circle,
            ShapeGeometry::Capsule(_) => ShapeType::Capsule,
            ShapeGeometry::Segment(_) => ShapeType::Segment,
            ShapeGeometry::Polygon(_) => ShapeType::Polygon,
            ShapeGeometry::ChainSegment(_) => ShapeType::ChainSegment,
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            ShapeGeometry::Circle(s) => s.compute_mass(density),
            ShapeGeometry::Capsule(s) => s.compute_mass(density),
            ShapeGeometry::Segment(s) => s.compute_mass(density),
            ShapeGeometry::Polygon(s) => s.compute_mass(density),
            ShapeGeometry::ChainSegment(s) => s.compute_mass(density),
        }
    }

    /// Tight bounding box of the geometry under `xf`.
    pub fn compute_aabb(&self, xf: Transform) -> AABB {
        match self {
            ShapeGeometry::Circle(s) => s.compute_aabb(xf),
            ShapeGeometry::Capsule(s) => s.compute_aabb(xf),
            ShapeGeometry::Segment(s) => s.compute_aabb(xf),
            ShapeGeometry::Polygon(s) => s.compute_aabb(xf),
            ShapeGeometry::ChainSegment(s) => s.compute_aabb(xf),
        }
    }

    /// Local space containment. Segments and chain segments contain nothing.
    pub fn test_point(&self, local_point: Vec2) -> bool {
        match self {
            ShapeGeometry::Circle(s) => s.test_point(local_point),
            ShapeGeometry::Capsule(s) => s.test_point(local_point),
            ShapeGeometry::Polygon(s) => s.test_point(local_point),
            ShapeGeometry::Segment(_) | ShapeGeometry::ChainSegment(_) => false,
        }
    }

    /// Local space ray cast.
    pub fn ray_cast(&self, input: &RayCastInput) -> CastOutput {
        match self {
            ShapeGeometry::Circle(s) => s.ray_cast(input),
            ShapeGeometry::Capsule(s) => s.ray_cast(input),
            ShapeGeometry::Segment(s) => s.ray_cast(input, false),
            ShapeGeometry::Polygon(s) => s.ray_cast(input),
            ShapeGeometry::ChainSegment(s) => s.ray_cast(input),
        }
    }

    /// Local space shape cast.
    pub fn shape_cast(&self, input: &ShapeCastInput) -> CastOutput {
        match self {
            ShapeGeometry::Circle(s) => s.shape_cast(input),
            ShapeGeometry::Capsule(s) => s.shape_cast(input),
            ShapeGeometry::Segment(s) => s.shape_cast(input),
            ShapeGeometry::Polygon(s) => s.shape_cast(input),
            ShapeGeometry::ChainSegment(s) => s.shape_cast(input),
        }
    }

    /// GJK proxy in local space.
    pub fn make_proxy(&self) -> ShapeProxy {
        match self {
            ShapeGeometry::Circle(s) => make_proxy(&[s.center], s.radius),
            ShapeGeometry::Capsule(s) => make_proxy(&[s.center1, s.center2], s.radius),
            ShapeGeometry::Segment(s) => make_proxy(&[s.point1, s.point2], 0.0),
            ShapeGeometry::Polygon(s) => make_proxy(s.vertices(), s.radius),
            ShapeGeometry::ChainSegment(s) => make_proxy(&[s.segment.point1, s.segment.point2], 0.0),
        }
    }

    /// Local centroid of the geometry.
    pub fn centroid(&self) -> Vec2 {
        match self {
            ShapeGeometry::Circle(s) => s.center,
            ShapeGeometry::Capsule(s) => Vec2::lerp(s.center1, s.center2, 0.5),
            ShapeGeometry::Segment(s) => Vec2::lerp(s.point1, s.point2, 0.5),
            ShapeGeometry::Polygon(s) => s.centroid,
            ShapeGeometry::ChainSegment(s) => Vec2::lerp(s.segment.point1, s.segment.point2, 0.5),
        }
    }

    /// Rounding radius of the geometry.
    pub fn radius(&self) -> f32 {
        match self {
            ShapeGeometry::Circle(s) => s.radius,
            ShapeGeometry::Capsule(s) => s.radius,
            ShapeGeometry::Polygon(s) => s.radius,
            ShapeGeometry::Segment(_) | ShapeGeometry::ChainSegment(_) => 0.0,
        }
    }

    /// Perimeter of the geometry. Segments count both sides.
    pub fn perimeter(&self) -> f32 {
        match self {
            ShapeGeometry::Circle(s) => 2.0 * std::f32::consts::PI * s.radius,
            ShapeGeometry::Capsule(s) => 2.0 * s.length() + 2.0 * std::f32::consts::PI * s.radius,
            ShapeGeometry::Segment(s) => 2.0 * s.length(),
            ShapeGeometry::ChainSegment(s) => 2.0 * s.segment.length(),
            ShapeGeometry::Polygon(s) => {
                let vertices = s.vertices();
                let mut perimeter = 2.0 * std::f32::consts::PI * s.radius;
                for (i, v) in vertices.iter().enumerate() {
                    let next = vertices[(i + 1) % vertices.len()];
                    perimeter += v.distance(next);
                }
                perimeter
            }
        }
    }

    /// Width of the geometry projected onto a local unit `line`.
    pub fn projected_perimeter(&self, line: Vec2) -> f32 {
        let span = |points: &[Vec2]| {
            let (lower, upper) = points.iter().fold((f32::MAX, f32::MIN), |(lower, upper), p| {
                let value = p.dot(line);
                (lower.min(value), upper.max(value))
            });
            upper - lower
        };
        match self {
            ShapeGeometry::Circle(s) => 2.0 * s.radius,
            ShapeGeometry::Capsule(s) => span(&[s.center1, s.center2]) + 2.0 * s.radius,
            ShapeGeometry::Segment(s) => span(&[s.point1, s.point2]),
            ShapeGeometry::ChainSegment(s) => span(&[s.segment.point1, s.segment.point2]),
            ShapeGeometry::Polygon(s) => span(s.vertices()) + 2.0 * s.radius,
        }
    }

    /// Minimum and maximum distance from `local_center` to the shape
    /// surface, used to decide bullet eligibility and the continuous
    /// collision threshold.
    pub fn extent(&self, local_center: Vec2) -> ShapeExtent {
        match self {
            ShapeGeometry::Circle(s) => {
                let radius = s.radius;
                ShapeExtent {
                    min_extent: radius,
                    max_extent: s.center.distance(local_center) + radius,
                }
            }
            ShapeGeometry::Capsule(s) => {
                let radius = s.radius;
                let c1 = s.center1.distance(local_center);
                let c2 = s.center2.distance(local_center);
                ShapeExtent {
                    min_extent: radius,
                    max_extent: c1.max(c2) + radius,
                }
            }
            ShapeGeometry::Polygon(s) => {
                let mut min_extent = crate::common::constants::huge();
                let mut max_extent_sqr: f32 = 0.0;
                for (v, n) in s.vertices().iter().zip(s.normals()) {
                    let plane_offset = n.dot(*v - s.centroid);
                    min_extent = min_extent.min(plane_offset);
                    max_extent_sqr = max_extent_sqr.max(v.distance_squared(local_center));
                }
                ShapeExtent {
                    min_extent: min_extent + s.radius,
                    max_extent: max_extent_sqr.sqrt() + s.radius,
                }
            }
            ShapeGeometry::Segment(s) => ShapeExtent {
                min_extent: 0.0,
                max_extent: s.point1.distance(local_center).max(s.point2.distance(local_center)),
            },
            ShapeGeometry::ChainSegment(s) => ShapeExtent {
                min_extent: 0.0,
                max_extent: s
                    .segment
                    .point1
                    .distance(local_center)
                    .max(s.segment.point2.distance(local_center)),
            },
        }
    }
}

/// See [`ShapeGeometry::extent`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapeExtent {
    pub min_extent: f32,
    pub max_extent: f32,
}

impl From<Circle> for ShapeGeometry {
    fn from(s: Circle) -> Self {
        ShapeGeometry::Circle(s)
    }
}

impl From<Capsule> for ShapeGeometry {
    fn from(s: Capsule) -> Self {
        ShapeGeometry::Capsule(s)
    }
}

impl From<Segment> for ShapeGeometry {
    fn from(s: Segment) -> Self {
        ShapeGeometry::Segment(s)
    }
}

impl From<Polygon> for ShapeGeometry {
    fn from(s: Polygon) -> Self {
        ShapeGeometry::Polygon(s)
    }
}

impl From<ChainSegment> for ShapeGeometry {
    fn from(s: ChainSegment) -> Self {
        ShapeGeometry::ChainSegment(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_geometry_dispatch() {
        let circle: ShapeGeometry = Circle::new(Vec2::new(1.0, 0.0), 0.5).into();
        assert_eq!(circle.shape_type(), ShapeType::Circle);
        assert!(circle.test_point(Vec2::new(1.2, 0.0)));
        assert_eq!(circle.make_proxy().count, 1);

        let segment: ShapeGeometry = Segment::new(Vec2::ZERO, Vec2::X).into();
        assert!(!segment.test_point(Vec2::new(0.5, 0.0)));
        assert_eq!(segment.compute_mass(1.0).mass, 0.0);
    }

    #[test]
    fn test_box_extent() {
        let b: ShapeGeometry = make_box(1.0, 0.5).into();
        let extent = b.extent(Vec2::ZERO);
        assert_relative_eq!(extent.min_extent, 0.5, epsilon = 1e-6);
        assert_relative_eq!(extent.max_extent, (1.25f32).sqrt(), epsilon = 1e-6);
        assert_relative_eq!(b.perimeter(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_projected_perimeter() {
        let b: ShapeGeometry = make_box(1.0, 0.5).into();
        assert_relative_eq!(b.projected_perimeter(Vec2::X), 2.0, epsilon = 1e-5);
        assert_relative_eq!(b.projected_perimeter(Vec2::Y), 1.0, epsilon = 1e-5);

        let circle: ShapeGeometry = Circle::new(Vec2::ZERO, 0.25).into();
        assert_relative_eq!(circle.projected_perimeter(Vec2::Y), 0.5);
    }
}
