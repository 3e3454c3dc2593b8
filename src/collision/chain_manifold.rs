//! One-sided chain segment manifolds. Ghost vertices from the neighboring
//! segments are used to reject normals that would snag on internal edges.

use super::distance::{make_proxy, shape_distance, DistanceInput, SimplexCache};
use super::manifold::{make_feature_id, Manifold, ManifoldPoint};
use crate::common::constants::{linear_slop, speculative_distance, MAX_POLYGON_VERTICES};
use crate::math::{Transform, Vec2};
use crate::shapes::{make_capsule, Capsule, ChainSegment, Circle, Polygon};

/// Compute the contact manifold between a chain segment and a circle.
pub fn collide_chain_segment_and_circle(
    segment_a: &ChainSegment,
    xf_a: Transform,
    circle_b: &Circle,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.inv_mul(xf_b);

    // Compute circle in frame of segment
    let p_b = xf.apply(circle_b.center);

    let p1 = segment_a.segment.point1;
    let p2 = segment_a.segment.point2;
    let e = p2 - p1;

    // Normal points to the right
    let offset = e.right_perp().dot(p_b - p1);
    if offset < 0.0 {
        // collision is one-sided
        return manifold;
    }

    // Barycentric coordinates
    let u = e.dot(p2 - p_b);
    let v = e.dot(p_b - p1);

    let p_a = if v <= 0.0 {
        // Behind point1?
        // Is p_b in the Voronoi region of the previous edge?
        let prev_edge = p1 - segment_a.ghost1;
        let u_prev = prev_edge.dot(p_b - p1);
        if u_prev <= 0.0 {
            return manifold;
        }
        p1
    } else if u <= 0.0 {
        // Ahead of point2?
        let next_edge = segment_a.ghost2 - p2;
        let v_next = next_edge.dot(p_b - p2);

        // Is p_b in the Voronoi region of the next edge?
        if v_next > 0.0 {
            return manifold;
        }
        p2
    } else {
        let ee = e.dot(e);
        let p = Vec2::new(u * p1.x + v * p2.x, u * p1.y + v * p2.y);
        if ee > 0.0 {
            p * (1.0 / ee)
        } else {
            p1
        }
    };

    let (distance, normal) = (p_b - p_a).length_and_normalize();

    let radius = circle_b.radius;
    let separation = distance - radius;
    if separation > speculative_distance() {
        return manifold;
    }

    let c_a = p_a;
    let c_b = Vec2::mul_add(p_b, -radius, normal);
    let contact = Vec2::lerp(c_a, c_b, 0.5);

    manifold.normal = xf_a.q.rotate(normal);
    let anchor_a = xf_a.q.rotate(contact);
    manifold.points[0] = ManifoldPoint {
        anchor_a,
        anchor_b: anchor_a + (xf_a.p - xf_b.p),
        point: xf_a.p + anchor_a,
        separation,
        id: 0,
        ..Default::default()
    };
    manifold.point_count = 1;
    manifold
}

/// Compute the contact manifold between a chain segment and a capsule.
pub fn collide_chain_segment_and_capsule(
    segment_a: &ChainSegment,
    xf_a: Transform,
    capsule_b: &Capsule,
    xf_b: Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    let polygon_b = make_capsule(capsule_b.center1, capsule_b.center2, capsule_b.radius);
    collide_chain_segment_and_polygon(segment_a, xf_a, &polygon_b, xf_b, cache)
}

// Clips an incident segment against a reference segment. Points and normal
// stay in the local frame.
#[allow(clippy::too_many_arguments)]
fn clip_segments(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2, normal: Vec2, ra: f32, rb: f32, id1: u16, id2: u16) -> Manifold {
    let mut manifold = Manifold::default();

    let tangent = normal.left_perp();

    // Barycentric coordinates of each point relative to a1 along tangent
    let lower1 = 0.0;
    let upper1 = (a2 - a1).dot(tangent);

    // Incident edge points opposite of tangent due to CCW winding
    let upper2 = (b1 - a1).dot(tangent);
    let lower2 = (b2 - a1).dot(tangent);

    // Do segments overlap?
    if upper2 < lower1 || upper1 < lower2 {
        return manifold;
    }

    let v_lower = if lower2 < lower1 && upper2 - lower2 > f32::EPSILON {
        Vec2::lerp(b2, b1, (lower1 - lower2) / (upper2 - lower2))
    } else {
        b2
    };

    let v_upper = if upper2 > upper1 && upper2 - lower2 > f32::EPSILON {
        Vec2::lerp(b2, b1, (upper1 - lower2) / (upper2 - lower2))
    } else {
        b1
    };

    let separation_lower = (v_lower - a1).dot(normal);
    let separation_upper = (v_upper - a1).dot(normal);

    // put contact points at midpoint, accounting for capsule radius
    let v_lower = Vec2::mul_add(v_lower, 0.5 * (ra - rb - separation_lower), normal);
    let v_upper = Vec2::mul_add(v_upper, 0.5 * (ra - rb - separation_upper), normal);

    let radius = ra + rb;

    manifold.normal = normal;
    manifold.points[0] = ManifoldPoint {
        anchor_a: v_lower,
        separation: separation_lower - radius,
        id: id1,
        ..Default::default()
    };
    manifold.points[1] = ManifoldPoint {
        anchor_a: v_upper,
        separation: separation_upper - radius,
        id: id2,
        ..Default::default()
    };
    manifold.point_count = 2;
    manifold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NormalType {
    // This normal should be skipped because it is not collinear with an
    // admissible direction
    Skip,
    // This normal is admissible
    Admit,
    // This normal is snapped to the segment normal
    Snap,
}

#[derive(Debug, Clone, Copy)]
struct ChainSegmentParams {
    edge1: Vec2,
    normal0: Vec2,
    normal2: Vec2,
    convex1: bool,
    convex2: bool,
}

// Evaluate the Gauss map
fn classify_normal(params: &ChainSegmentParams, normal: Vec2) -> NormalType {
    const SIN_TOL: f32 = 0.01;

    if normal.dot(params.edge1) <= 0.0 {
        // Normal points towards the segment tail
        if params.convex1 {
            if normal.cross(params.normal0) > SIN_TOL {
                return NormalType::Skip;
            }
            return NormalType::Admit;
        }
        NormalType::Snap
    } else {
        // Normal points towards segment head
        if params.convex2 {
            if params.normal2.cross(normal) > SIN_TOL {
                return NormalType::Skip;
            }
            return NormalType::Admit;
        }
        NormalType::Snap
    }
}

fn finish_local(mut manifold: Manifold, normal: Vec2, xf_a: Transform, xf_b: Transform) -> Manifold {
    manifold.normal = xf_a.q.rotate(normal);
    let p_ab = xf_a.p - xf_b.p;
    for mp in manifold.points_mut() {
        mp.anchor_a = xf_a.q.rotate(mp.anchor_a);
        mp.anchor_b = mp.anchor_a + p_ab;
        mp.point = mp.anchor_a + xf_a.p;
    }
    manifold
}

/// Compute the contact manifold between a chain segment and a polygon.
///
/// The simplex cache is kept by the contact so GJK warm starts as the
/// polygon slides along the chain.
pub fn collide_chain_segment_and_polygon(
    segment_a: &ChainSegment,
    xf_a: Transform,
    polygon_b: &Polygon,
    xf_b: Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    let manifold = Manifold::default();

    let xf = xf_a.inv_mul(xf_b);

    let centroid_b = xf.apply(polygon_b.centroid);
    let radius_b = polygon_b.radius;

    let p1 = segment_a.segment.point1;
    let p2 = segment_a.segment.point2;

    let edge1 = (p2 - p1).normalize();

    const CONVEX_TOL: f32 = 0.01;
    let edge0 = (p1 - segment_a.ghost1).normalize();
    let edge2 = (segment_a.ghost2 - p2).normalize();

    let params = ChainSegmentParams {
        edge1,
        normal0: edge0.right_perp(),
        normal2: edge2.right_perp(),
        convex1: edge0.cross(edge1) >= CONVEX_TOL,
        convex2: edge1.cross(edge2) >= CONVEX_TOL,
    };

    // Normal points to the right
    let normal1 = edge1.right_perp();
    let behind1 = normal1.dot(centroid_b - p1) < 0.0;
    let behind0 = if params.convex1 {
        params.normal0.dot(centroid_b - p1) < 0.0
    } else {
        true
    };
    let behind2 = if params.convex2 {
        params.normal2.dot(centroid_b - p2) < 0.0
    } else {
        true
    };

    if behind1 && behind0 && behind2 {
        // one-sided collision
        return manifold;
    }

    // Get polygon_b in frame A
    let count = polygon_b.count;
    let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
    let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
    for i in 0..count {
        vertices[i] = xf.apply(polygon_b.vertices[i]);
        normals[i] = xf.q.rotate(polygon_b.normals[i]);
    }

    // Distance doesn't work correctly with partial polygons
    let input = DistanceInput {
        proxy_a: make_proxy(&[p1, p2], 0.0),
        proxy_b: make_proxy(&vertices[..count], 0.0),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };

    let output = shape_distance(&input, cache, None);

    if output.distance > radius_b + speculative_distance() {
        return manifold;
    }

    // Snap concave normals for partial polygon
    let n0 = if params.convex1 { params.normal0 } else { normal1 };
    let n2 = if params.convex2 { params.normal2 } else { normal1 };

    let next = |i: usize| if i + 1 < count { i + 1 } else { 0 };

    // Index of incident vertex on polygon
    let mut incident_index: Option<usize> = None;
    let mut incident_normal: Option<usize> = None;

    if !behind1 && output.distance > 0.1 * linear_slop() {
        // The closest features may be two vertices or an edge and a vertex
        // even when there should be two vertices. So check out the cache.
        if cache.count == 1 {
            // vertex-vertex collision
            let p_a = output.point_a;
            let p_b = output.point_b;

            let normal = (p_b - p_a).normalize();

            match classify_normal(&params, normal) {
                NormalType::Skip => return manifold,
                NormalType::Admit => {
                    let mut m = Manifold::default();
                    m.points[0] = ManifoldPoint {
                        anchor_a: p_a,
                        separation: output.distance - radius_b,
                        id: make_feature_id(cache.index_a[0] as usize, cache.index_b[0] as usize),
                        ..Default::default()
                    };
                    m.point_count = 1;
                    return finish_local(m, normal, xf_a, xf_b);
                }
                // fall through to snapping
                NormalType::Snap => incident_index = Some(cache.index_b[0] as usize),
            }
        } else {
            // vertex-edge collision
            debug_assert_eq!(cache.count, 2);

            let ia1 = cache.index_a[0];
            let ia2 = cache.index_a[1];
            let ib1 = cache.index_b[0] as usize;
            let ib2 = cache.index_b[1] as usize;

            if ia1 == ia2 {
                // 1 point on A, expect 2 points on B
                debug_assert_ne!(ib1, ib2);

                // Find polygon normal most aligned with vector between closest
                // points. This effectively sorts ib1 and ib2.
                let normal_b = output.point_a - output.point_b;
                let dot1 = normal_b.dot(normals[ib1]);
                let dot2 = normal_b.dot(normals[ib2]);
                let ib = if dot1 > dot2 { ib1 } else { ib2 };

                // Use accurate normal
                let normal_b = normals[ib];

                match classify_normal(&params, -normal_b) {
                    NormalType::Skip => return manifold,
                    NormalType::Admit => {
                        // Get polygon edge associated with normal
                        let ib1 = ib;
                        let ib2 = next(ib);

                        let b1 = vertices[ib1];
                        let b2 = vertices[ib2];

                        // Find incident segment vertex
                        let dot1 = normal_b.dot(p1 - b1);
                        let dot2 = normal_b.dot(p2 - b1);

                        let neighbor = if dot1 < dot2 { n0 } else { n2 };
                        if neighbor.dot(normal_b) < normal1.dot(normal_b) {
                            // Neighbor is incident
                            return manifold;
                        }

                        let m = clip_segments(
                            b1,
                            b2,
                            p1,
                            p2,
                            normal_b,
                            radius_b,
                            0.0,
                            make_feature_id(ib1, 1),
                            make_feature_id(ib2, 0),
                        );
                        return finish_local(m, -normal_b, xf_a, xf_b);
                    }
                    // fall through to snapping
                    NormalType::Snap => incident_normal = Some(ib),
                }
            } else {
                // Get index of incident polygon_b vertex
                let dot1 = normal1.dot(vertices[ib1] - p1);
                let dot2 = normal1.dot(vertices[ib2] - p2);
                incident_index = Some(if dot1 < dot2 { ib1 } else { ib2 });
            }
        }
    } else {
        // SAT edge normal
        let mut edge_separation = f32::MAX;

        for (i, v) in vertices[..count].iter().enumerate() {
            let s = normal1.dot(*v - p1);
            if s < edge_separation {
                edge_separation = s;
                incident_index = Some(i);
            }
        }

        // Check convex neighbor for edge separation
        if params.convex1 {
            let s0 = vertices[..count]
                .iter()
                .map(|v| params.normal0.dot(*v - p1))
                .fold(f32::MAX, f32::min);

            if s0 > edge_separation {
                edge_separation = s0;

                // Indicate neighbor owns edge separation
                incident_index = None;
            }
        }

        // Check convex neighbor for edge separation
        if params.convex2 {
            let s2 = vertices[..count]
                .iter()
                .map(|v| params.normal2.dot(*v - p2))
                .fold(f32::MAX, f32::min);

            if s2 > edge_separation {
                edge_separation = s2;

                // Indicate neighbor owns edge separation
                incident_index = None;
            }
        }

        // SAT polygon normals
        let mut polygon_separation = -f32::MAX;
        let mut reference_index = None;

        for i in 0..count {
            let n = normals[i];

            if classify_normal(&params, -n) != NormalType::Admit {
                continue;
            }

            let p = vertices[i];
            let s = n.dot(p2 - p).min(n.dot(p1 - p));

            if s > polygon_separation {
                polygon_separation = s;
                reference_index = Some(i);
            }
        }

        if let Some(ia1) = reference_index.filter(|_| polygon_separation > edge_separation) {
            let ia2 = next(ia1);
            let a1 = vertices[ia1];
            let a2 = vertices[ia2];

            let n = normals[ia1];

            let dot1 = n.dot(p1 - a1);
            let dot2 = n.dot(p2 - a1);

            let neighbor = if dot1 < dot2 { n0 } else { n2 };
            if neighbor.dot(n) < normal1.dot(n) {
                // Neighbor is incident
                return manifold;
            }

            let m = clip_segments(
                a1,
                a2,
                p1,
                p2,
                n,
                radius_b,
                0.0,
                make_feature_id(ia1, 1),
                make_feature_id(ia2, 0),
            );
            return finish_local(m, -n, xf_a, xf_b);
        }

        if incident_index.is_none() {
            // neighboring segment is the separating axis
            return manifold;
        }

        // fall through segment normal axis
    }

    // Segment normal

    // Find incident polygon normal: normal adjacent to deepest vertex that
    // is most anti-parallel to segment normal
    let (ib1, ib2) = match (incident_normal, incident_index) {
        (Some(ib), _) => (ib, next(ib)),
        (None, Some(i2)) => {
            let i1 = if i2 > 0 { i2 - 1 } else { count - 1 };
            let d1 = normal1.dot(normals[i1]);
            let d2 = normal1.dot(normals[i2]);
            if d1 < d2 {
                (i1, i2)
            } else {
                (i2, next(i2))
            }
        }
        (None, None) => return manifold,
    };

    let b1 = vertices[ib1];
    let b2 = vertices[ib2];

    let m = clip_segments(
        p1,
        p2,
        b1,
        b2,
        normal1,
        0.0,
        radius_b,
        make_feature_id(0, ib2),
        make_feature_id(1, ib1),
    );
    let normal = m.normal;
    finish_local(m, normal, xf_a, xf_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;
    use crate::shapes::make_box;
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32) -> Transform {
        Transform::new(Vec2::new(x, y), Rot::IDENTITY)
    }

    // Flat ground running right to left so the solid side faces up
    fn flat_ground() -> ChainSegment {
        ChainSegment::new(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        )
    }

    #[test]
    fn test_circle_on_chain_segment() {
        let ground = flat_ground();
        let circle = Circle::new(Vec2::ZERO, 0.5);
        let m = collide_chain_segment_and_circle(&ground, at(0.0, 0.0), &circle, at(0.2, 0.45));
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(m.points[0].separation, -0.05, epsilon = 1e-6);

        // below the one-sided segment
        let below = collide_chain_segment_and_circle(&ground, at(0.0, 0.0), &circle, at(0.2, -0.45));
        assert_eq!(below.point_count, 0);
    }

    #[test]
    fn test_box_on_chain_segment() {
        let ground = flat_ground();
        let b = make_box(0.25, 0.25);
        let mut cache = SimplexCache::default();
        let m = collide_chain_segment_and_polygon(&ground, at(0.0, 0.0), &b, at(0.0, 0.245), &mut cache);
        assert_eq!(m.point_count, 2);
        assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-5);
        for p in m.points() {
            assert_relative_eq!(p.separation, -0.005, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_box_sliding_over_internal_vertex_keeps_flat_normal() {
        // Two collinear segments; the box straddles the shared vertex
        let right = ChainSegment::new(Vec2::new(3.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(-2.0, 0.0));
        let b = make_box(0.25, 0.25);
        let mut cache = SimplexCache::default();
        let m = collide_chain_segment_and_polygon(&right, at(0.0, 0.0), &b, at(0.1, 0.26), &mut cache);
        for p in m.points() {
            assert!(p.separation > -0.01);
        }
        if m.point_count > 0 {
            assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-5);
        }
    }
}
