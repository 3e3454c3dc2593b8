//! Contact manifolds for convex shape pairs.
//!
//! Every routine works in the local frame of shape A and converts the result
//! back to world space at the end. Anchors are stored relative to the body
//! origins so the solver can rebuild contact points after bodies move.

use crate::collision::distance::{segment_distance, SimplexCache};
use crate::common::constants::{linear_slop, speculative_distance};
use crate::math::{Transform, Vec2};
use crate::shapes::{make_capsule, Capsule, Circle, Polygon, Segment, ShapeGeometry, ShapeType};

/// Builds a contact feature id from two vertex or edge indices.
#[inline]
pub fn make_feature_id(a: usize, b: usize) -> u16 {
    ((a as u16 & 0xFF) << 8) | (b as u16 & 0xFF)
}

/// A manifold point is a contact point belonging to a contact manifold.
/// It holds details related to the geometry and dynamics of the contact
/// points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifoldPoint {
    /// Location of the contact point in world space. Subject to precision
    /// loss at large coordinates.
    pub point: Vec2,
    /// Location of the contact point relative to body A's origin in world
    /// space.
    pub anchor_a: Vec2,
    /// Location of the contact point relative to body B's origin in world
    /// space.
    pub anchor_b: Vec2,
    /// The separation of the contact point, negative if penetrating.
    pub separation: f32,
    /// The impulse along the manifold normal vector.
    pub normal_impulse: f32,
    /// The friction impulse.
    pub tangent_impulse: f32,
    /// The total normal impulse applied across sub-stepping and restitution.
    pub total_normal_impulse: f32,
    /// Relative normal velocity pre-solve. Used for hit events.
    pub normal_velocity: f32,
    /// Uniquely identifies a contact point between two shapes.
    pub id: u16,
    /// Did this contact point exist the previous step?
    pub persisted: bool,
}

/// A contact manifold describes up to two contact points between two shapes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Manifold {
    /// The unit normal vector in world space, points from shape A to shape B.
    pub normal: Vec2,
    /// Angular impulse applied for rolling resistance.
    pub rolling_impulse: f32,
    pub points: [ManifoldPoint; 2],
    pub point_count: usize,
}

impl Manifold {
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    fn push(&mut self, point: ManifoldPoint) {
        if self.point_count < 2 {
            self.points[self.point_count] = point;
            self.point_count += 1;
        }
    }
}

/// A point in A's local frame and its separation, before conversion.
fn local_point(anchor: Vec2, separation: f32, id: u16) -> ManifoldPoint {
    ManifoldPoint {
        anchor_a: anchor,
        separation,
        id,
        ..Default::default()
    }
}

/// Rotates a manifold computed in A's local frame into world space.
/// `origin` is the local offset the anchors were computed relative to.
fn to_world(mut manifold: Manifold, xf_a: Transform, xf_b: Transform, origin: Vec2) -> Manifold {
    manifold.normal = xf_a.q.rotate(manifold.normal);
    for mp in manifold.points_mut() {
        // anchor points relative to shape origin in world space
        mp.anchor_a = xf_a.q.rotate(mp.anchor_a + origin);
        mp.anchor_b = mp.anchor_a + (xf_a.p - xf_b.p);
        mp.point = xf_a.p + mp.anchor_a;
    }
    manifold
}

/// Single point manifold between two rounded points.
fn collide_rounded_points(p_a: Vec2, radius_a: f32, p_b: Vec2, radius_b: f32, fallback_normal: Vec2) -> Manifold {
    let mut manifold = Manifold::default();

    let (distance, mut normal) = (p_b - p_a).length_and_normalize();
    if distance == 0.0 {
        normal = fallback_normal;
    }

    let separation = distance - radius_a - radius_b;
    if separation > speculative_distance() {
        return manifold;
    }

    let c_a = Vec2::mul_add(p_a, radius_a, normal);
    let c_b = Vec2::mul_add(p_b, -radius_b, normal);
    manifold.normal = normal;
    manifold.push(local_point(Vec2::lerp(c_a, c_b, 0.5), separation, 0));
    manifold
}

/// Compute the contact manifold between two circles.
pub fn collide_circles(circle_a: &Circle, xf_a: Transform, circle_b: &Circle, xf_b: Transform) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);

    let point_a = circle_a.center;
    let point_b = xf.apply(circle_b.center);

    let manifold = collide_rounded_points(point_a, circle_a.radius, point_b, circle_b.radius, Vec2::Y);
    to_world(manifold, xf_a, xf_b, Vec2::ZERO)
}

/// Compute the contact manifold between a capsule and a circle.
pub fn collide_capsule_and_circle(capsule_a: &Capsule, xf_a: Transform, circle_b: &Circle, xf_b: Transform) -> Manifold {
    let xf = xf_a.inv_mul(xf_b);

    // Compute circle position in the frame of the capsule.
    let p_b = xf.apply(circle_b.center);

    // Compute closest point
    let p1 = capsule_a.center1;
    let p2 = capsule_a.center2;

    let e = p2 - p1;

    // dot(p - pA, e) = 0
    // pA = p1 + s1 * e
    // s1 = dot(p - p1, e)
    let s1 = (p_b - p1).dot(e);
    let s2 = (p2 - p_b).dot(e);
    let p_a = if s1 < 0.0 {
        // p_a = p1
        p1
    } else if s2 < 0.0 {
        // p_a = p2
        p2
    } else {
        let s = s1 / e.dot(e);
        Vec2::mul_add(p1, s, e)
    };

    let fallback = e.normalize().left_perp();
    let manifold = collide_rounded_points(p_a, capsule_a.radius, p_b, circle_b.radius, fallback);
    to_world(manifold, xf_a, xf_b, Vec2::ZERO)
}

/// Compute the contact manifold between a polygon and a circle.
pub fn collide_polygon_and_circle(polygon_a: &Polygon, xf_a: Transform, circle_b: &Circle, xf_b: Transform) -> Manifold {
    let mut manifold = Manifold::default();
    let speculative = speculative_distance();

    let xf = xf_a.inv_mul(xf_b);

    // Compute circle position in the frame of the polygon.
    let c = xf.apply(circle_b.center);
    let radius_a = polygon_a.radius;
    let radius_b = circle_b.radius;
    let radius = radius_a + radius_b;

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = -f32::MAX;
    let vertex_count = polygon_a.count;
    let vertices = &polygon_a.vertices;
    let normals = &polygon_a.normals;

    for i in 0..vertex_count {
        let s = normals[i].dot(c - vertices[i]);
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    if separation - radius > speculative {
        return manifold;
    }

    // Vertices of the reference edge.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < vertex_count { vert_index1 + 1 } else { 0 };
    let v1 = vertices[vert_index1];
    let v2 = vertices[vert_index2];

    // Compute barycentric coordinates
    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);

    let vertex_region = if u1 < 0.0 && separation > f32::EPSILON {
        // Circle center is closest to v1 and safely outside the polygon
        Some(v1)
    } else if u2 < 0.0 && separation > f32::EPSILON {
        // Circle center is closest to v2 and safely outside the polygon
        Some(v2)
    } else {
        None
    };

    if let Some(v) = vertex_region {
        let normal = (c - v).normalize();
        let separation = (c - v).dot(normal);
        if separation - radius > speculative {
            return manifold;
        }

        let c_a = Vec2::mul_add(v, radius_a, normal);
        let c_b = Vec2::mul_sub(c, radius_b, normal);
        manifold.normal = normal;
        manifold.push(local_point(Vec2::lerp(c_a, c_b, 0.5), (c_b - c_a).dot(normal), 0));
    } else {
        // Circle center is between v1 and v2. Center may be inside polygon
        let normal = normals[normal_index];
        manifold.normal = normal;

        // c_a is the projection of the circle center onto to the reference edge
        let c_a = Vec2::mul_add(c, radius_a - (c - v1).dot(normal), normal);

        // c_b is the deepest point on the circle with respect to the reference edge
        let c_b = Vec2::mul_sub(c, radius_b, normal);

        // The contact point is the midpoint in world space
        manifold.push(local_point(Vec2::lerp(c_a, c_b, 0.5), separation - radius, 0));
    }

    to_world(manifold, xf_a, xf_b, Vec2::ZERO)
}

/// Compute the contact manifold between two capsules. Parallel overlapping
/// capsules produce two clipped points, otherwise the closest features
/// produce one.
pub fn collide_capsules(capsule_a: &Capsule, xf_a: Transform, capsule_b: &Capsule, xf_b: Transform) -> Manifold {
    let origin = capsule_a.center1;

    // Shift polyA to origin, polyB relative
    let sf_a = Transform::new(xf_a.p + xf_a.q.rotate(origin), xf_a.q);
    let xf = sf_a.inv_mul(xf_b);

    // local vertices
    let p1 = Vec2::ZERO;
    let q1 = capsule_a.center2 - origin;

    // put capsule B in capsule A's frame
    let p2 = xf.apply(capsule_b.center1);
    let q2 = xf.apply(capsule_b.center2);

    let result = segment_distance(p1, q1, p2, q2);

    let radius_a = capsule_a.radius;
    let radius_b = capsule_b.radius;
    let max_distance = radius_a + radius_b + speculative_distance();
    if result.distance_squared > max_distance * max_distance {
        return Manifold::default();
    }

    let distance = result.distance_squared.sqrt();

    let (length1, u1) = (q1 - p1).length_and_normalize();
    let (length2, u2) = (q2 - p2).length_and_normalize();

    // endpoint regions
    let fp2 = (p2 - p1).dot(u1);
    let fq2 = (q2 - p1).dot(u1);
    let outside_a = (fp2 <= 0.0 && fq2 <= 0.0) || (fp2 >= length1 && fq2 >= length1);

    let fp1 = (p1 - p2).dot(u2);
    let fq1 = (q1 - p2).dot(u2);
    let outside_b = (fp1 <= 0.0 && fq1 <= 0.0) || (fp1 >= length2 && fq1 >= length2);

    let mut manifold = Manifold::default();

    let parallel = u1.cross(u2).abs() < 0.05;
    if !outside_a && !outside_b && length1 > 0.0 && length2 > 0.0 && parallel {
        // attempt to clip
        // project segment B onto segment A
        let v_lower = if fp2 < 0.0 && fq2 - fp2 > f32::EPSILON {
            Vec2::lerp(p2, q2, (0.0 - fp2) / (fq2 - fp2))
        } else if fq2 < 0.0 && fp2 - fq2 > f32::EPSILON {
            Vec2::lerp(q2, p2, (0.0 - fq2) / (fp2 - fq2))
        } else if fp2 < fq2 {
            p2
        } else {
            q2
        };

        let v_upper = if fp2 > length1 && fp2 - fq2 > f32::EPSILON {
            Vec2::lerp(p2, q2, (fp2 - length1) / (fp2 - fq2))
        } else if fq2 > length1 && fq2 - fp2 > f32::EPSILON {
            Vec2::lerp(q2, p2, (fq2 - length1) / (fq2 - fp2))
        } else if fp2 < fq2 {
            q2
        } else {
            p2
        };

        // segment A normal pointing towards B
        let mut normal = u1.left_perp();
        if (result.closest2 - result.closest1).dot(normal) < 0.0 {
            normal = -normal;
        }

        let separation_lower = (v_lower - p1).dot(normal);
        let separation_upper = (v_upper - p1).dot(normal);

        // put contact points at midpoint, accounting for capsule radius
        let v_lower = Vec2::mul_add(v_lower, 0.5 * (radius_a - radius_b - separation_lower), normal);
        let v_upper = Vec2::mul_add(v_upper, 0.5 * (radius_a - radius_b - separation_upper), normal);

        let radius = radius_a + radius_b;

        manifold.normal = normal;
        manifold.push(local_point(v_lower, separation_lower - radius, make_feature_id(0, 0)));
        manifold.push(local_point(v_upper, separation_upper - radius, make_feature_id(1, 0)));
    } else {
        // closest features
        let mut normal = (result.closest2 - result.closest1).normalize();
        if distance == 0.0 || normal == Vec2::ZERO {
            normal = u1.left_perp();
            if normal == Vec2::ZERO {
                normal = Vec2::Y;
            }
        }

        let c_a = Vec2::mul_add(result.closest1, radius_a, normal);
        let c_b = Vec2::mul_add(result.closest2, -radius_b, normal);

        let i1 = if result.fraction1 < 0.5 { 0 } else { 1 };
        let i2 = if result.fraction2 < 0.5 { 0 } else { 1 };

        manifold.normal = normal;
        manifold.push(local_point(
            Vec2::lerp(c_a, c_b, 0.5),
            distance - (radius_a + radius_b),
            make_feature_id(i1, i2),
        ));
    }

    to_world(manifold, xf_a, xf_b, origin)
}

/// Compute the contact manifold between a segment and a capsule.
pub fn collide_segment_and_capsule(segment_a: &Segment, xf_a: Transform, capsule_b: &Capsule, xf_b: Transform) -> Manifold {
    let capsule_a = Capsule::new(segment_a.point1, segment_a.point2, 0.0);
    collide_capsules(&capsule_a, xf_a, capsule_b, xf_b)
}

/// Compute the contact manifold between a segment and a circle.
pub fn collide_segment_and_circle(segment_a: &Segment, xf_a: Transform, circle_b: &Circle, xf_b: Transform) -> Manifold {
    let capsule_a = Capsule::new(segment_a.point1, segment_a.point2, 0.0);
    collide_capsule_and_circle(&capsule_a, xf_a, circle_b, xf_b)
}

/// Compute the contact manifold between a polygon and a capsule.
pub fn collide_polygon_and_capsule(polygon_a: &Polygon, xf_a: Transform, capsule_b: &Capsule, xf_b: Transform) -> Manifold {
    let polygon_b = make_capsule(capsule_b.center1, capsule_b.center2, capsule_b.radius);
    collide_polygons(polygon_a, xf_a, &polygon_b, xf_b)
}

/// Compute the contact manifold between a segment and a polygon.
pub fn collide_segment_and_polygon(segment_a: &Segment, xf_a: Transform, polygon_b: &Polygon, xf_b: Transform) -> Manifold {
    let polygon_a = make_capsule(segment_a.point1, segment_a.point2, 0.0);
    collide_polygons(&polygon_a, xf_a, polygon_b, xf_b)
}

// Polygon clipper used to compute contact points when there are potentially
// two contact points.
fn clip_polygons(poly_a: &Polygon, poly_b: &Polygon, edge_a: usize, edge_b: usize, flip: bool) -> Manifold {
    let mut manifold = Manifold::default();

    // reference polygon poly1, incident polygon poly2
    let (poly1, poly2, i11, i21) = if flip {
        (poly_b, poly_a, edge_b, edge_a)
    } else {
        (poly_a, poly_b, edge_a, edge_b)
    };
    let i12 = if i11 + 1 < poly1.count { i11 + 1 } else { 0 };
    let i22 = if i21 + 1 < poly2.count { i21 + 1 } else { 0 };

    let normal = poly1.normals[i11];

    // Reference edge vertices
    let v11 = poly1.vertices[i11];
    let v12 = poly1.vertices[i12];

    // Incident edge vertices
    let v21 = poly2.vertices[i21];
    let v22 = poly2.vertices[i22];

    let tangent = Vec2::scalar_cross(1.0, normal);

    let lower1 = 0.0;
    let upper1 = (v12 - v11).dot(tangent);

    // Incident edge points opposite of tangent due to CCW winding
    let upper2 = (v21 - v11).dot(tangent);
    let lower2 = (v22 - v11).dot(tangent);

    let v_lower = if lower2 < lower1 && upper2 - lower2 > f32::EPSILON {
        Vec2::lerp(v22, v21, (lower1 - lower2) / (upper2 - lower2))
    } else {
        v22
    };

    let v_upper = if upper2 > upper1 && upper2 - lower2 > f32::EPSILON {
        Vec2::lerp(v22, v21, (upper1 - lower2) / (upper2 - lower2))
    } else {
        v21
    };

    let separation_lower = (v_lower - v11).dot(normal);
    let separation_upper = (v_upper - v11).dot(normal);

    // put contact points at midpoint, accounting for polygon radius
    let v_lower = Vec2::mul_add(v_lower, 0.5 * (poly1.radius - poly2.radius - separation_lower), normal);
    let v_upper = Vec2::mul_add(v_upper, 0.5 * (poly1.radius - poly2.radius - separation_upper), normal);

    let radius = poly1.radius + poly2.radius;
    let speculative = speculative_distance();

    if !flip {
        manifold.normal = normal;
        if separation_lower - radius <= speculative {
            manifold.push(local_point(v_lower, separation_lower - radius, make_feature_id(i11, i22)));
        }
        if separation_upper - radius <= speculative {
            manifold.push(local_point(v_upper, separation_upper - radius, make_feature_id(i12, i21)));
        }
    } else {
        manifold.normal = -normal;
        if separation_upper - radius <= speculative {
            manifold.push(local_point(v_upper, separation_upper - radius, make_feature_id(i21, i12)));
        }
        if separation_lower - radius <= speculative {
            manifold.push(local_point(v_lower, separation_lower - radius, make_feature_id(i22, i11)));
        }
    }

    manifold
}

// Find the max separation between poly1 and poly2 using edge normals from poly1.
fn find_max_separation(poly1: &Polygon, poly2: &Polygon) -> (usize, f32) {
    let mut best_index = 0;
    let mut max_separation = -f32::MAX;
    for i in 0..poly1.count {
        // Get poly1 normal in frame2.
        let n = poly1.normals[i];
        let v1 = poly1.vertices[i];

        // Find the deepest point for normal i.
        let mut si = f32::MAX;
        for v2 in poly2.vertices() {
            let sij = n.dot(*v2 - v1);
            if sij < si {
                si = sij;
            }
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

fn find_incident_edge(search_direction: Vec2, poly: &Polygon) -> usize {
    let mut edge = 0;
    let mut min_dot = f32::MAX;
    for (i, n) in poly.normals().iter().enumerate() {
        let dot = search_direction.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            edge = i;
        }
    }
    edge
}

/// Compute the contact manifold between two polygons.
///
/// Uses SAT on the edge normals of both polygons. When the polygons are
/// separated the closest reference and incident edges are handled with
/// segment distance so vertex-vertex contacts get a proper normal; otherwise
/// the incident edge is clipped against the reference edge.
pub fn collide_polygons(polygon_a: &Polygon, xf_a: Transform, polygon_b: &Polygon, xf_b: Transform) -> Manifold {
    let origin = polygon_a.vertices[0];

    // Shift polyA to origin
    // pw = q * pb + p
    // pw = q * (pbs + origin) + p
    // pw = q * pbs + (p + q * origin)
    let sf_a = Transform::new(xf_a.p + xf_a.q.rotate(origin), xf_a.q);
    let xf = sf_a.inv_mul(xf_b);

    // Shift polyA to origin, leave it in local coordinates
    let mut local_poly_a = *polygon_a;
    for v in local_poly_a.vertices[..local_poly_a.count].iter_mut() {
        *v = *v - origin;
    }

    // Put polyB in polyA's frame to reduce round-off error
    let mut local_poly_b = *polygon_b;
    for i in 0..local_poly_b.count {
        local_poly_b.vertices[i] = xf.apply(polygon_b.vertices[i]);
        local_poly_b.normals[i] = xf.q.rotate(polygon_b.normals[i]);
    }

    let (mut edge_a, separation_a) = find_max_separation(&local_poly_a, &local_poly_b);
    let (mut edge_b, separation_b) = find_max_separation(&local_poly_b, &local_poly_a);

    let radius = local_poly_a.radius + local_poly_b.radius;
    let speculative = speculative_distance();
    let slop = linear_slop();

    if separation_a > speculative + radius || separation_b > speculative + radius {
        return Manifold::default();
    }

    // Find incident edge
    let flip = if separation_b > separation_a + 0.1 * slop {
        edge_a = find_incident_edge(local_poly_b.normals[edge_b], &local_poly_a);
        true
    } else {
        edge_b = find_incident_edge(local_poly_a.normals[edge_a], &local_poly_b);
        false
    };

    let mut manifold = Manifold::default();

    // Using slop here to ensure vertex-vertex normal vectors can be safely normalized.
    if separation_a.max(separation_b) > 0.1 * slop {
        // find reference edge using SAT
        let i11 = edge_a;
        let i12 = if edge_a + 1 < local_poly_a.count { edge_a + 1 } else { 0 };
        let i21 = edge_b;
        let i22 = if edge_b + 1 < local_poly_b.count { edge_b + 1 } else { 0 };

        let v11 = local_poly_a.vertices[i11];
        let v12 = local_poly_a.vertices[i12];
        let v21 = local_poly_b.vertices[i21];
        let v22 = local_poly_b.vertices[i22];

        let result = segment_distance(v11, v12, v21, v22);

        let vertex_pair = match (result.fraction1 == 0.0, result.fraction1 == 1.0, result.fraction2 == 0.0, result.fraction2 == 1.0) {
            (true, _, true, _) => Some((v11, v21, make_feature_id(i11, i21))),
            (true, _, _, true) => Some((v11, v22, make_feature_id(i11, i22))),
            (_, true, true, _) => Some((v12, v21, make_feature_id(i12, i21))),
            (_, true, _, true) => Some((v12, v22, make_feature_id(i12, i22))),
            _ => None,
        };

        // Parallel edges whose closest points happen to be vertices are
        // still an edge contact
        let reference_normal = if flip {
            -local_poly_b.normals[edge_b]
        } else {
            local_poly_a.normals[edge_a]
        };
        let vertex_pair = vertex_pair.filter(|(v1, v2, _)| (*v2 - *v1).normalize().dot(reference_normal) < 0.999);

        match vertex_pair {
            Some((v1, v2, id)) => {
                // vertex-vertex collision
                let distance = result.distance_squared.sqrt();
                if distance > speculative + radius {
                    return manifold;
                }
                let normal = (v2 - v1).normalize();

                let c1 = Vec2::mul_add(v1, local_poly_a.radius, normal);
                let c2 = Vec2::mul_add(v2, -local_poly_b.radius, normal);

                manifold.normal = normal;
                manifold.push(local_point(Vec2::lerp(c1, c2, 0.5), distance - radius, id));
            }
            None => {
                // Edge region
                manifold = clip_polygons(&local_poly_a, &local_poly_b, edge_a, edge_b, flip);
            }
        }
    } else {
        // Polygons overlap
        manifold = clip_polygons(&local_poly_a, &local_poly_b, edge_a, edge_b, flip);
    }

    to_world(manifold, xf_a, xf_b, origin)
}

/// True if a manifold routine exists for shapes of these types in this
/// order. Callers swap the shapes when only the reverse order exists.
pub fn has_manifold_fn(type_a: ShapeType, type_b: ShapeType) -> bool {
    use ShapeType::*;
    matches!(
        (type_a, type_b),
        (Circle, Circle)
            | (Capsule, Circle)
            | (Capsule, Capsule)
            | (Polygon, Circle)
            | (Polygon, Capsule)
            | (Polygon, Polygon)
            | (Segment, Circle)
            | (Segment, Capsule)
            | (Segment, Polygon)
            | (ChainSegment, Circle)
            | (ChainSegment, Capsule)
            | (ChainSegment, Polygon)
    )
}

/// True if some manifold routine handles this pair in either order.
pub fn shapes_can_collide(type_a: ShapeType, type_b: ShapeType) -> bool {
    has_manifold_fn(type_a, type_b) || has_manifold_fn(type_b, type_a)
}

/// Dispatches to the manifold routine for the pair. Returns an empty
/// manifold for pairs without a routine in this order. The cache is only
/// used by chain segments.
pub fn collide_shapes(
    geometry_a: &ShapeGeometry,
    xf_a: Transform,
    geometry_b: &ShapeGeometry,
    xf_b: Transform,
    cache: &mut SimplexCache,
) -> Manifold {
    use super::chain_manifold::{collide_chain_segment_and_capsule, collide_chain_segment_and_circle, collide_chain_segment_and_polygon};
    use ShapeGeometry as G;

    match (geometry_a, geometry_b) {
        (G::Circle(a), G::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (G::Capsule(a), G::Circle(b)) => collide_capsule_and_circle(a, xf_a, b, xf_b),
        (G::Capsule(a), G::Capsule(b)) => collide_capsules(a, xf_a, b, xf_b),
        (G::Polygon(a), G::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (G::Polygon(a), G::Capsule(b)) => collide_polygon_and_capsule(a, xf_a, b, xf_b),
        (G::Polygon(a), G::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (G::Segment(a), G::Circle(b)) => collide_segment_and_circle(a, xf_a, b, xf_b),
        (G::Segment(a), G::Capsule(b)) => collide_segment_and_capsule(a, xf_a, b, xf_b),
        (G::Segment(a), G::Polygon(b)) => collide_segment_and_polygon(a, xf_a, b, xf_b),
        (G::ChainSegment(a), G::Circle(b)) => collide_chain_segment_and_circle(a, xf_a, b, xf_b),
        (G::ChainSegment(a), G::Capsule(b)) => collide_chain_segment_and_capsule(a, xf_a, b, xf_b, cache),
        (G::ChainSegment(a), G::Polygon(b)) => collide_chain_segment_and_polygon(a, xf_a, b, xf_b, cache),
        _ => Manifold::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;
    use crate::shapes::{make_box, make_rounded_box};
    use approx::assert_relative_eq;

    fn at(x: f32, y: f32) -> Transform {
        Transform::new(Vec2::new(x, y), Rot::IDENTITY)
    }

    #[test]
    fn test_circles_touching_and_apart() {
        let circle = Circle::new(Vec2::ZERO, 0.5);
        let m = collide_circles(&circle, at(0.0, 0.0), &circle, at(0.9, 0.0));
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal.x, 1.0);
        assert_relative_eq!(m.points[0].separation, -0.1, epsilon = 1e-6);
        assert_relative_eq!(m.points[0].point.x, 0.45, epsilon = 1e-6);
        assert_relative_eq!(m.points[0].anchor_b.x, -0.45, epsilon = 1e-6);

        let far = collide_circles(&circle, at(0.0, 0.0), &circle, at(3.0, 0.0));
        assert_eq!(far.point_count, 0);
    }

    #[test]
    fn test_box_resting_on_box_has_two_points() {
        let ground = make_box(5.0, 0.5);
        let b = make_box(0.5, 0.5);
        let m = collide_polygons(&ground, at(0.0, 0.0), &b, at(0.0, 0.99));
        assert_eq!(m.point_count, 2);
        assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-6);
        for p in m.points() {
            assert_relative_eq!(p.separation, -0.01, epsilon = 1e-5);
        }
        assert_ne!(m.points[0].id, m.points[1].id);
    }

    #[test]
    fn test_polygon_feature_ids_are_stable() {
        let ground = make_box(5.0, 0.5);
        let b = make_box(0.5, 0.5);
        let m1 = collide_polygons(&ground, at(0.0, 0.0), &b, at(0.0, 0.99));
        let m2 = collide_polygons(&ground, at(0.0, 0.0), &b, at(0.01, 0.985));
        assert_eq!(m1.points[0].id, m2.points[0].id);
        assert_eq!(m1.points[1].id, m2.points[1].id);
    }

    #[test]
    fn test_rounded_polygons_include_radius() {
        let a = make_rounded_box(0.5, 0.5, 0.1);
        let m = collide_polygons(&a, at(0.0, 0.0), &a, at(1.15, 0.0));
        assert_eq!(m.point_count, 2);
        for p in m.points() {
            assert_relative_eq!(p.separation, -0.05, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_polygon_and_circle_regions() {
        let b = make_box(0.5, 0.5);
        let circle = Circle::new(Vec2::ZERO, 0.5);

        // face region
        let m = collide_polygon_and_circle(&b, at(0.0, 0.0), &circle, at(0.0, 0.95));
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(m.points[0].separation, -0.05, epsilon = 1e-6);

        // vertex region
        let m = collide_polygon_and_circle(&b, at(0.0, 0.0), &circle, at(0.8, 0.8));
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal.x, m.normal.y, epsilon = 1e-6);
    }

    #[test]
    fn test_parallel_capsules_clip_two_points() {
        let capsule = Capsule::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.25);
        let m = collide_capsules(&capsule, at(0.0, 0.0), &capsule, at(0.5, 0.45));
        assert_eq!(m.point_count, 2);
        assert_relative_eq!(m.normal.y, 1.0, epsilon = 1e-5);
        for p in m.points() {
            assert_relative_eq!(p.separation, -0.05, epsilon = 1e-5);
        }

        let crossed = Capsule::new(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0), 0.25);
        let m = collide_capsules(&capsule, at(0.0, 0.0), &crossed, at(1.4, 0.0));
        assert_eq!(m.point_count, 1);
        assert_relative_eq!(m.normal.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_dispatch_rejects_unsupported_pairs() {
        let segment: ShapeGeometry = Segment::new(Vec2::ZERO, Vec2::X).into();
        let mut cache = SimplexCache::default();
        let m = collide_shapes(&segment, at(0.0, 0.0), &segment, at(0.0, 0.0), &mut cache);
        assert_eq!(m.point_count, 0);
        assert!(!shapes_can_collide(ShapeType::Segment, ShapeType::Segment));
        assert!(shapes_can_collide(ShapeType::Circle, ShapeType::Polygon));
        assert!(!has_manifold_fn(ShapeType::Circle, ShapeType::Polygon));
    }
}
