//! World queries: overlap tests, ray and shape casts, character mover
//! support and explosions.
//!
//! Queries walk the three broad-phase trees. Sensor shapes are never
//! reported.

use super::def::{ExplosionDef, RayResult};
use super::physics_world::PhysicsWorld;
use crate::collision::aabb::AABB;
use crate::collision::cast::{RayCastInput, ShapeCastInput};
use crate::collision::distance::{make_proxy, shape_distance, DistanceInput, ShapeProxy, SimplexCache};
use crate::collision::dynamic_tree::TreeStats;
use crate::collision::mover::{collide_mover, PlaneResult};
use crate::common::constants::linear_slop;
use crate::common::{PhysicsError, QueryFilter, Result, ShapeId};
use crate::math::{Transform, Vec2};
use crate::objects::{BodyType, Shape};
use crate::shapes::Capsule;

/// Bounds of a proxy in world space.
fn proxy_bounds(proxy: &ShapeProxy) -> AABB {
    let points = proxy.points();
    let mut min = points[0];
    let mut max = points[0];
    for &p in &points[1..] {
        min = min.min(p);
        max = max.max(p);
    }
    let r = Vec2::new(proxy.radius, proxy.radius);
    AABB::new(min - r, max + r)
}

/// Expresses a world space proxy in the frame of `transform`.
fn local_proxy(proxy: &ShapeProxy, transform: Transform) -> ShapeProxy {
    let mut local = [Vec2::ZERO; 8];
    let count = proxy.count;
    for (dst, &src) in local.iter_mut().zip(proxy.points()) {
        *dst = transform.apply_inverse(src);
    }
    make_proxy(&local[..count], proxy.radius)
}

impl PhysicsWorld {
    fn query_accepts(shape: &Shape, filter: &QueryFilter) -> bool {
        !shape.is_sensor && filter.accepts(&shape.filter)
    }

    /// Reports every shape whose fat bounds overlap `aabb`. Return false
    /// from the callback to stop.
    pub fn overlap_aabb(
        &self,
        aabb: AABB,
        filter: QueryFilter,
        mut callback: impl FnMut(ShapeId) -> bool,
    ) -> TreeStats {
        let mut stats = TreeStats::default();
        if !aabb.is_valid() {
            return stats;
        }
        let world0 = self.world0();
        let mut proceed = true;
        for tree in self.broad_phase.trees() {
            stats += tree.query(aabb, filter.mask_bits, |_, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return true;
                };
                if !Self::query_accepts(shape, &filter) {
                    return true;
                }
                proceed = callback(ShapeId::new(shape_index, world0, shape.generation));
                proceed
            });
            if !proceed {
                break;
            }
        }
        stats
    }

    /// Reports every shape overlapping a world space proxy.
    pub fn overlap_shape(
        &self,
        proxy: &ShapeProxy,
        filter: QueryFilter,
        mut callback: impl FnMut(ShapeId) -> bool,
    ) -> TreeStats {
        let mut stats = TreeStats::default();
        if proxy.count == 0 {
            return stats;
        }
        let aabb = proxy_bounds(proxy);
        let world0 = self.world0();
        let tolerance = 0.1 * linear_slop();
        let mut proceed = true;

        for tree in self.broad_phase.trees() {
            stats += tree.query(aabb, filter.mask_bits, |_, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return true;
                };
                if !Self::query_accepts(shape, &filter) {
                    return true;
                }
                let input = DistanceInput {
                    proxy_a: shape.geometry.make_proxy(),
                    proxy_b: *proxy,
                    transform_a: self.bodies[shape.body].transform,
                    transform_b: Transform::IDENTITY,
                    use_radii: true,
                };
                let mut cache = SimplexCache::default();
                let output = shape_distance(&input, &mut cache, None);
                if output.distance > tolerance {
                    return true;
                }
                proceed = callback(ShapeId::new(shape_index, world0, shape.generation));
                proceed
            });
            if !proceed {
                break;
            }
        }
        stats
    }

    /// Casts a ray and reports hits as `(shape, point, normal, fraction)`.
    /// The callback controls the cast through its return value: -1 ignores
    /// the shape, 0 stops, a fraction clips the ray and 1 continues.
    pub fn cast_ray(
        &self,
        origin: Vec2,
        translation: Vec2,
        filter: QueryFilter,
        mut callback: impl FnMut(ShapeId, Vec2, Vec2, f32) -> f32,
    ) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut input = RayCastInput::new(origin, translation);
        if !input.is_valid() {
            return stats;
        }
        let world0 = self.world0();
        let mut fraction = input.max_fraction;

        for tree in self.broad_phase.trees() {
            stats += tree.ray_cast(&input, filter.mask_bits, |sub_input, _, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return -1.0;
                };
                if !Self::query_accepts(shape, &filter) {
                    return -1.0;
                }
                let transform = self.bodies[shape.body].transform;
                let local_input = RayCastInput {
                    origin: transform.apply_inverse(sub_input.origin),
                    translation: transform.q.inv_rotate(sub_input.translation),
                    max_fraction: sub_input.max_fraction,
                };
                let output = shape.geometry.ray_cast(&local_input);
                if !output.hit {
                    return sub_input.max_fraction;
                }

                let id = ShapeId::new(shape_index, world0, shape.generation);
                let value = callback(
                    id,
                    transform.apply(output.point),
                    transform.q.rotate(output.normal),
                    output.fraction,
                );
                if (0.0..=1.0).contains(&value) {
                    fraction = value;
                }
                value
            });

            if fraction == 0.0 {
                break;
            }
            input.max_fraction = fraction;
        }
        stats
    }

    /// Closest hit along a ray.
    pub fn cast_ray_closest(&self, origin: Vec2, translation: Vec2, filter: QueryFilter) -> RayResult {
        let mut result = RayResult::default();
        let stats = self.cast_ray(origin, translation, filter, |shape_id, point, normal, fraction| {
            result.shape_id = shape_id;
            result.point = point;
            result.normal = normal;
            result.fraction = fraction;
            result.hit = true;
            fraction
        });
        result.node_visits = stats.node_visits;
        result.leaf_visits = stats.leaf_visits;
        result
    }

    /// Sweeps a world space proxy along `translation`. The callback works
    /// like the one of [`PhysicsWorld::cast_ray`].
    pub fn cast_shape(
        &self,
        proxy: &ShapeProxy,
        translation: Vec2,
        filter: QueryFilter,
        mut callback: impl FnMut(ShapeId, Vec2, Vec2, f32) -> f32,
    ) -> TreeStats {
        let mut stats = TreeStats::default();
        if proxy.count == 0 || !translation.is_valid() {
            return stats;
        }
        let mut input = ShapeCastInput {
            proxy: *proxy,
            translation,
            max_fraction: 1.0,
            can_encroach: false,
        };
        let world0 = self.world0();
        let mut fraction = input.max_fraction;

        for tree in self.broad_phase.trees() {
            stats += tree.shape_cast(&input, filter.mask_bits, |sub_input, _, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return -1.0;
                };
                if !Self::query_accepts(shape, &filter) {
                    return -1.0;
                }
                let transform = self.bodies[shape.body].transform;
                let local_input = ShapeCastInput {
                    proxy: local_proxy(&sub_input.proxy, transform),
                    translation: transform.q.inv_rotate(sub_input.translation),
                    max_fraction: sub_input.max_fraction,
                    can_encroach: sub_input.can_encroach,
                };
                let output = shape.geometry.shape_cast(&local_input);
                if !output.hit {
                    return sub_input.max_fraction;
                }

                let id = ShapeId::new(shape_index, world0, shape.generation);
                let value = callback(
                    id,
                    transform.apply(output.point),
                    transform.q.rotate(output.normal),
                    output.fraction,
                );
                if (0.0..=1.0).contains(&value) {
                    fraction = value;
                }
                value
            });

            if fraction == 0.0 {
                break;
            }
            input.max_fraction = fraction;
        }
        stats
    }

    /// Fraction of `translation` a capsule can move before hitting a shape.
    /// Shapes the mover already overlaps are ignored so it can slide out.
    pub fn cast_mover(&self, mover: &Capsule, translation: Vec2, filter: QueryFilter) -> f32 {
        if !translation.is_valid() {
            return 1.0;
        }
        let mut input = ShapeCastInput {
            proxy: make_proxy(&[mover.center1, mover.center2], mover.radius),
            translation,
            max_fraction: 1.0,
            can_encroach: true,
        };
        let mut fraction = 1.0;

        for tree in self.broad_phase.trees() {
            tree.shape_cast(&input, filter.mask_bits, |sub_input, _, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return -1.0;
                };
                if !Self::query_accepts(shape, &filter) {
                    return -1.0;
                }
                let transform = self.bodies[shape.body].transform;
                let local_input = ShapeCastInput {
                    proxy: local_proxy(&sub_input.proxy, transform),
                    translation: transform.q.inv_rotate(sub_input.translation),
                    max_fraction: sub_input.max_fraction,
                    can_encroach: true,
                };
                let output = shape.geometry.shape_cast(&local_input);
                if !output.hit || output.fraction == 0.0 {
                    return fraction;
                }
                fraction = output.fraction;
                output.fraction
            });

            if fraction == 0.0 {
                break;
            }
            input.max_fraction = fraction;
        }
        fraction
    }

    /// Reports the collision plane of every shape the mover touches.
    /// Return false from the callback to stop.
    pub fn collide_mover(
        &self,
        mover: &Capsule,
        filter: QueryFilter,
        mut callback: impl FnMut(ShapeId, &PlaneResult) -> bool,
    ) {
        let r = Vec2::new(mover.radius, mover.radius);
        let aabb = AABB::new(mover.center1.min(mover.center2) - r, mover.center1.max(mover.center2) + r);
        let world0 = self.world0();
        let mut proceed = true;

        for tree in self.broad_phase.trees() {
            tree.query(aabb, filter.mask_bits, |_, user_data| {
                let shape_index = user_data as usize;
                let Some(shape) = self.shapes.get(shape_index) else {
                    return true;
                };
                if !Self::query_accepts(shape, &filter) {
                    return true;
                }
                let transform = self.bodies[shape.body].transform;
                let result = collide_mover(&shape.geometry, transform, mover);
                if !result.hit {
                    return true;
                }
                proceed = callback(ShapeId::new(shape_index, world0, shape.generation), &result);
                proceed
            });
            if !proceed {
                break;
            }
        }
    }

    /// Applies a radial impulse to the dynamic shapes around a point. The
    /// impulse scales with the shape width facing the explosion and fades
    /// to zero over the falloff distance.
    pub fn explode(&mut self, def: &ExplosionDef) -> Result<()> {
        if !def.position.is_valid()
            || !(def.radius >= 0.0)
            || !(def.falloff >= 0.0)
            || !def.impulse_per_length.is_finite()
        {
            return Err(PhysicsError::InvalidDefinition("explosion"));
        }

        let reach = def.radius + def.falloff;
        let aabb = AABB::new(
            def.position - Vec2::new(reach, reach),
            def.position + Vec2::new(reach, reach),
        );

        let mut candidates = Vec::new();
        self.broad_phase
            .tree(BodyType::Dynamic)
            .query(aabb, def.mask_bits, |_, user_data| {
                candidates.push(user_data as usize);
                true
            });

        let point_proxy = make_proxy(&[def.position], 0.0);
        for shape_index in candidates {
            let Some(shape) = self.shapes.get(shape_index) else {
                continue;
            };
            if shape.is_sensor {
                continue;
            }
            let body_index = shape.body;
            let transform = self.bodies[body_index].transform;
            let input = DistanceInput {
                proxy_a: shape.geometry.make_proxy(),
                proxy_b: point_proxy,
                transform_a: transform,
                transform_b: Transform::IDENTITY,
                use_radii: true,
            };
            let mut cache = SimplexCache::default();
            let output = shape_distance(&input, &mut cache, None);
            if output.distance > reach {
                continue;
            }

            self.wake_body(body_index);
            if !self.bodies[body_index].awake {
                continue;
            }

            let shape = &self.shapes[shape_index];
            let closest = if output.distance == 0.0 {
                transform.apply(shape.geometry.centroid())
            } else {
                output.point_a
            };
            let offset = closest - def.position;
            let direction = if offset.length_squared() > 100.0 * f32::EPSILON * f32::EPSILON {
                offset.normalize()
            } else {
                Vec2::X
            };

            let local_line = transform.q.inv_rotate(direction.left_perp());
            let perimeter = shape.geometry.projected_perimeter(local_line);
            let scale = if output.distance > def.radius && def.falloff > 0.0 {
                ((reach - output.distance) / def.falloff).clamp(0.0, 1.0)
            } else {
                1.0
            };
            let impulse = (def.impulse_per_length * perimeter * scale) * direction;

            let body = &mut self.bodies[body_index];
            body.linear_velocity = Vec2::mul_add(body.linear_velocity, body.inv_mass, impulse);
            body.angular_velocity += body.inv_inertia * (closest - body.center).cross(impulse);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BodyDef, ShapeDef};
    use crate::shapes::{make_box, Circle};
    use crate::world::WorldDef;
    use approx::assert_relative_eq;

    fn world_with_boxes() -> (PhysicsWorld, Vec<ShapeId>) {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");
        let mut shapes = Vec::new();
        for i in 0..4 {
            let body = world
                .create_body(&BodyDef {
                    position: Vec2::new(3.0 * i as f32, 0.0),
                    ..Default::default()
                })
                .expect("body");
            shapes.push(
                world
                    .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
                    .expect("shape"),
            );
        }
        (world, shapes)
    }

    #[test]
    fn test_overlap_aabb_reports_boxes() {
        let (world, shapes) = world_with_boxes();
        let mut found = Vec::new();
        world.overlap_aabb(
            AABB::new(Vec2::new(-1.0, -1.0), Vec2::new(4.0, 1.0)),
            QueryFilter::default(),
            |id| {
                found.push(id);
                true
            },
        );
        found.sort();
        assert_eq!(found, vec![shapes[0], shapes[1]]);
    }

    #[test]
    fn test_overlap_shape_uses_exact_distance() {
        let (world, shapes) = world_with_boxes();
        let mut found = Vec::new();
        let touching = make_proxy(&[Vec2::new(0.9, 0.0)], 0.5);
        world.overlap_shape(&touching, QueryFilter::default(), |id| {
            found.push(id);
            true
        });
        assert_eq!(found, vec![shapes[0]]);

        // Inside the fat bounds of the first box but 0.01 clear of its edge.
        found.clear();
        let near = make_proxy(&[Vec2::new(1.01, 0.0)], 0.5);
        world.overlap_shape(&near, QueryFilter::default(), |id| {
            found.push(id);
            true
        });
        assert!(found.is_empty());

        let far = make_proxy(&[Vec2::new(1.4, 0.0)], 0.5);
        world.overlap_shape(&far, QueryFilter::default(), |id| {
            found.push(id);
            true
        });
        assert!(found.is_empty());

        let gap = make_proxy(&[Vec2::new(1.5, 1.5)], 0.1);
        world.overlap_shape(&gap, QueryFilter::default(), |id| {
            found.push(id);
            true
        });
        assert!(found.is_empty());
    }

    #[test]
    fn test_closest_ray_hit() {
        let (world, shapes) = world_with_boxes();
        let result = world.cast_ray_closest(Vec2::new(-5.0, 0.0), Vec2::new(20.0, 0.0), QueryFilter::default());
        assert!(result.hit);
        assert_eq!(result.shape_id, shapes[0]);
        assert_relative_eq!(result.point.x, -0.5, epsilon = 1e-4);
        assert_relative_eq!(result.normal.x, -1.0, epsilon = 1e-4);
        assert_relative_eq!(result.fraction, 0.225, epsilon = 1e-4);

        let miss = world.cast_ray_closest(Vec2::new(-5.0, 3.0), Vec2::new(20.0, 0.0), QueryFilter::default());
        assert!(!miss.hit);
    }

    #[test]
    fn test_ray_cast_all_hits() {
        let (world, _) = world_with_boxes();
        let mut count = 0;
        world.cast_ray(
            Vec2::new(-5.0, 0.0),
            Vec2::new(20.0, 0.0),
            QueryFilter::default(),
            |_, _, _, _| {
                count += 1;
                1.0
            },
        );
        assert_eq!(count, 4);
    }

    #[test]
    fn test_query_filter_excludes_categories() {
        let (world, _) = world_with_boxes();
        let filter = QueryFilter {
            category_bits: 1,
            mask_bits: 0x2,
        };
        let result = world.cast_ray_closest(Vec2::new(-5.0, 0.0), Vec2::new(20.0, 0.0), filter);
        assert!(!result.hit);
    }

    #[test]
    fn test_cast_mover_stops_before_wall() {
        let (world, _) = world_with_boxes();
        let mover = Capsule::new(Vec2::new(-3.0, -0.25), Vec2::new(-3.0, 0.25), 0.25);
        let fraction = world.cast_mover(&mover, Vec2::new(4.0, 0.0), QueryFilter::default());
        // The wall face is at x = -0.5 and the mover reaches it after 2.25.
        assert!(fraction > 0.5 && fraction < 0.57, "fraction {fraction}");

        let mut planes = 0;
        let touching = Capsule::new(Vec2::new(-0.6, -0.25), Vec2::new(-0.6, 0.25), 0.25);
        world.collide_mover(&touching, QueryFilter::default(), |_, result| {
            assert!(result.plane.normal.x < 0.0);
            planes += 1;
            true
        });
        assert_eq!(planes, 1);
    }

    #[test]
    fn test_explosion_pushes_bodies_away() {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");
        let near = world
            .create_body(&BodyDef {
                position: Vec2::new(2.0, 0.0),
                ..BodyDef::dynamic()
            })
            .expect("near");
        world
            .create_shape(near, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape");
        let far = world
            .create_body(&BodyDef {
                position: Vec2::new(20.0, 0.0),
                ..BodyDef::dynamic()
            })
            .expect("far");
        world
            .create_shape(far, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape");

        world
            .explode(&ExplosionDef {
                position: Vec2::ZERO,
                radius: 3.0,
                falloff: 1.0,
                impulse_per_length: 2.0,
                ..Default::default()
            })
            .expect("explode");

        let v = world.body_linear_velocity(near).expect("v");
        assert!(v.x > 0.0);
        assert_relative_eq!(v.y, 0.0, epsilon = 1e-5);
        assert_eq!(world.body_linear_velocity(far).expect("v"), Vec2::ZERO);
    }
}
