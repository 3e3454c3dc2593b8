//! C foreign function interface.
//!
//! A small C-callable surface over [`PhysicsWorld`]: world lifecycle and
//! stepping, body and shape creation, and body transform getters. Worlds
//! are handed out as opaque pointers that stay stable until
//! `rigid2d_world_destroy`. Failed calls return null pointers, null ids or
//! `false`; panics never cross the boundary.
//!
//! # Safety
//!
//! Functions taking a world pointer require a pointer returned by
//! `rigid2d_world_create` that has not been destroyed, or null.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::common::{version, BodyId, ShapeId, Version, WorldId};
use crate::math::{Rot, Transform, Vec2};
use crate::objects::{BodyDef, BodyType, ShapeDef};
use crate::shapes::{compute_hull, make_box, make_polygon, Circle, ShapeGeometry};
use crate::world::{world_is_valid, PhysicsWorld, WorldDef};

/// Shape parameters shared by the shape constructors.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Rigid2dShapeParams {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Non-zero to make the shape a sensor.
    pub is_sensor: u8,
}

impl Rigid2dShapeParams {
    fn to_def(self) -> ShapeDef {
        let mut def = ShapeDef {
            density: self.density,
            is_sensor: self.is_sensor != 0,
            ..Default::default()
        };
        def.material.friction = self.friction;
        def.material.restitution = self.restitution;
        def
    }
}

// World lifecycle

#[no_mangle]
pub extern "C" fn rigid2d_version() -> Version {
    version()
}

/// Creates a world with default settings and the given gravity. Returns
/// null when no world slot is free.
#[no_mangle]
pub extern "C" fn rigid2d_world_create(gravity: Vec2) -> *mut PhysicsWorld {
    let def = WorldDef {
        gravity,
        ..Default::default()
    };
    match PhysicsWorld::new(&def) {
        Ok(world) => Box::into_raw(Box::new(world)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `world` must come from `rigid2d_world_create` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_world_destroy(world: *mut PhysicsWorld) {
    if !world.is_null() {
        drop(Box::from_raw(world));
    }
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_world_id(world: *const PhysicsWorld) -> WorldId {
    world.as_ref().map_or(WorldId::NULL, PhysicsWorld::id)
}

#[no_mangle]
pub extern "C" fn rigid2d_world_is_valid(id: WorldId) -> bool {
    world_is_valid(id)
}

/// Advances the world. Returns false for a null world or if the step
/// panicked.
///
/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_world_step(world: *mut PhysicsWorld, time_step: f32, sub_step_count: i32) -> bool {
    let Some(world) = world.as_mut() else {
        return false;
    };
    let sub_steps = sub_step_count.max(1) as usize;
    catch_unwind(AssertUnwindSafe(|| world.step(time_step, sub_steps))).is_ok()
}

// Bodies

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_create(
    world: *mut PhysicsWorld,
    body_type: BodyType,
    position: Vec2,
    angle: f32,
) -> BodyId {
    let Some(world) = world.as_mut() else {
        return BodyId::NULL;
    };
    let def = BodyDef {
        body_type,
        position,
        rotation: Rot::from_angle(angle),
        ..Default::default()
    };
    world.create_body(&def).unwrap_or(BodyId::NULL)
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_destroy(world: *mut PhysicsWorld, body: BodyId) -> bool {
    world.as_mut().is_some_and(|w| w.destroy_body(body).is_ok())
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_is_valid(world: *const PhysicsWorld, body: BodyId) -> bool {
    world.as_ref().is_some_and(|w| w.body_is_valid(body))
}

/// Origin of the body. Zero for invalid handles.
///
/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_get_position(world: *const PhysicsWorld, body: BodyId) -> Vec2 {
    world
        .as_ref()
        .and_then(|w| w.body_position(body).ok())
        .unwrap_or(Vec2::ZERO)
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_get_rotation(world: *const PhysicsWorld, body: BodyId) -> Rot {
    world
        .as_ref()
        .and_then(|w| w.body_rotation(body).ok())
        .unwrap_or(Rot::IDENTITY)
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_body_get_transform(world: *const PhysicsWorld, body: BodyId) -> Transform {
    world
        .as_ref()
        .and_then(|w| w.body_transform(body).ok())
        .unwrap_or(Transform::IDENTITY)
}

// Shapes

unsafe fn create_shape(
    world: *mut PhysicsWorld,
    body: BodyId,
    params: Rigid2dShapeParams,
    geometry: ShapeGeometry,
) -> ShapeId {
    let Some(world) = world.as_mut() else {
        return ShapeId::NULL;
    };
    world
        .create_shape(body, &params.to_def(), geometry)
        .unwrap_or(ShapeId::NULL)
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_shape_create_circle(
    world: *mut PhysicsWorld,
    body: BodyId,
    params: Rigid2dShapeParams,
    center: Vec2,
    radius: f32,
) -> ShapeId {
    create_shape(world, body, params, Circle::new(center, radius).into())
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_shape_create_box(
    world: *mut PhysicsWorld,
    body: BodyId,
    params: Rigid2dShapeParams,
    half_width: f32,
    half_height: f32,
) -> ShapeId {
    if !(half_width > 0.0 && half_height > 0.0) {
        return ShapeId::NULL;
    }
    create_shape(world, body, params, make_box(half_width, half_height).into())
}

/// Creates a convex polygon from the hull of `count` points.
///
/// # Safety
/// `points` must point to `count` readable `Vec2` values. See also the
/// module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_shape_create_polygon(
    world: *mut PhysicsWorld,
    body: BodyId,
    params: Rigid2dShapeParams,
    points: *const Vec2,
    count: i32,
    radius: f32,
) -> ShapeId {
    if points.is_null() || count < 3 {
        return ShapeId::NULL;
    }
    let points = std::slice::from_raw_parts(points, count as usize);
    let hull = compute_hull(points);
    if hull.count == 0 {
        return ShapeId::NULL;
    }
    create_shape(world, body, params, make_polygon(&hull, radius).into())
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_shape_destroy(world: *mut PhysicsWorld, shape: ShapeId, update_body_mass: bool) -> bool {
    world
        .as_mut()
        .is_some_and(|w| w.destroy_shape(shape, update_body_mass).is_ok())
}

/// # Safety
/// See the module documentation.
#[no_mangle]
pub unsafe extern "C" fn rigid2d_shape_is_valid(world: *const PhysicsWorld, shape: ShapeId) -> bool {
    world.as_ref().is_some_and(|w| w.shape_is_valid(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> Rigid2dShapeParams {
        Rigid2dShapeParams {
            density: 1.0,
            friction: 0.6,
            restitution: 0.0,
            is_sensor: 0,
        }
    }

    #[test]
    fn test_ffi_round_trip() {
        unsafe {
            let world = rigid2d_world_create(Vec2::new(0.0, -10.0));
            assert!(!world.is_null());
            let id = rigid2d_world_id(world);
            assert!(rigid2d_world_is_valid(id));

            let ground = rigid2d_body_create(world, BodyType::Static, Vec2::ZERO, 0.0);
            assert!(!rigid2d_shape_create_box(world, ground, params(), 10.0, 0.5).is_null());

            let body = rigid2d_body_create(world, BodyType::Dynamic, Vec2::new(0.0, 3.0), 0.0);
            let square = [
                Vec2::new(-0.5, -0.5),
                Vec2::new(0.5, -0.5),
                Vec2::new(0.5, 0.5),
                Vec2::new(-0.5, 0.5),
            ];
            let shape = rigid2d_shape_create_polygon(world, body, params(), square.as_ptr(), 4, 0.0);
            assert!(rigid2d_shape_is_valid(world, shape));

            for _ in 0..120 {
                assert!(rigid2d_world_step(world, 1.0 / 60.0, 4));
            }
            let position = rigid2d_body_get_position(world, body);
            assert_relative_eq!(position.y, 1.0, epsilon = 0.02);
            assert_eq!(rigid2d_body_get_transform(world, body).p, position);

            assert!(rigid2d_body_destroy(world, body));
            assert!(!rigid2d_body_is_valid(world, body));
            assert!(!rigid2d_shape_is_valid(world, shape));

            rigid2d_world_destroy(world);
            assert!(!rigid2d_world_is_valid(id));
        }
    }

    #[test]
    fn test_null_world_is_harmless() {
        unsafe {
            let world = std::ptr::null_mut();
            assert!(!rigid2d_world_step(world, 1.0 / 60.0, 4));
            assert!(rigid2d_body_create(world, BodyType::Dynamic, Vec2::ZERO, 0.0).is_null());
            assert_eq!(rigid2d_body_get_position(world, BodyId::NULL), Vec2::ZERO);
            assert!(rigid2d_shape_create_circle(world, BodyId::NULL, params(), Vec2::ZERO, 1.0).is_null());
        }
    }
}
