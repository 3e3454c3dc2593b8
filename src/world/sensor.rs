//! Sensor overlap tracking.
//!
//! Sensors do not create contacts. At the end of each step every sensor
//! queries the broad-phase with its bounds, keeps the visitors it really
//! overlaps and reports the difference to the previous step as begin and
//! end events.

use super::events::{SensorBeginTouchEvent, SensorEndTouchEvent};
use super::physics_world::PhysicsWorld;
use crate::collision::distance::{shape_distance, DistanceInput, SimplexCache};
use crate::common::constants::{linear_slop, DEFAULT_MASK_BITS};
use crate::common::ShapeId;
use crate::objects::BodyType;

/// A sensor shape and the shapes overlapping it after the last step,
/// sorted by shape id.
#[derive(Debug, Clone, Default)]
pub(crate) struct Sensor {
    pub shape: usize,
    pub overlaps: Vec<ShapeId>,
}

fn sort_key(id: &ShapeId) -> (i32, u16) {
    (id.index1, id.generation)
}

impl PhysicsWorld {
    /// Registers a sensor shape.
    pub(crate) fn create_sensor(&mut self, shape_index: usize) {
        let (sensor_index, _) = self.sensors.insert(Sensor {
            shape: shape_index,
            overlaps: Vec::new(),
        });
        self.shapes[shape_index].sensor_index = Some(sensor_index);
    }

    /// Unregisters a sensor shape, reporting the end of its overlaps.
    pub(crate) fn destroy_sensor(&mut self, shape_index: usize) {
        let Some(sensor_index) = self.shapes[shape_index].sensor_index.take() else {
            return;
        };
        let Some(sensor) = self.sensors.remove(sensor_index) else {
            return;
        };
        let sensor_shape_id = self.shape_id(shape_index);
        for visitor_shape_id in sensor.overlaps {
            self.events.push_sensor_end(SensorEndTouchEvent {
                sensor_shape_id,
                visitor_shape_id,
            });
        }
    }

    /// Removes a destroyed visitor from every sensor, reporting the end of
    /// each overlap it had.
    pub(crate) fn remove_sensor_visitor(&mut self, shape_index: usize) {
        let visitor_shape_id = self.shape_id(shape_index);
        let mut ended = Vec::new();
        for (_, sensor) in self.sensors.iter_mut() {
            if let Some(position) = sensor.overlaps.iter().position(|id| *id == visitor_shape_id) {
                sensor.overlaps.remove(position);
                ended.push(sensor.shape);
            }
        }
        for sensor_shape in ended {
            let sensor_shape_id = self.shape_id(sensor_shape);
            self.events.push_sensor_end(SensorEndTouchEvent {
                sensor_shape_id,
                visitor_shape_id,
            });
        }
    }

    /// Recomputes the overlaps of every sensor and emits the events.
    pub(crate) fn update_sensors(&mut self) {
        let world0 = self.world0();
        let mut updates = Vec::new();

        for (sensor_index, sensor) in self.sensors.iter() {
            let sensor_shape = &self.shapes[sensor.shape];
            let sensor_body = &self.bodies[sensor_shape.body];

            let mut overlaps = Vec::new();
            if sensor_body.enabled && sensor_shape.enable_sensor_events {
                let transform = sensor_body.transform;
                let sensor_proxy = sensor_shape.geometry.make_proxy();
                let query_box = sensor_shape.aabb;

                for tree_type in [BodyType::Static, BodyType::Kinematic, BodyType::Dynamic] {
                    self.broad_phase.tree(tree_type).query(query_box, DEFAULT_MASK_BITS, |_, user_data| {
                        let other_index = user_data as usize;
                        if other_index == sensor.shape {
                            return true;
                        }
                        let Some(other) = self.shapes.get(other_index) else {
                            return true;
                        };
                        if other.is_sensor || !other.enable_sensor_events || other.body == sensor_shape.body {
                            return true;
                        }
                        if !sensor_shape.filter.should_collide(&other.filter) {
                            return true;
                        }

                        let input = DistanceInput {
                            proxy_a: sensor_proxy,
                            proxy_b: other.geometry.make_proxy(),
                            transform_a: transform,
                            transform_b: self.bodies[other.body].transform,
                            use_radii: true,
                        };
                        let mut cache = SimplexCache::default();
                        let output = shape_distance(&input, &mut cache, None);
                        if output.distance < 10.0 * linear_slop() {
                            overlaps.push(ShapeId::new(other_index, world0, other.generation));
                        }
                        true
                    });
                }
            }
            overlaps.sort_by_key(sort_key);
            overlaps.dedup();

            if overlaps != sensor.overlaps {
                updates.push((sensor_index, overlaps));
            }
        }

        for (sensor_index, overlaps) in updates {
            let sensor = &mut self.sensors[sensor_index];
            let previous = std::mem::replace(&mut sensor.overlaps, overlaps);
            let sensor_shape = sensor.shape;
            let sensor_shape_id = self.shape_id(sensor_shape);
            let current = &self.sensors[sensor_index].overlaps;

            // Both lists are sorted, so a merge walk finds the differences.
            let (mut i, mut j) = (0, 0);
            let mut begins = Vec::new();
            let mut ends = Vec::new();
            while i < previous.len() || j < current.len() {
                match (previous.get(i), current.get(j)) {
                    (Some(old), Some(new)) if old == new => {
                        i += 1;
                        j += 1;
                    }
                    (Some(old), Some(new)) if sort_key(old) < sort_key(new) => {
                        ends.push(*old);
                        i += 1;
                    }
                    (Some(_), Some(new)) => {
                        begins.push(*new);
                        j += 1;
                    }
                    (Some(old), None) => {
                        ends.push(*old);
                        i += 1;
                    }
                    (None, Some(new)) => {
                        begins.push(*new);
                        j += 1;
                    }
                    (None, None) => break,
                }
            }

            for visitor_shape_id in ends {
                self.events.push_sensor_end(SensorEndTouchEvent {
                    sensor_shape_id,
                    visitor_shape_id,
                });
            }
            for visitor_shape_id in begins {
                self.events.sensor_begin.push(SensorBeginTouchEvent {
                    sensor_shape_id,
                    visitor_shape_id,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::math::{Rot, Vec2};
    use crate::objects::{BodyDef, ShapeDef};
    use crate::shapes::{make_box, Circle};
    use crate::world::{PhysicsWorld, WorldDef};

    #[test]
    fn test_sensor_reports_begin_and_end() {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");

        let zone = world.create_body(&BodyDef::default()).expect("zone");
        let sensor_def = ShapeDef {
            is_sensor: true,
            ..Default::default()
        };
        let sensor = world.create_shape(zone, &sensor_def, make_box(1.0, 1.0)).expect("sensor");

        let visitor_body = world
            .create_body(&BodyDef {
                position: Vec2::new(0.5, 0.0),
                ..BodyDef::dynamic()
            })
            .expect("visitor");
        let visitor = world
            .create_shape(visitor_body, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.25))
            .expect("visitor shape");

        world.step(1.0 / 60.0, 4);
        let events = world.sensor_events();
        assert_eq!(events.begin_events.len(), 1);
        assert_eq!(events.begin_events[0].sensor_shape_id, sensor);
        assert_eq!(events.begin_events[0].visitor_shape_id, visitor);
        assert_eq!(world.shape_sensor_overlaps(sensor).expect("overlaps"), vec![visitor]);

        world
            .set_body_transform(visitor_body, Vec2::new(10.0, 0.0), Rot::IDENTITY)
            .expect("move");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.sensor_events().end_events.len(), 1);
        assert!(world.shape_sensor_overlaps(sensor).expect("overlaps").is_empty());
    }

    #[test]
    fn test_sensor_ignores_shapes_without_sensor_events() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let zone = world.create_body(&BodyDef::default()).expect("zone");
        let sensor_def = ShapeDef {
            is_sensor: true,
            ..Default::default()
        };
        world.create_shape(zone, &sensor_def, make_box(1.0, 1.0)).expect("sensor");

        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let quiet = ShapeDef {
            enable_sensor_events: false,
            ..Default::default()
        };
        world
            .create_shape(body, &quiet, Circle::new(Vec2::ZERO, 0.25))
            .expect("shape");

        world.step(1.0 / 60.0, 4);
        assert!(world.sensor_events().begin_events.is_empty());
    }
}
