//! Event records produced by a step and the buffers that hold them.
//!
//! Events are valid until the next call to `step`. Contact end events are
//! double buffered because destroying a shape between steps also produces
//! them; those are reported together with the following step's events.

use crate::collision::manifold::Manifold;
use crate::common::{BodyId, JointId, ShapeId};
use crate::math::{Transform, Vec2};

/// Body moved. Only produced for bodies that were simulated this step.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMoveEvent {
    pub transform: Transform,
    pub body_id: BodyId,
    pub user_data: u64,
    /// The body fell asleep during this step.
    pub fell_asleep: bool,
}

/// Two shapes started touching.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactBeginTouchEvent {
    pub shape_id_a: ShapeId,
    pub shape_id_b: ShapeId,
    /// The initial contact manifold.
    pub manifold: Manifold,
}

/// Two shapes stopped touching, or one of them was destroyed. The shape ids
/// may be stale.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEndTouchEvent {
    pub shape_id_a: ShapeId,
    pub shape_id_b: ShapeId,
}

/// Two shapes hit each other faster than the hit event threshold.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactHitEvent {
    pub shape_id_a: ShapeId,
    pub shape_id_b: ShapeId,
    /// Point where the shapes hit, at the start of the step.
    pub point: Vec2,
    /// Normal vector pointing from shape A to shape B.
    pub normal: Vec2,
    /// The speed the shapes are approaching. Always positive.
    pub approach_speed: f32,
}

/// A shape started overlapping a sensor shape.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorBeginTouchEvent {
    pub sensor_shape_id: ShapeId,
    pub visitor_shape_id: ShapeId,
}

/// A shape stopped overlapping a sensor shape, or one of them was destroyed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEndTouchEvent {
    pub sensor_shape_id: ShapeId,
    pub visitor_shape_id: ShapeId,
}

/// A joint exceeded its force or torque threshold.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEvent {
    pub joint_id: JointId,
    pub user_data: u64,
}

/// Contact events of the last step.
#[derive(Debug, Clone, Copy)]
pub struct ContactEvents<'a> {
    pub begin_events: &'a [ContactBeginTouchEvent],
    pub end_events: &'a [ContactEndTouchEvent],
    pub hit_events: &'a [ContactHitEvent],
}

/// Sensor events of the last step.
#[derive(Debug, Clone, Copy)]
pub struct SensorEvents<'a> {
    pub begin_events: &'a [SensorBeginTouchEvent],
    pub end_events: &'a [SensorEndTouchEvent],
}

/// Body events of the last step.
#[derive(Debug, Clone, Copy)]
pub struct BodyEvents<'a> {
    pub move_events: &'a [BodyMoveEvent],
}

/// Joint events of the last step.
#[derive(Debug, Clone, Copy)]
pub struct JointEvents<'a> {
    pub events: &'a [JointEvent],
}

#[derive(Debug, Default)]
pub(crate) struct EventBuffers {
    pub body_moves: Vec<BodyMoveEvent>,
    pub contact_begin: Vec<ContactBeginTouchEvent>,
    contact_end: [Vec<ContactEndTouchEvent>; 2],
    pub contact_hit: Vec<ContactHitEvent>,
    pub sensor_begin: Vec<SensorBeginTouchEvent>,
    sensor_end: [Vec<SensorEndTouchEvent>; 2],
    pub joints: Vec<JointEvent>,
    end_index: usize,
}

impl EventBuffers {
    /// Called at the start of a step.
    pub fn begin_step(&mut self) {
        self.body_moves.clear();
        self.contact_begin.clear();
        self.contact_hit.clear();
        self.sensor_begin.clear();
        self.joints.clear();

        self.end_index = 1 - self.end_index;
        self.contact_end[self.end_index].clear();
        self.sensor_end[self.end_index].clear();
    }

    pub fn push_contact_end(&mut self, event: ContactEndTouchEvent) {
        self.contact_end[self.end_index].push(event);
    }

    pub fn push_sensor_end(&mut self, event: SensorEndTouchEvent) {
        self.sensor_end[self.end_index].push(event);
    }

    pub fn contact_events(&self) -> ContactEvents<'_> {
        ContactEvents {
            begin_events: &self.contact_begin,
            end_events: &self.contact_end[self.end_index],
            hit_events: &self.contact_hit,
        }
    }

    pub fn sensor_events(&self) -> SensorEvents<'_> {
        SensorEvents {
            begin_events: &self.sensor_begin,
            end_events: &self.sensor_end[self.end_index],
        }
    }

    pub fn body_events(&self) -> BodyEvents<'_> {
        BodyEvents {
            move_events: &self.body_moves,
        }
    }

    pub fn joint_events(&self) -> JointEvents<'_> {
        JointEvents { events: &self.joints }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end(index: i32) -> ContactEndTouchEvent {
        ContactEndTouchEvent {
            shape_id_a: ShapeId { index1: index, ..ShapeId::NULL },
            shape_id_b: ShapeId::NULL,
        }
    }

    #[test]
    fn test_end_events_survive_until_next_step() {
        let mut events = EventBuffers::default();
        events.begin_step();
        events.push_contact_end(end(1));
        assert_eq!(events.contact_events().end_events.len(), 1);

        // destroyed between steps: still visible with the last step's events
        events.push_contact_end(end(2));
        assert_eq!(events.contact_events().end_events.len(), 2);

        events.begin_step();
        assert!(events.contact_events().end_events.is_empty());
        assert!(events.body_events().move_events.is_empty());
    }
}
