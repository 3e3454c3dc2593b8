//! The solve stage of a step.
//!
//! Awake bodies are copied into solver arrays, contacts and joints are
//! prepared and colored, and the soft step runs its sub-steps: integrate
//! velocities, warm start, solve, integrate positions, relax. Restitution
//! and impulse storage follow. Bodies are then written back, fast bodies
//! get continuous collision, proxies are enlarged and islands may sleep.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace_span, warn};

use super::events::{BodyMoveEvent, ContactHitEvent, JointEvent};
use super::graph::{ConstraintGraph, ConstraintKind};
use super::physics_world::{bodies_should_collide, PhysicsWorld};
use super::task::TaskSystem;
use crate::collision::distance::{make_proxy, Sweep};
use crate::collision::toi::{time_of_impact, ToiInput};
use crate::common::constants::{aabb_margin, speculative_distance, DEFAULT_MASK_BITS, TIME_TO_SLEEP};
use crate::common::{BodyId, JointId, ShapeId, Timer};
use crate::constraints::contact_solver::{ConstraintBody, ContactConstraint, ContactSurface};
use crate::constraints::{make_soft, Constraint, JointBase, JointKind};
use crate::integration::integrator::{integrate_positions, integrate_velocities, sleep_velocity};
use crate::integration::{BodySim, SolverBodies, StepContext};
use crate::math::{Rot, Transform, Vec2};
use crate::objects::{Body, BodyType};
use crate::shapes::ShapeGeometry;

/// A joint copied out of the world for the duration of the solve.
struct JointSolve {
    joint: usize,
    base: JointBase,
    kind: JointKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    WarmStart,
    Solve,
    Relax,
    Restitution,
}

fn body_sim(body: &Body) -> BodySim {
    BodySim {
        transform: body.transform,
        center: body.center,
        force: body.force,
        torque: body.torque,
        mass: body.mass,
        inv_mass: body.inv_mass,
        inv_inertia: body.inv_inertia,
        min_extent: body.min_extent,
        max_extent: body.max_extent,
        linear_damping: body.linear_damping,
        angular_damping: body.angular_damping,
        gravity_scale: body.gravity_scale,
        is_dynamic: body.is_dynamic(),
        allow_fast_rotation: body.allow_fast_rotation,
    }
}

/// Bodies outside the solver arrays act as static.
fn constraint_body(body: &Body) -> ConstraintBody {
    match body.solver_index {
        Some(index) => ConstraintBody {
            index: Some(index),
            inv_mass: body.inv_mass,
            inv_inertia: body.inv_inertia,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
        },
        None => ConstraintBody::default(),
    }
}

/// Graph slot of a body. Only dynamic bodies are written by constraints.
fn color_slot(body: &Body) -> Option<usize> {
    if body.is_dynamic() {
        body.solver_index
    } else {
        None
    }
}

pub(crate) fn make_sweep(body: &Body) -> Sweep {
    Sweep {
        local_center: body.local_center,
        c1: body.center0,
        c2: body.center,
        q1: body.rotation0,
        q2: body.transform.q,
    }
}

/// Runs one stage over the overflow constraints serially and then over
/// each color through the task system.
fn run_graph_stage(
    tasks: &dyn TaskSystem,
    graph: &ConstraintGraph,
    task_count: &mut usize,
    stage: &(dyn Fn(ConstraintKind, usize) + Sync),
) {
    for &joint in &graph.overflow.joints {
        stage(ConstraintKind::Joint, joint);
    }
    for &contact in &graph.overflow.contacts {
        stage(ConstraintKind::Contact, contact);
    }

    for color in graph.colors.iter().filter(|c| !c.is_empty()) {
        let joint_count = color.joints.len();
        tasks.run_task(color.len(), 16, &|start, end, _worker| {
            for i in start..end {
                if i < joint_count {
                    stage(ConstraintKind::Joint, color.joints[i]);
                } else {
                    stage(ConstraintKind::Contact, color.contacts[i - joint_count]);
                }
            }
        });
        *task_count += 1;
    }
}

impl PhysicsWorld {
    pub(super) fn solve(&mut self, context: &StepContext) {
        let task_system = self.task_system();
        let tasks = task_system.as_ref();
        let world0 = self.world0();
        let mut task_count = 0;
        let mut timer = Timer::new();

        // Awake bodies get solver slots in arena order.
        let mut awake = Vec::new();
        for (index, body) in self.bodies.iter_mut() {
            body.move_event_index = None;
            body.is_fast = false;
            body.enlarge_aabb = false;
            body.solver_index = if body.is_simulated() {
                awake.push(index);
                Some(awake.len() - 1)
            } else {
                None
            };
        }
        let sims: Vec<BodySim> = awake.iter().map(|&i| body_sim(&self.bodies[i])).collect();
        let bodies = SolverBodies::new(
            &sims,
            awake
                .iter()
                .map(|&i| (self.bodies[i].linear_velocity, self.bodies[i].angular_velocity)),
        );
        let mut graph = ConstraintGraph::new(awake.len());

        let mut contact_constraints = Vec::new();
        for (contact_index, contact) in self.contacts.iter() {
            if !contact.touching || contact.manifold.point_count == 0 {
                continue;
            }
            let body_a = &self.bodies[contact.body_a];
            let body_b = &self.bodies[contact.body_b];
            if body_a.solver_index.is_none() && body_b.solver_index.is_none() {
                continue;
            }
            let surface = ContactSurface {
                friction: contact.friction,
                restitution: contact.restitution,
                rolling_resistance: contact.rolling_resistance,
                tangent_speed: contact.tangent_speed,
            };
            let constraint = ContactConstraint::prepare(
                contact_index,
                &contact.manifold,
                surface,
                &constraint_body(body_a),
                &constraint_body(body_b),
                context,
            );
            graph.add(
                ConstraintKind::Contact,
                contact_constraints.len(),
                color_slot(body_a),
                color_slot(body_b),
            );
            contact_constraints.push(Mutex::new(constraint));
        }

        let mut joint_entries = Vec::new();
        for (joint_index, joint) in self.joints.iter() {
            if matches!(joint.kind, JointKind::Filter) {
                continue;
            }
            let body_a = &self.bodies[joint.body_a];
            let body_b = &self.bodies[joint.body_b];
            if !body_a.enabled || !body_b.enabled {
                continue;
            }
            if body_a.solver_index.is_none() && body_b.solver_index.is_none() {
                continue;
            }
            let side_a = constraint_body(body_a);
            let side_b = constraint_body(body_b);
            let base = JointBase {
                index_a: side_a.index,
                index_b: side_b.index,
                inv_mass_a: side_a.inv_mass,
                inv_mass_b: side_b.inv_mass,
                inv_i_a: side_a.inv_inertia,
                inv_i_b: side_b.inv_inertia,
                anchor_a: body_a.transform.q.rotate(joint.local_anchor_a - body_a.local_center),
                anchor_b: body_b.transform.q.rotate(joint.local_anchor_b - body_b.local_center),
                delta_center: body_b.center - body_a.center,
                center_b: body_b.center,
                rotation_a: body_a.transform.q,
                rotation_b: body_b.transform.q,
                softness: joint
                    .tuning
                    .map_or(context.joint_softness, |(hertz, zeta)| make_soft(hertz, zeta, context.h)),
            };
            let mut kind = joint.kind.clone();
            kind.prepare(&base, context);
            graph.add(
                ConstraintKind::Joint,
                joint_entries.len(),
                color_slot(body_a),
                color_slot(body_b),
            );
            joint_entries.push(Mutex::new(JointSolve {
                joint: joint_index,
                base,
                kind,
            }));
        }
        self.color_counts = graph.color_counts();
        self.profile.prepare_constraints = timer.milliseconds_and_reset();

        // The soft step.
        let capped = AtomicUsize::new(0);
        let body_count = awake.len();

        let integrate_velocity_range = |start: usize, end: usize, _worker: usize| {
            for i in start..end {
                if bodies.with(i, |state| integrate_velocities(context, &sims[i], state)) {
                    capped.fetch_add(1, Ordering::Relaxed);
                }
            }
        };
        let integrate_position_range = |start: usize, end: usize, _worker: usize| {
            for i in start..end {
                bodies.with(i, |state| integrate_positions(context, state));
            }
        };
        let run_stage = |stage: Stage, task_count: &mut usize| {
            let apply = |kind: ConstraintKind, index: usize| match kind {
                ConstraintKind::Joint => {
                    let mut guard = joint_entries[index].lock();
                    let entry = &mut *guard;
                    match stage {
                        Stage::WarmStart => entry.kind.warm_start(&entry.base, &bodies),
                        Stage::Solve => entry.kind.solve(&entry.base, context, &bodies, true),
                        Stage::Relax => entry.kind.solve(&entry.base, context, &bodies, false),
                        Stage::Restitution => {}
                    }
                }
                ConstraintKind::Contact => {
                    let mut constraint = contact_constraints[index].lock();
                    match stage {
                        Stage::WarmStart => constraint.warm_start(&bodies),
                        Stage::Solve => constraint.solve(&bodies, context, true),
                        Stage::Relax => constraint.solve(&bodies, context, false),
                        Stage::Restitution => constraint.apply_restitution(&bodies, context),
                    }
                }
            };
            run_graph_stage(tasks, &graph, task_count, &apply);
        };

        for _ in 0..context.sub_step_count {
            tasks.run_task(body_count, 64, &integrate_velocity_range);
            task_count += 1;
            self.profile.integrate_velocities += timer.milliseconds_and_reset();

            run_stage(Stage::WarmStart, &mut task_count);
            self.profile.warm_start += timer.milliseconds_and_reset();

            run_stage(Stage::Solve, &mut task_count);
            self.profile.solve_impulses += timer.milliseconds_and_reset();

            tasks.run_task(body_count, 64, &integrate_position_range);
            task_count += 1;
            self.profile.integrate_positions += timer.milliseconds_and_reset();

            run_stage(Stage::Relax, &mut task_count);
            self.profile.relax_impulses += timer.milliseconds_and_reset();
        }

        run_stage(Stage::Restitution, &mut task_count);
        self.profile.apply_restitution = timer.milliseconds_and_reset();

        let capped = capped.into_inner();
        if capped > 0 {
            warn!(count = capped, "body speed capped at the maximum linear speed");
        }

        // Impulses go back to the manifolds for warm starting and events.
        let hit_threshold = self.hit_event_threshold;
        let mut hits = Vec::new();
        for constraint in contact_constraints {
            let constraint = constraint.into_inner();
            let Some(contact) = self.contacts.get_mut(constraint.contact) else {
                continue;
            };
            constraint.store_impulses(&mut contact.manifold);

            if !contact.enable_hit_events {
                continue;
            }
            let mut best: Option<(Vec2, f32)> = None;
            for mp in contact.manifold.points() {
                let approach_speed = -mp.normal_velocity;
                if approach_speed > hit_threshold
                    && mp.total_normal_impulse > 0.0
                    && best.map_or(true, |(_, speed)| approach_speed > speed)
                {
                    best = Some((mp.point, approach_speed));
                }
            }
            if let Some((point, approach_speed)) = best {
                hits.push((contact.shape_a, contact.shape_b, point, contact.manifold.normal, approach_speed));
            }
        }
        self.profile.store_impulses = timer.milliseconds_and_reset();

        for (shape_a, shape_b, point, normal, approach_speed) in hits {
            let event = ContactHitEvent {
                shape_id_a: self.shape_id(shape_a),
                shape_id_b: self.shape_id(shape_b),
                point,
                normal,
                approach_speed,
            };
            self.events.contact_hit.push(event);
        }
        self.profile.hit_events = timer.milliseconds_and_reset();

        for entry in joint_entries {
            let entry = entry.into_inner();
            let Some(joint) = self.joints.get_mut(entry.joint) else {
                continue;
            };
            joint.constraint_force = context.inv_h * entry.kind.linear_impulse();
            joint.constraint_torque = context.inv_h * entry.kind.angular_impulse();
            joint.kind = entry.kind;
            if joint.constraint_force.length() > joint.force_threshold
                || joint.constraint_torque.abs() > joint.torque_threshold
            {
                self.events.joints.push(JointEvent {
                    joint_id: JointId::new(entry.joint, world0, joint.generation),
                    user_data: joint.user_data,
                });
            }
        }

        // Write back body state.
        let enable_sleep = self.enable_sleep;
        let enable_continuous = self.enable_continuous;
        let mut enlarged = Vec::new();
        let mut fast_bodies = Vec::new();
        let mut bullet_bodies = Vec::new();

        for (solver_index, &body_index) in awake.iter().enumerate() {
            let state = bodies.get(Some(solver_index));
            let sim = &sims[solver_index];
            let body = &mut self.bodies[body_index];

            let v = state.linear_velocity;
            let w = state.angular_velocity;
            body.linear_velocity = v;
            body.angular_velocity = w;
            body.center = sim.center + state.delta_position;
            let q = state.delta_rotation.mul(sim.transform.q).normalize();
            body.transform = Transform::new(body.center - q.rotate(body.local_center), q);
            body.force = Vec2::ZERO;
            body.torque = 0.0;

            let max_velocity = v.length() + w.abs() * sim.max_extent;
            let sleep_speed = sleep_velocity(&state, sim.max_extent, context.inv_dt);

            if !enable_sleep || !body.enable_sleep || sleep_speed > body.sleep_threshold {
                body.sleep_time = 0.0;
                if body.is_dynamic()
                    && (enable_continuous || body.is_bullet)
                    && max_velocity * context.dt > 0.5 * sim.min_extent
                {
                    // rotation0 and center0 keep the start of the sweep
                    body.is_fast = true;
                    if body.is_bullet {
                        bullet_bodies.push(body_index);
                    } else {
                        fast_bodies.push(body_index);
                    }
                } else {
                    body.rotation0 = q;
                    body.center0 = body.center;
                }
            } else {
                body.rotation0 = q;
                body.center0 = body.center;
                body.sleep_time += context.dt;
            }

            body.move_event_index = Some(self.events.body_moves.len());
            self.events.body_moves.push(BodyMoveEvent {
                transform: body.transform,
                body_id: BodyId::new(body_index, world0, body.generation),
                user_data: body.user_data,
                fell_asleep: false,
            });

            if !body.is_fast {
                self.refresh_shape_bounds(body_index, &mut enlarged);
            }
        }
        self.profile.transforms = timer.milliseconds_and_reset();

        // Non-bullets only look at static shapes, so their order does not
        // matter. Bullets go after every other body has moved.
        let continuous = trace_span!("continuous", fast = fast_bodies.len(), bullets = bullet_bodies.len());
        continuous.in_scope(|| {
            for &body_index in fast_bodies.iter().chain(&bullet_bodies) {
                self.solve_continuous(body_index);
                self.refresh_shape_bounds(body_index, &mut enlarged);
            }
        });
        self.profile.bullets = timer.milliseconds_and_reset();

        for shape_index in enlarged {
            let shape = &mut self.shapes[shape_index];
            shape.enlarged_aabb = false;
            if let Some(key) = shape.proxy_key {
                self.broad_phase.enlarge_proxy(key, shape.fat_aabb);
            }
        }
        self.broad_phase.rebuild_trees();
        self.profile.refit = timer.milliseconds_and_reset();

        trace_span!("sleep").in_scope(|| self.update_sleep(&awake));
        self.profile.sleep_islands = timer.milliseconds_and_reset();

        for &body_index in &awake {
            self.bodies[body_index].solver_index = None;
        }
        self.task_count += task_count;
    }

    /// Recomputes the bounds of a body's shapes and queues the proxies that
    /// outgrew their fat box.
    fn refresh_shape_bounds(&mut self, body_index: usize, enlarged: &mut Vec<usize>) {
        let body = &mut self.bodies[body_index];
        let transform = body.transform;
        for &shape_index in &body.shapes {
            let shape = &mut self.shapes[shape_index];
            shape.aabb = shape.compute_aabb(transform);
            if shape.proxy_key.is_none() {
                continue;
            }
            let padded = shape.aabb.fattened(speculative_distance());
            if !shape.fat_aabb.contains(&padded) {
                shape.fat_aabb = padded.fattened(aabb_margin());
                if !shape.enlarged_aabb {
                    shape.enlarged_aabb = true;
                    enlarged.push(shape_index);
                }
                body.enlarge_aabb = true;
            }
        }
    }

    /// Moves a fast body back to its first time of impact along the sweep.
    /// Non-bullets are checked against static shapes only; bullets are also
    /// checked against kinematic and dynamic non-bullet shapes.
    fn solve_continuous(&mut self, body_index: usize) {
        let world0 = self.world0();
        let body = &self.bodies[body_index];
        let sweep = make_sweep(body);
        let xf1 = Transform::new(sweep.c1 - sweep.q1.rotate(sweep.local_center), sweep.q1);
        let xf2 = body.transform;
        let tree_types: &[BodyType] = if body.is_bullet {
            &[BodyType::Static, BodyType::Kinematic, BodyType::Dynamic]
        } else {
            &[BodyType::Static]
        };

        let mut fraction = 1.0f32;
        for &shape_index in &body.shapes {
            let fast_shape = &self.shapes[shape_index];
            if fast_shape.is_sensor {
                continue;
            }

            let box1 = fast_shape.compute_aabb(xf1);
            let box2 = fast_shape.compute_aabb(xf2);
            let sweep_box = box1.union(&box2);
            let centroid1 = xf1.apply(fast_shape.geometry.centroid());
            let centroid2 = xf2.apply(fast_shape.geometry.centroid());
            let fast_proxy = fast_shape.geometry.make_proxy();

            for &tree_type in tree_types {
                self.broad_phase
                    .tree(tree_type)
                    .query(sweep_box, DEFAULT_MASK_BITS, |_proxy, user_data| {
                        let other_index = user_data as usize;
                        let Some(other) = self.shapes.get(other_index) else {
                            return true;
                        };
                        if other.body == body_index || other.is_sensor {
                            return true;
                        }
                        if !fast_shape.filter.should_collide(&other.filter) {
                            return true;
                        }
                        let other_body = &self.bodies[other.body];
                        if other_body.is_bullet {
                            return true;
                        }
                        if !bodies_should_collide(&self.bodies, &self.joints, body_index, other.body) {
                            return true;
                        }
                        if fast_shape.enable_custom_filtering || other.enable_custom_filtering {
                            if let Some(filter) = &self.custom_filter {
                                let id_a = ShapeId::new(shape_index, world0, fast_shape.generation);
                                let id_b = ShapeId::new(other_index, world0, other.generation);
                                if !filter(id_a, id_b) {
                                    return true;
                                }
                            }
                        }

                        // Skip chain segments the shape started behind or ends
                        // in front of, so it does not pause on them.
                        if let ShapeGeometry::ChainSegment(chain) = &other.geometry {
                            let xf = other_body.transform;
                            let p1 = xf.apply(chain.segment.point1);
                            let e = xf.apply(chain.segment.point2) - p1;
                            let offset1 = (centroid1 - p1).cross(e);
                            let offset2 = (centroid2 - p1).cross(e);
                            if offset1 < 0.0 || offset2 > 0.0 || offset1 == offset2 {
                                return true;
                            }
                        }

                        let mut input = ToiInput {
                            proxy_a: other.geometry.make_proxy(),
                            proxy_b: fast_proxy,
                            sweep_a: make_sweep(other_body),
                            sweep_b: sweep,
                            max_fraction: fraction,
                        };
                        let output = time_of_impact(&input);
                        if 0.0 < output.fraction && output.fraction < fraction {
                            fraction = output.fraction;
                        } else if output.fraction == 0.0 {
                            // Initially overlapping: retry with a small core
                            // around the centroid.
                            let centroid = fast_shape.geometry.centroid();
                            let extent = fast_shape.geometry.extent(centroid);
                            input.proxy_b = make_proxy(&[centroid], 0.25 * extent.min_extent);
                            let output = time_of_impact(&input);
                            if 0.0 < output.fraction && output.fraction < fraction {
                                fraction = output.fraction;
                            }
                        }
                        true
                    });
            }
        }

        let body = &mut self.bodies[body_index];
        if fraction < 1.0 {
            let q = Rot::nlerp(sweep.q1, sweep.q2, fraction);
            let c = Vec2::lerp(sweep.c1, sweep.c2, fraction);
            body.transform = Transform::new(c - q.rotate(sweep.local_center), q);
            body.center = c;
            debug!(body = body_index, fraction, "continuous collision moved body back");
        }
        body.rotation0 = body.transform.q;
        body.center0 = body.center;
        if let Some(event) = body.move_event_index.and_then(|i| self.events.body_moves.get_mut(i)) {
            event.transform = body.transform;
        }
    }

    /// Puts islands to sleep whose bodies have all rested long enough.
    /// Islands that lost constraints are split instead and may sleep on a
    /// later step.
    fn update_sleep(&mut self, awake: &[usize]) {
        if !self.enable_sleep {
            return;
        }

        // Moving kinematic bodies keep what they touch awake.
        let mut keep_awake = HashSet::new();
        for &body_index in awake {
            let body = &self.bodies[body_index];
            if body.body_type != BodyType::Kinematic || body.sleep_time >= TIME_TO_SLEEP {
                continue;
            }
            for &contact_index in &body.contacts {
                let contact = &self.contacts[contact_index];
                if !contact.touching {
                    continue;
                }
                let other = if contact.body_a == body_index {
                    contact.body_b
                } else {
                    contact.body_a
                };
                if let Some(island_id) = self.bodies[other].island_id {
                    keep_awake.insert(island_id);
                }
            }
            for &joint_index in &body.joints {
                let joint = &self.joints[joint_index];
                let other = if joint.body_a == body_index {
                    joint.body_b
                } else {
                    joint.body_a
                };
                if let Some(island_id) = self.bodies[other].island_id {
                    keep_awake.insert(island_id);
                }
            }
        }

        let candidates: Vec<usize> = self
            .islands
            .iter()
            .filter(|(id, island)| island.awake && !keep_awake.contains(id))
            .map(|(id, _)| id)
            .collect();

        for island_id in candidates {
            let Some(island) = self.islands.get(island_id) else {
                continue;
            };
            let min_sleep_time = island
                .bodies
                .iter()
                .map(|&b| self.bodies[b].sleep_time)
                .fold(f32::MAX, f32::min);
            if min_sleep_time < TIME_TO_SLEEP {
                continue;
            }
            if island.constraint_remove_count > 0 {
                self.split_island(island_id);
                continue;
            }
            self.sleep_island(island_id);
        }

        // A resting kinematic body sleeps on its own.
        for &body_index in awake {
            let body = &mut self.bodies[body_index];
            if body.body_type == BodyType::Kinematic
                && body.sleep_time >= TIME_TO_SLEEP
                && body.linear_velocity == Vec2::ZERO
                && body.angular_velocity == 0.0
            {
                body.awake = false;
                if let Some(event) = body.move_event_index.and_then(|i| self.events.body_moves.get_mut(i)) {
                    event.fell_asleep = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::math::Vec2;
    use crate::objects::{BodyDef, ShapeDef};
    use crate::shapes::{make_box, Circle, Segment};
    use crate::world::{PhysicsWorld, WorldDef};

    #[test]
    fn test_box_rests_on_ground_and_sleeps() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        world
            .create_shape(ground, &ShapeDef::default(), Segment::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0)))
            .expect("ground shape");

        let body = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 2.0),
                ..BodyDef::dynamic()
            })
            .expect("body");
        world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");

        for _ in 0..300 {
            world.step(1.0 / 60.0, 4);
        }
        let position = world.body_position(body).expect("position");
        assert!((position.y - 0.5).abs() < 0.02, "box rests at {position:?}");
        assert!(!world.body_is_awake(body).expect("awake"));
    }

    #[test]
    fn test_bullet_does_not_tunnel_through_thin_wall() {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");
        let wall = world.create_body(&BodyDef::default()).expect("wall");
        world
            .create_shape(wall, &ShapeDef::default(), Segment::new(Vec2::new(5.0, -5.0), Vec2::new(5.0, 5.0)))
            .expect("wall shape");

        let ball = world
            .create_body(&BodyDef {
                linear_velocity: Vec2::new(300.0, 0.0),
                ..BodyDef::dynamic()
            })
            .expect("ball");
        world
            .create_shape(ball, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.1))
            .expect("ball shape");

        for _ in 0..10 {
            world.step(1.0 / 60.0, 4);
        }
        let position = world.body_position(ball).expect("position");
        assert!(position.x < 5.0, "ball tunneled to {position:?}");
    }

    #[test]
    fn test_hit_event_for_fast_impact() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        world
            .create_shape(ground, &ShapeDef::default(), make_box(5.0, 0.5))
            .expect("ground shape");

        let ball = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 1.2),
                linear_velocity: Vec2::new(0.0, -10.0),
                ..BodyDef::dynamic()
            })
            .expect("ball");
        let shape_def = ShapeDef {
            enable_hit_events: true,
            ..Default::default()
        };
        world
            .create_shape(ball, &shape_def, Circle::new(Vec2::ZERO, 0.5))
            .expect("ball shape");

        let mut hit_count = 0;
        for _ in 0..30 {
            world.step(1.0 / 60.0, 4);
            hit_count += world.contact_events().hit_events.len();
        }
        assert!(hit_count >= 1);
    }
}
