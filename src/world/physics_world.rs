//! The world record, handle validation and the step driver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace_span, warn};

use super::contact::{Contact, ContactUpdate};
use super::def::{Counters, CustomFilterFn, MixingFn, PreSolveFn, Profile, WorldDef};
use super::events::{
    BodyEvents, ContactBeginTouchEvent, ContactEndTouchEvent, ContactEvents, EventBuffers, JointEvents, SensorEvents,
};
use super::island::Island;
use super::sensor::Sensor;
use super::task::{SerialTaskSystem, TaskSystem};
use super::{acquire_world_id, release_world_id};
use crate::collision::broad_phase::{shape_pair_key, BroadPhase};
use crate::collision::manifold::{has_manifold_fn, shapes_can_collide};
use crate::common::constants::{aabb_margin, speculative_distance, GRAPH_COLOR_COUNT};
use crate::common::id::Arena;
use crate::common::{BodyId, ChainId, JointId, PhysicsError, Result, ShapeId, Timer, WorldId};
use crate::constraints::{make_soft, Joint};
use crate::integration::StepContext;
use crate::math::Vec2;
use crate::objects::{Body, Chain, Shape};

/// A physics world. Owns every object created in it and advances them with
/// [`PhysicsWorld::step`].
pub struct PhysicsWorld {
    pub(crate) id: WorldId,

    pub(crate) bodies: Arena<Body>,
    pub(crate) shapes: Arena<Shape>,
    pub(crate) chains: Arena<Chain>,
    pub(crate) joints: Arena<Joint>,
    pub(crate) contacts: Arena<Contact>,
    pub(crate) islands: Arena<Island>,
    pub(crate) sensors: Arena<Sensor>,
    /// Contact index by shape pair key.
    pub(crate) pairs: HashMap<u64, usize>,
    pub(crate) broad_phase: BroadPhase,
    pub(crate) events: EventBuffers,

    pub(crate) gravity: Vec2,
    pub(crate) restitution_threshold: f32,
    pub(crate) hit_event_threshold: f32,
    pub(crate) contact_hertz: f32,
    pub(crate) contact_damping_ratio: f32,
    pub(crate) contact_push_max_velocity: f32,
    pub(crate) joint_hertz: f32,
    pub(crate) joint_damping_ratio: f32,
    pub(crate) maximum_linear_speed: f32,

    pub(crate) enable_sleep: bool,
    pub(crate) enable_continuous: bool,
    pub(crate) enable_warm_starting: bool,
    pub(crate) enable_speculative: bool,

    pub(crate) friction_callback: MixingFn,
    pub(crate) restitution_callback: MixingFn,
    pub(crate) custom_filter: Option<CustomFilterFn>,
    pub(crate) pre_solve: Option<PreSolveFn>,

    pub(crate) task_system: Option<Arc<dyn TaskSystem>>,
    pub(crate) worker_count: usize,
    pub(crate) user_data: u64,

    pub(crate) profile: Profile,
    pub(crate) task_count: usize,
    pub(crate) color_counts: [usize; GRAPH_COLOR_COUNT + 1],
    /// Inverse sub-step of the last step, for reporting joint forces.
    pub(crate) inv_h: f32,
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("id", &self.id)
            .field("body_count", &self.bodies.len())
            .field("shape_count", &self.shapes.len())
            .field("joint_count", &self.joints.len())
            .field("contact_count", &self.contacts.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

/// Read-only view used by the broad-phase to accept new pairs.
struct PairFilter<'a> {
    world0: u16,
    shapes: &'a Arena<Shape>,
    bodies: &'a Arena<Body>,
    joints: &'a Arena<Joint>,
    pairs: &'a HashMap<u64, usize>,
    custom_filter: Option<&'a CustomFilterFn>,
}

impl PairFilter<'_> {
    fn accept(&self, shape_a: usize, shape_b: usize) -> bool {
        let (Some(a), Some(b)) = (self.shapes.get(shape_a), self.shapes.get(shape_b)) else {
            return false;
        };
        if a.body == b.body || a.is_sensor || b.is_sensor {
            return false;
        }
        if !a.filter.should_collide(&b.filter) {
            return false;
        }
        if !shapes_can_collide(a.geometry.shape_type(), b.geometry.shape_type()) {
            return false;
        }
        if self.pairs.contains_key(&shape_pair_key(shape_a, shape_b)) {
            return false;
        }
        if !bodies_should_collide(self.bodies, self.joints, a.body, b.body) {
            return false;
        }
        if a.enable_custom_filtering || b.enable_custom_filtering {
            if let Some(filter) = self.custom_filter {
                let id_a = ShapeId::new(shape_a, self.world0, a.generation);
                let id_b = ShapeId::new(shape_b, self.world0, b.generation);
                return filter(id_a, id_b);
            }
        }
        true
    }
}

/// At least one body must be dynamic, and no joint between them may have
/// collision disabled.
pub(crate) fn bodies_should_collide(bodies: &Arena<Body>, joints: &Arena<Joint>, body_a: usize, body_b: usize) -> bool {
    let (a, b) = (&bodies[body_a], &bodies[body_b]);
    if !a.is_dynamic() && !b.is_dynamic() {
        return false;
    }

    // walk the shorter joint list
    let (joint_list, other) = if a.joints.len() <= b.joints.len() {
        (&a.joints, body_b)
    } else {
        (&b.joints, body_a)
    };
    !joint_list.iter().any(|&j| {
        let joint = &joints[j];
        !joint.collide_connected && (joint.body_a == other || joint.body_b == other)
    })
}

/// Odd, so every world generation maps to a distinct first handle generation.
const HANDLE_GENERATION_STRIDE: u16 = 0x9e37;

impl PhysicsWorld {
    /// Creates a world. Fails when the definition is invalid or every world
    /// slot is taken.
    pub fn new(def: &WorldDef) -> Result<Self> {
        if !def.is_valid() {
            return Err(PhysicsError::InvalidDefinition("world definition"));
        }
        let id = acquire_world_id()?;
        info!(world = id.index1, generation = id.generation, "world created");

        // Handles of an earlier world in this slot carry generations near
        // the previous seed, so they stay invalid.
        let seed = id.generation.wrapping_mul(HANDLE_GENERATION_STRIDE);

        Ok(Self {
            id,
            bodies: Arena::with_first_generation(seed),
            shapes: Arena::with_first_generation(seed),
            chains: Arena::with_first_generation(seed),
            joints: Arena::with_first_generation(seed),
            contacts: Arena::new(),
            islands: Arena::new(),
            sensors: Arena::new(),
            pairs: HashMap::new(),
            broad_phase: BroadPhase::new(),
            events: EventBuffers::default(),
            gravity: def.gravity,
            restitution_threshold: def.restitution_threshold,
            hit_event_threshold: def.hit_event_threshold,
            contact_hertz: def.contact_hertz,
            contact_damping_ratio: def.contact_damping_ratio,
            contact_push_max_velocity: def.max_contact_push_speed,
            joint_hertz: def.joint_hertz,
            joint_damping_ratio: def.joint_damping_ratio,
            maximum_linear_speed: def.maximum_linear_speed,
            enable_sleep: def.enable_sleep,
            enable_continuous: def.enable_continuous,
            enable_warm_starting: true,
            enable_speculative: true,
            friction_callback: def.friction_callback,
            restitution_callback: def.restitution_callback,
            custom_filter: None,
            pre_solve: None,
            task_system: def.task_system.clone(),
            worker_count: def.worker_count.max(1),
            user_data: def.user_data,
            profile: Profile::default(),
            task_count: 0,
            color_counts: [0; GRAPH_COLOR_COUNT + 1],
            inv_h: 0.0,
        })
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    #[inline]
    pub(crate) fn world0(&self) -> u16 {
        self.id.index1 - 1
    }

    // Handle validation. A handle is accepted only when it names this world
    // and a live slot with the same generation.

    pub(crate) fn body_index(&self, id: BodyId) -> Result<usize> {
        if id.is_null() || id.world0 != self.world0() || !self.bodies.is_live(id.index(), id.generation) {
            return Err(PhysicsError::InvalidBody);
        }
        Ok(id.index())
    }

    pub(crate) fn shape_index(&self, id: ShapeId) -> Result<usize> {
        if id.is_null() || id.world0 != self.world0() || !self.shapes.is_live(id.index(), id.generation) {
            return Err(PhysicsError::InvalidShape);
        }
        Ok(id.index())
    }

    pub(crate) fn joint_index(&self, id: JointId) -> Result<usize> {
        if id.is_null() || id.world0 != self.world0() || !self.joints.is_live(id.index(), id.generation) {
            return Err(PhysicsError::InvalidJoint);
        }
        Ok(id.index())
    }

    pub(crate) fn chain_index(&self, id: ChainId) -> Result<usize> {
        if id.is_null() || id.world0 != self.world0() || !self.chains.is_live(id.index(), id.generation) {
            return Err(PhysicsError::InvalidChain);
        }
        Ok(id.index())
    }

    pub(crate) fn body_id(&self, index: usize) -> BodyId {
        BodyId::new(index, self.world0(), self.bodies[index].generation)
    }

    pub(crate) fn shape_id(&self, index: usize) -> ShapeId {
        ShapeId::new(index, self.world0(), self.shapes[index].generation)
    }

    pub(crate) fn joint_id(&self, index: usize) -> JointId {
        JointId::new(index, self.world0(), self.joints[index].generation)
    }

    pub(crate) fn chain_id(&self, index: usize) -> ChainId {
        ChainId::new(index, self.world0(), self.chains[index].generation)
    }

    /// Runs the task system given at creation, or the serial fallback.
    pub(crate) fn task_system(&self) -> Arc<dyn TaskSystem> {
        match &self.task_system {
            Some(tasks) => Arc::clone(tasks),
            None => Arc::new(SerialTaskSystem),
        }
    }

    // Broad-phase proxies.

    /// Inserts the proxy of a shape at its body transform.
    pub(crate) fn create_shape_proxy(&mut self, shape_index: usize, force_pair_creation: bool) {
        let shape = &mut self.shapes[shape_index];
        let body = &self.bodies[shape.body];
        let margin = if body.is_static() {
            speculative_distance()
        } else {
            aabb_margin()
        };
        shape.aabb = shape.compute_aabb(body.transform);
        shape.fat_aabb = shape.aabb.fattened(margin);
        shape.enlarged_aabb = false;
        let key = self.broad_phase.create_proxy(
            shape.fat_aabb,
            shape.filter.category_bits,
            shape_index,
            body.body_type,
            force_pair_creation,
        );
        shape.proxy_key = Some(key);
    }

    pub(crate) fn destroy_shape_proxy(&mut self, shape_index: usize) {
        if let Some(key) = self.shapes[shape_index].proxy_key.take() {
            self.broad_phase.destroy_proxy(key);
        }
    }

    /// Refreshes the proxies of a body after a teleport or type change.
    pub(crate) fn move_body_proxies(&mut self, body_index: usize) {
        let body = &self.bodies[body_index];
        let margin = if body.is_static() {
            speculative_distance()
        } else {
            aabb_margin()
        };
        for &shape_index in &body.shapes {
            let shape = &mut self.shapes[shape_index];
            shape.aabb = shape.compute_aabb(body.transform);
            if let Some(key) = shape.proxy_key {
                shape.fat_aabb = shape.aabb.fattened(margin);
                self.broad_phase.move_proxy(key, shape.fat_aabb);
            }
        }
    }

    // Contacts.

    /// Creates a contact for a pair accepted by the broad-phase. Shapes are
    /// ordered so that a manifold routine exists for them.
    pub(crate) fn create_contact(&mut self, shape_a: usize, shape_b: usize) {
        let (mut a, mut b) = (shape_a, shape_b);
        if !has_manifold_fn(self.shapes[a].geometry.shape_type(), self.shapes[b].geometry.shape_type()) {
            std::mem::swap(&mut a, &mut b);
        }

        let (sa, sb) = (&self.shapes[a], &self.shapes[b]);
        let friction = (self.friction_callback)(
            sa.material.friction,
            sa.material.user_material_id,
            sb.material.friction,
            sb.material.user_material_id,
        );
        let restitution = (self.restitution_callback)(
            sa.material.restitution,
            sa.material.user_material_id,
            sb.material.restitution,
            sb.material.user_material_id,
        );
        let contact = Contact::new(a, sa, b, sb, friction, restitution);
        let (body_a, body_b) = (contact.body_a, contact.body_b);

        let (index, _) = self.contacts.insert(contact);
        self.pairs.insert(shape_pair_key(a, b), index);
        self.bodies[body_a].contacts.push(index);
        self.bodies[body_b].contacts.push(index);
    }

    /// Destroys a contact, reporting the end of touching when needed.
    pub(crate) fn destroy_contact(&mut self, contact_index: usize, wake_bodies: bool) {
        let Some(contact) = self.contacts.get(contact_index) else {
            return;
        };
        let (shape_a, shape_b) = (contact.shape_a, contact.shape_b);
        let (body_a, body_b) = (contact.body_a, contact.body_b);

        if contact.touching && contact.enable_contact_events {
            let event = ContactEndTouchEvent {
                shape_id_a: self.shape_id(shape_a),
                shape_id_b: self.shape_id(shape_b),
            };
            self.events.push_contact_end(event);
        }

        self.unlink_contact(contact_index);
        self.pairs.remove(&shape_pair_key(shape_a, shape_b));
        for body_index in [body_a, body_b] {
            let contacts = &mut self.bodies[body_index].contacts;
            if let Some(position) = contacts.iter().position(|&c| c == contact_index) {
                contacts.swap_remove(position);
            }
        }
        self.contacts.remove(contact_index);

        if wake_bodies {
            self.wake_body(body_a);
            self.wake_body(body_b);
        }
    }

    /// Destroys every contact of a body, optionally only those involving
    /// `other_body`.
    pub(crate) fn destroy_body_contacts(&mut self, body_index: usize, other_body: Option<usize>, wake_bodies: bool) {
        let contacts: Vec<usize> = self.bodies[body_index]
            .contacts
            .iter()
            .copied()
            .filter(|&c| {
                let contact = &self.contacts[c];
                other_body.map_or(true, |other| contact.body_a == other || contact.body_b == other)
            })
            .collect();
        for contact_index in contacts {
            self.destroy_contact(contact_index, wake_bodies);
        }
    }

    // Stepping.

    fn step_context(&self, time_step: f32, sub_step_count: usize) -> StepContext {
        let sub_step_count = sub_step_count.max(1);
        let dt = time_step;
        let h = dt / sub_step_count as f32;
        let inv_h = if h > 0.0 { 1.0 / h } else { 0.0 };

        // Contact stiffness is capped by the sub-step rate.
        let contact_hertz = self.contact_hertz.min(0.25 * inv_h);

        StepContext {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            h,
            inv_h,
            sub_step_count,
            gravity: self.gravity,
            joint_softness: make_soft(self.joint_hertz, self.joint_damping_ratio, h),
            contact_softness: make_soft(contact_hertz, self.contact_damping_ratio, h),
            static_softness: make_soft(2.0 * contact_hertz, self.contact_damping_ratio, h),
            restitution_threshold: self.restitution_threshold,
            max_linear_speed: self.maximum_linear_speed,
            contact_push_max_velocity: self.contact_push_max_velocity,
            enable_warm_starting: self.enable_warm_starting,
        }
    }

    /// Advances the world by `time_step` seconds using `sub_step_count`
    /// solver sub-steps. A zero time step only updates contacts. Events of
    /// the previous step are cleared.
    pub fn step(&mut self, time_step: f32, sub_step_count: usize) {
        if !time_step.is_finite() || time_step < 0.0 {
            warn!(time_step, "ignoring invalid time step");
            return;
        }

        let step_timer = Timer::new();
        let mut timer = Timer::new();
        self.events.begin_step();
        self.profile = Profile::default();
        self.task_count = 0;

        trace_span!("pairs").in_scope(|| self.update_pairs());
        self.profile.pairs = timer.milliseconds_and_reset();

        trace_span!("collide").in_scope(|| self.collide());
        self.profile.collide = timer.milliseconds_and_reset();

        if time_step > 0.0 {
            let context = self.step_context(time_step, sub_step_count);
            self.inv_h = context.inv_h;
            trace_span!("solve", sub_steps = context.sub_step_count).in_scope(|| self.solve(&context));
            self.profile.solve = timer.milliseconds_and_reset();
        }

        trace_span!("sensors").in_scope(|| self.update_sensors());
        self.profile.sensors = timer.milliseconds_and_reset();
        self.profile.step = step_timer.milliseconds();
    }

    /// Creates contacts for new broad-phase pairs.
    fn update_pairs(&mut self) {
        let filter = PairFilter {
            world0: self.id.index1 - 1,
            shapes: &self.shapes,
            bodies: &self.bodies,
            joints: &self.joints,
            pairs: &self.pairs,
            custom_filter: self.custom_filter.as_ref(),
        };
        let new_pairs = self.broad_phase.update_pairs(|a, b| filter.accept(a, b));
        if !new_pairs.is_empty() {
            debug!(count = new_pairs.len(), "new contact pairs");
        }
        for (shape_a, shape_b) in new_pairs {
            self.create_contact(shape_a, shape_b);
        }
    }

    /// Updates the manifold of every contact with a simulated body, then
    /// applies the resulting state changes in contact order.
    fn collide(&mut self) {
        let tasks = self.task_system();
        let world0 = self.world0();
        let enable_speculative = self.enable_speculative;
        let shapes = &self.shapes;
        let bodies = &self.bodies;
        let pre_solve = self.pre_solve.as_ref();

        let work: Vec<Mutex<(usize, &mut Contact, ContactUpdate)>> = self
            .contacts
            .iter_mut()
            .filter(|(_, c)| bodies[c.body_a].is_simulated() || bodies[c.body_b].is_simulated())
            .map(|(index, contact)| Mutex::new((index, contact, ContactUpdate::Unchanged)))
            .collect();

        let collide_range = |start: usize, end: usize, _worker: usize| {
            for item in &work[start..end] {
                let mut guard = item.lock();
                let (_, contact, update) = &mut *guard;
                let shape_a = &shapes[contact.shape_a];
                let shape_b = &shapes[contact.shape_b];

                if !shape_a.fat_aabb.overlaps(&shape_b.fat_aabb) {
                    *update = ContactUpdate::Disjoint;
                    continue;
                }

                let body_a = &bodies[contact.body_a];
                let body_b = &bodies[contact.body_b];
                let xf_a = body_a.transform;
                let xf_b = body_b.transform;
                let callback = pre_solve.map(|cb| {
                    (
                        cb,
                        ShapeId::new(contact.shape_a, world0, shape_a.generation),
                        ShapeId::new(contact.shape_b, world0, shape_b.generation),
                    )
                });
                *update = contact.update(
                    shape_a,
                    xf_a,
                    xf_a.q.rotate(body_a.local_center),
                    shape_b,
                    xf_b,
                    xf_b.q.rotate(body_b.local_center),
                    callback,
                    enable_speculative,
                );
            }
        };
        tasks.run_task(work.len(), 64, &collide_range);
        self.task_count += 1;

        let updates: Vec<(usize, ContactUpdate)> = work
            .into_iter()
            .map(|item| {
                let (index, _, update) = item.into_inner();
                (index, update)
            })
            .filter(|(_, update)| *update != ContactUpdate::Unchanged)
            .collect();

        for (contact_index, update) in updates {
            match update {
                ContactUpdate::Disjoint => self.destroy_contact(contact_index, false),
                ContactUpdate::StartedTouching => {
                    let contact = &self.contacts[contact_index];
                    let (body_a, body_b) = (contact.body_a, contact.body_b);
                    if contact.enable_contact_events {
                        let event = ContactBeginTouchEvent {
                            shape_id_a: self.shape_id(contact.shape_a),
                            shape_id_b: self.shape_id(contact.shape_b),
                            manifold: contact.manifold,
                        };
                        self.events.contact_begin.push(event);
                    }
                    self.link_contact(contact_index);
                    self.wake_body(body_a);
                    self.wake_body(body_b);
                }
                ContactUpdate::StoppedTouching => {
                    let contact = &self.contacts[contact_index];
                    if contact.enable_contact_events {
                        let event = ContactEndTouchEvent {
                            shape_id_a: self.shape_id(contact.shape_a),
                            shape_id_b: self.shape_id(contact.shape_b),
                        };
                        self.events.push_contact_end(event);
                    }
                    self.unlink_contact(contact_index);
                }
                ContactUpdate::Unchanged => {}
            }
        }
    }

    // World settings.

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Enables or disables sleeping. Disabling wakes every island.
    pub fn enable_sleeping(&mut self, flag: bool) {
        if flag == self.enable_sleep {
            return;
        }
        self.enable_sleep = flag;
        if !flag {
            let islands: Vec<usize> = self.islands.iter().map(|(id, _)| id).collect();
            for island_id in islands {
                self.wake_island(island_id);
            }
            let sleeping: Vec<usize> = self
                .bodies
                .iter()
                .filter(|(_, b)| !b.awake && b.island_id.is_none())
                .map(|(i, _)| i)
                .collect();
            for body_index in sleeping {
                self.wake_body(body_index);
            }
        }
    }

    pub fn is_sleeping_enabled(&self) -> bool {
        self.enable_sleep
    }

    pub fn enable_continuous(&mut self, flag: bool) {
        self.enable_continuous = flag;
    }

    pub fn is_continuous_enabled(&self) -> bool {
        self.enable_continuous
    }

    pub fn enable_warm_starting(&mut self, flag: bool) {
        self.enable_warm_starting = flag;
    }

    pub fn is_warm_starting_enabled(&self) -> bool {
        self.enable_warm_starting
    }

    /// Speculative contact points let the solver stop bodies before they
    /// touch. Disabling keeps only points within the linear slop.
    pub fn enable_speculative(&mut self, flag: bool) {
        self.enable_speculative = flag;
    }

    pub fn set_restitution_threshold(&mut self, value: f32) {
        self.restitution_threshold = value.max(0.0);
    }

    pub fn restitution_threshold(&self) -> f32 {
        self.restitution_threshold
    }

    pub fn set_hit_event_threshold(&mut self, value: f32) {
        self.hit_event_threshold = value.max(0.0);
    }

    pub fn hit_event_threshold(&self) -> f32 {
        self.hit_event_threshold
    }

    /// Adjusts contact stiffness, damping and the speed at which
    /// overlapping bodies are pushed apart.
    pub fn set_contact_tuning(&mut self, hertz: f32, damping_ratio: f32, push_speed: f32) {
        self.contact_hertz = hertz.max(0.0);
        self.contact_damping_ratio = damping_ratio.max(0.0);
        self.contact_push_max_velocity = push_speed.max(0.0);
    }

    pub fn set_joint_tuning(&mut self, hertz: f32, damping_ratio: f32) {
        self.joint_hertz = hertz.max(0.0);
        self.joint_damping_ratio = damping_ratio.max(0.0);
    }

    pub fn set_maximum_linear_speed(&mut self, speed: f32) {
        if speed > 0.0 && speed.is_finite() {
            self.maximum_linear_speed = speed;
        }
    }

    pub fn maximum_linear_speed(&self) -> f32 {
        self.maximum_linear_speed
    }

    /// Replaces the friction mixing rule used for new contacts.
    pub fn set_friction_callback(&mut self, callback: MixingFn) {
        self.friction_callback = callback;
    }

    /// Replaces the restitution mixing rule used for new contacts.
    pub fn set_restitution_callback(&mut self, callback: MixingFn) {
        self.restitution_callback = callback;
    }

    pub fn set_custom_filter_callback(&mut self, callback: Option<CustomFilterFn>) {
        self.custom_filter = callback;
    }

    pub fn set_pre_solve_callback(&mut self, callback: Option<PreSolveFn>) {
        self.pre_solve = callback;
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    // Events and statistics.

    pub fn body_events(&self) -> BodyEvents<'_> {
        self.events.body_events()
    }

    pub fn contact_events(&self) -> ContactEvents<'_> {
        self.events.contact_events()
    }

    pub fn sensor_events(&self) -> SensorEvents<'_> {
        self.events.sensor_events()
    }

    pub fn joint_events(&self) -> JointEvents<'_> {
        self.events.joint_events()
    }

    /// Stage timings of the last step.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn counters(&self) -> Counters {
        let trees = self.broad_phase.trees();
        Counters {
            body_count: self.bodies.len(),
            shape_count: self.shapes.len(),
            contact_count: self.contacts.len(),
            joint_count: self.joints.len(),
            island_count: self.islands.len(),
            static_tree_height: trees[0].height(),
            tree_height: trees[1].height().max(trees[2].height()),
            byte_count: self.byte_count(),
            task_count: self.task_count,
            color_counts: self.color_counts,
        }
    }

    /// Number of awake bodies, kinematic ones included.
    pub fn awake_body_count(&self) -> usize {
        self.bodies.iter().filter(|(_, b)| b.is_simulated()).count()
    }

    /// Rebuilds the static tree from scratch. Useful after creating many
    /// static shapes.
    pub fn rebuild_static_tree(&mut self) {
        self.broad_phase.rebuild_static_tree();
    }

    fn byte_count(&self) -> usize {
        use std::mem::size_of;
        self.broad_phase.byte_count()
            + self.bodies.capacity() * size_of::<Body>()
            + self.shapes.capacity() * size_of::<Shape>()
            + self.chains.capacity() * size_of::<Chain>()
            + self.joints.capacity() * size_of::<Joint>()
            + self.contacts.capacity() * size_of::<Contact>()
            + self.islands.capacity() * size_of::<Island>()
    }

    /// Logs the memory held by each object store.
    pub fn dump_memory_stats(&self) {
        use std::mem::size_of;
        info!(
            bodies = self.bodies.capacity() * size_of::<Body>(),
            shapes = self.shapes.capacity() * size_of::<Shape>(),
            chains = self.chains.capacity() * size_of::<Chain>(),
            joints = self.joints.capacity() * size_of::<Joint>(),
            contacts = self.contacts.capacity() * size_of::<Contact>(),
            islands = self.islands.capacity() * size_of::<Island>(),
            broad_phase = self.broad_phase.byte_count(),
            "world memory in bytes"
        );
    }
}

impl Drop for PhysicsWorld {
    fn drop(&mut self) {
        release_world_id(self.id);
        info!(world = self.id.index1, "world destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{BodyDef, ShapeDef};
    use crate::shapes::{make_box, Circle};
    use crate::world::world_is_valid;

    #[test]
    fn test_world_ids_are_reused_with_new_generation() {
        let world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let id = world.id();
        assert!(world_is_valid(id));
        drop(world);
        assert!(!world_is_valid(id));
    }

    #[test]
    fn test_handles_of_destroyed_world_stay_invalid() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let body = world.create_body(&BodyDef::dynamic()).expect("body");
        let shape = world
            .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape");
        drop(world);

        // Recreate until the same slot comes back. Other tests may hold it
        // for a while, in which case only the cross-slot check runs.
        let mut worlds = Vec::new();
        let reused = loop {
            match PhysicsWorld::new(&WorldDef::default()) {
                Ok(world) if world.world0() == body.world0 => break Some(world),
                Ok(world) => worlds.push(world),
                Err(_) => break None,
            }
        };
        let Some(mut world) = reused else {
            for world in &worlds {
                assert!(!world.body_is_valid(body));
            }
            return;
        };

        let fresh = world.create_body(&BodyDef::dynamic()).expect("fresh");
        world
            .create_shape(fresh, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("fresh shape");
        assert_eq!(fresh.index1, body.index1);
        assert_ne!(fresh, body);
        assert!(!world.body_is_valid(body));
        assert!(!world.shape_is_valid(shape));
        assert!(world.body_is_valid(fresh));
    }

    #[test]
    fn test_invalid_world_def_is_rejected() {
        let def = WorldDef {
            maximum_linear_speed: 0.0,
            ..Default::default()
        };
        assert_eq!(
            PhysicsWorld::new(&def).err(),
            Some(PhysicsError::InvalidDefinition("world definition"))
        );
    }

    #[test]
    fn test_contact_begins_and_ends() {
        let mut world = PhysicsWorld::new(&WorldDef {
            gravity: Vec2::ZERO,
            ..Default::default()
        })
        .expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        world
            .create_shape(ground, &ShapeDef::default(), make_box(5.0, 0.5))
            .expect("ground shape");

        let ball = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 0.99),
                ..BodyDef::dynamic()
            })
            .expect("ball");
        world
            .create_shape(ball, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("ball shape");

        world.step(1.0 / 60.0, 4);
        assert_eq!(world.contacts.len(), 1);
        assert_eq!(world.contact_events().begin_events.len(), 1);

        world.set_body_transform(ball, Vec2::new(0.0, 10.0), crate::math::Rot::IDENTITY).expect("move");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.contacts.len(), 0);
        assert_eq!(world.contact_events().end_events.len(), 1);
    }

    #[test]
    fn test_joint_without_collide_connected_blocks_pair() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let a = world.create_body(&BodyDef::dynamic()).expect("a");
        let b = world.create_body(&BodyDef::dynamic()).expect("b");
        world
            .create_shape(a, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape a");
        world
            .create_shape(b, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape b");
        let def = crate::constraints::RevoluteJointDef {
            base: crate::constraints::JointDefBase {
                body_a: a,
                body_b: b,
                ..Default::default()
            },
            ..Default::default()
        };
        world.create_revolute_joint(&def).expect("joint");
        world.step(1.0 / 60.0, 4);
        assert_eq!(world.contacts.len(), 0);
    }
}
