//! Persistent islands of dynamic bodies connected by touching contacts and
//! joints. Islands sleep and wake as a unit.
//!
//! Linking merges islands immediately. Unlinking only counts the removed
//! constraint; the island is split lazily, when it is about to fall
//! asleep, because most islands never need the split.

use std::collections::HashSet;

use tracing::debug;

use super::physics_world::PhysicsWorld;
use crate::math::Vec2;

#[derive(Debug, Clone, Default)]
pub(crate) struct Island {
    pub bodies: Vec<usize>,
    pub contacts: Vec<usize>,
    pub joints: Vec<usize>,
    /// Constraints removed since the island was built. A non-zero count
    /// means the island may be splittable.
    pub constraint_remove_count: usize,
    pub awake: bool,
}

fn remove_item(items: &mut Vec<usize>, item: usize) {
    if let Some(position) = items.iter().position(|&i| i == item) {
        items.swap_remove(position);
    }
}

impl PhysicsWorld {
    /// Gives a dynamic body its own island.
    pub(crate) fn create_island_for_body(&mut self, body_index: usize) {
        let awake = self.bodies[body_index].awake;
        let (island_id, _) = self.islands.insert(Island {
            bodies: vec![body_index],
            awake,
            ..Default::default()
        });
        self.bodies[body_index].island_id = Some(island_id);
    }

    /// Removes a body whose constraints were already unlinked.
    pub(crate) fn remove_body_from_island(&mut self, body_index: usize) {
        let Some(island_id) = self.bodies[body_index].island_id.take() else {
            return;
        };
        let empty = match self.islands.get_mut(island_id) {
            Some(island) => {
                remove_item(&mut island.bodies, body_index);
                island.bodies.is_empty()
            }
            None => false,
        };
        if empty {
            self.islands.remove(island_id);
        }
    }

    /// Wakes every body of an island.
    pub(crate) fn wake_island(&mut self, island_id: usize) {
        let Some(island) = self.islands.get_mut(island_id) else {
            return;
        };
        if island.awake {
            return;
        }
        island.awake = true;
        for &body_index in &island.bodies {
            let body = &mut self.bodies[body_index];
            body.awake = true;
            body.sleep_time = 0.0;
        }
    }

    /// Wakes a body. Dynamic bodies wake their whole island.
    pub(crate) fn wake_body(&mut self, body_index: usize) {
        let body = &mut self.bodies[body_index];
        if body.is_static() {
            return;
        }
        body.sleep_time = 0.0;
        match body.island_id {
            Some(island_id) => self.wake_island(island_id),
            None => body.awake = true,
        }
    }

    /// Puts an island to sleep. Velocities are cleared, as a body always
    /// wakes up at rest.
    pub(crate) fn sleep_island(&mut self, island_id: usize) {
        let Some(island) = self.islands.get_mut(island_id) else {
            return;
        };
        island.awake = false;
        for &body_index in &island.bodies {
            let body = &mut self.bodies[body_index];
            body.awake = false;
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
            body.force = Vec2::ZERO;
            body.torque = 0.0;
            if let Some(event) = body.move_event_index.and_then(|i| self.events.body_moves.get_mut(i)) {
                event.fell_asleep = true;
            }
        }
        debug!(island_id, body_count = island.bodies.len(), "island fell asleep");
    }

    /// Moves the smaller island into the larger one and returns the
    /// surviving island.
    fn merge_islands(&mut self, island_a: usize, island_b: usize) -> usize {
        let size_a = self.islands.get(island_a).map_or(0, |i| i.bodies.len());
        let size_b = self.islands.get(island_b).map_or(0, |i| i.bodies.len());
        let (big, small) = if size_a >= size_b {
            (island_a, island_b)
        } else {
            (island_b, island_a)
        };

        let Some(small_island) = self.islands.remove(small) else {
            return big;
        };
        for &body_index in &small_island.bodies {
            self.bodies[body_index].island_id = Some(big);
        }
        for &contact_index in &small_island.contacts {
            self.contacts[contact_index].island = Some(big);
        }
        for &joint_index in &small_island.joints {
            self.joints[joint_index].island = Some(big);
        }

        let island = &mut self.islands[big];
        island.bodies.extend_from_slice(&small_island.bodies);
        island.contacts.extend_from_slice(&small_island.contacts);
        island.joints.extend_from_slice(&small_island.joints);
        island.constraint_remove_count += small_island.constraint_remove_count;
        big
    }

    /// Joins the islands of two dynamic bodies, waking a sleeping side.
    /// Returns the island both bodies now share, or `None` when either body
    /// does not take part in islands.
    fn link_bodies(&mut self, body_a: usize, body_b: usize) -> Option<usize> {
        let island_a = self.bodies[body_a].island_id?;
        let island_b = self.bodies[body_b].island_id?;

        if !self.bodies[body_a].awake || !self.bodies[body_b].awake {
            self.wake_island(island_a);
            self.wake_island(island_b);
        }

        if island_a == island_b {
            Some(island_a)
        } else {
            Some(self.merge_islands(island_a, island_b))
        }
    }

    /// Links a touching contact between two dynamic bodies.
    pub(crate) fn link_contact(&mut self, contact_index: usize) {
        let contact = &self.contacts[contact_index];
        if contact.island.is_some() || !contact.touching {
            return;
        }
        let (body_a, body_b) = (contact.body_a, contact.body_b);
        if !self.bodies[body_a].is_dynamic() || !self.bodies[body_b].is_dynamic() {
            return;
        }

        if let Some(island_id) = self.link_bodies(body_a, body_b) {
            self.islands[island_id].contacts.push(contact_index);
            self.contacts[contact_index].island = Some(island_id);
        }
    }

    pub(crate) fn unlink_contact(&mut self, contact_index: usize) {
        let Some(island_id) = self.contacts[contact_index].island.take() else {
            return;
        };
        if let Some(island) = self.islands.get_mut(island_id) {
            remove_item(&mut island.contacts, contact_index);
            island.constraint_remove_count += 1;
        }
    }

    /// Links a joint between two dynamic bodies.
    pub(crate) fn link_joint(&mut self, joint_index: usize) {
        let joint = &self.joints[joint_index];
        if joint.island.is_some() {
            return;
        }
        let (body_a, body_b) = (joint.body_a, joint.body_b);
        if !self.bodies[body_a].is_dynamic() || !self.bodies[body_b].is_dynamic() {
            return;
        }

        if let Some(island_id) = self.link_bodies(body_a, body_b) {
            self.islands[island_id].joints.push(joint_index);
            self.joints[joint_index].island = Some(island_id);
        }
    }

    pub(crate) fn unlink_joint(&mut self, joint_index: usize) {
        let Some(island_id) = self.joints[joint_index].island.take() else {
            return;
        };
        if let Some(island) = self.islands.get_mut(island_id) {
            remove_item(&mut island.joints, joint_index);
            island.constraint_remove_count += 1;
        }
    }

    /// Rebuilds an island into its connected components with a depth first
    /// search over linked contacts and joints.
    pub(crate) fn split_island(&mut self, island_id: usize) {
        let Some(island) = self.islands.remove(island_id) else {
            return;
        };

        let mut visited_bodies = HashSet::new();
        let mut visited_contacts = HashSet::new();
        let mut visited_joints = HashSet::new();
        let mut components = Vec::new();
        let mut stack = Vec::new();

        for &seed in &island.bodies {
            if !visited_bodies.insert(seed) {
                continue;
            }

            let mut component = Island {
                awake: island.awake,
                ..Default::default()
            };
            stack.push(seed);
            while let Some(body_index) = stack.pop() {
                component.bodies.push(body_index);
                let body = &self.bodies[body_index];

                for &contact_index in &body.contacts {
                    let contact = &self.contacts[contact_index];
                    if contact.island.is_none() || !visited_contacts.insert(contact_index) {
                        continue;
                    }
                    component.contacts.push(contact_index);
                    let other = if contact.body_a == body_index {
                        contact.body_b
                    } else {
                        contact.body_a
                    };
                    if visited_bodies.insert(other) {
                        stack.push(other);
                    }
                }

                for &joint_index in &body.joints {
                    let joint = &self.joints[joint_index];
                    if joint.island.is_none() || !visited_joints.insert(joint_index) {
                        continue;
                    }
                    component.joints.push(joint_index);
                    let other = if joint.body_a == body_index {
                        joint.body_b
                    } else {
                        joint.body_a
                    };
                    if visited_bodies.insert(other) {
                        stack.push(other);
                    }
                }
            }
            components.push(component);
        }

        debug!(island_id, pieces = components.len(), "split island");

        for component in components {
            let bodies = component.bodies.clone();
            let contacts = component.contacts.clone();
            let joints = component.joints.clone();
            let (new_id, _) = self.islands.insert(component);
            for body_index in bodies {
                self.bodies[body_index].island_id = Some(new_id);
            }
            for contact_index in contacts {
                self.contacts[contact_index].island = Some(new_id);
            }
            for joint_index in joints {
                self.joints[joint_index].island = Some(new_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::common::BodyId;
    use crate::constraints::{DistanceJointDef, JointDefBase};
    use crate::math::Vec2;
    use crate::objects::BodyDef;
    use crate::world::{PhysicsWorld, WorldDef};

    fn dynamic_at(world: &mut PhysicsWorld, x: f32) -> BodyId {
        let def = BodyDef {
            position: Vec2::new(x, 0.0),
            ..BodyDef::dynamic()
        };
        world.create_body(&def).expect("body")
    }

    fn connect(world: &mut PhysicsWorld, a: BodyId, b: BodyId) -> crate::common::JointId {
        let def = DistanceJointDef {
            base: JointDefBase {
                body_a: a,
                body_b: b,
                ..Default::default()
            },
            length: 1.0,
            ..Default::default()
        };
        world.create_distance_joint(&def).expect("joint")
    }

    #[test]
    fn test_joints_merge_and_split_islands() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let a = dynamic_at(&mut world, 0.0);
        let b = dynamic_at(&mut world, 1.0);
        let c = dynamic_at(&mut world, 2.0);
        assert_eq!(world.islands.len(), 3);

        let ab = connect(&mut world, a, b);
        let _bc = connect(&mut world, b, c);
        assert_eq!(world.islands.len(), 1);
        let island = world.bodies[a.index()].island_id;
        assert_eq!(world.bodies[c.index()].island_id, island);

        world.destroy_joint(ab).expect("destroy");
        let island_id = world.bodies[b.index()].island_id.expect("island");
        assert_eq!(world.islands[island_id].constraint_remove_count, 1);

        world.split_island(island_id);
        assert_eq!(world.islands.len(), 2);
        assert_ne!(world.bodies[a.index()].island_id, world.bodies[b.index()].island_id);
        assert_eq!(world.bodies[b.index()].island_id, world.bodies[c.index()].island_id);
    }

    #[test]
    fn test_sleep_and_wake_whole_island() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let a = dynamic_at(&mut world, 0.0);
        let b = dynamic_at(&mut world, 1.0);
        connect(&mut world, a, b);

        world.set_body_awake(a, false).expect("sleep");
        assert!(!world.body_is_awake(b).expect("b"));

        world.set_body_awake(b, true).expect("wake");
        assert!(world.body_is_awake(a).expect("a"));
    }
}
