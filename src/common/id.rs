//! Opaque generational handles and the slot storage behind them.
//!
//! A handle is `{index1, generation}` where `index1` is the slot index plus
//! one, so the all-zero handle is the null handle. Destroying an object bumps
//! the generation of its slot; a stale handle then fails validation instead
//! of aliasing whatever object is created in that slot next.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// World handle.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldId {
    pub index1: u16,
    pub generation: u16,
}

impl WorldId {
    pub const NULL: WorldId = WorldId {
        index1: 0,
        generation: 0,
    };

    pub fn is_null(self) -> bool {
        self.index1 == 0
    }
}

macro_rules! world_object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            pub index1: i32,
            pub world0: u16,
            pub generation: u16,
        }

        impl $name {
            pub const NULL: $name = $name {
                index1: 0,
                world0: 0,
                generation: 0,
            };

            pub(crate) fn new(index: usize, world0: u16, generation: u16) -> Self {
                Self {
                    index1: index as i32 + 1,
                    world0,
                    generation,
                }
            }

            pub fn is_null(self) -> bool {
                self.index1 == 0
            }

            /// Packs the handle into a single word, e.g. for user data.
            pub fn store(self) -> u64 {
                ((self.index1 as u32 as u64) << 32)
                    | ((self.world0 as u64) << 16)
                    | self.generation as u64
            }

            /// Inverse of [`Self::store`].
            pub fn load(x: u64) -> Self {
                Self {
                    index1: (x >> 32) as u32 as i32,
                    world0: (x >> 16) as u16,
                    generation: x as u16,
                }
            }

            /// Zero based slot index. Only meaningful for non-null handles.
            pub(crate) fn index(self) -> usize {
                (self.index1 - 1) as usize
            }
        }
    };
}

world_object_id!(
    /// Body handle. Bodies of several worlds may coexist, so the handle also
    /// carries the zero based world index.
    BodyId
);
world_object_id!(
    /// Shape handle.
    ShapeId
);
world_object_id!(
    /// Joint handle.
    JointId
);
world_object_id!(
    /// Chain handle.
    ChainId
);

/// Allocates slot indices, always reusing the lowest free index first so that
/// allocation order is deterministic.
#[derive(Clone, Debug, Default)]
pub(crate) struct IdPool {
    free_ids: BinaryHeap<Reverse<usize>>,
    next_index: usize,
}

impl IdPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> usize {
        match self.free_ids.pop() {
            Some(Reverse(id)) => id,
            None => {
                let id = self.next_index;
                self.next_index += 1;
                id
            }
        }
    }

    pub fn free(&mut self, id: usize) {
        debug_assert!(id < self.next_index);
        self.free_ids.push(Reverse(id));
    }

    /// Number of live ids.
    pub fn len(&self) -> usize {
        self.next_index - self.free_ids.len()
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

/// Slot storage with per-slot generation counters.
#[derive(Clone, Debug)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    pool: IdPool,
    first_generation: u16,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::with_first_generation(0)
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena whose fresh slots start at `generation` instead of zero.
    pub fn with_first_generation(generation: u16) -> Self {
        Self {
            slots: Vec::new(),
            pool: IdPool::new(),
            first_generation: generation,
        }
    }

    /// Inserts a value and returns its `(index, generation)`.
    pub fn insert(&mut self, value: T) -> (usize, u16) {
        let index = self.pool.alloc();
        if index == self.slots.len() {
            self.slots.push(Slot {
                generation: self.first_generation,
                value: None,
            });
        }
        let slot = &mut self.slots[index];
        debug_assert!(slot.value.is_none());
        slot.value = Some(value);
        (index, slot.generation)
    }

    /// Removes the value at `index` and invalidates outstanding handles.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.pool.free(index);
        Some(value)
    }

    pub fn is_live(&self, index: usize, generation: u16) -> bool {
        matches!(self.slots.get(index), Some(slot) if slot.value.is_some() && slot.generation == generation)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(|slot| slot.value.as_mut())
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// One past the largest slot index in use.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_mut().map(|v| (i, v)))
    }
}

impl<T> std::ops::Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("arena slot {index} is empty"),
        }
    }
}

impl<T> std::ops::IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("arena slot {index} is empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_pool_reuses_lowest() {
        let mut pool = IdPool::new();
        let a = pool.alloc();
        let b = pool.alloc();
        let c = pool.alloc();
        assert_eq!((a, b, c), (0, 1, 2));
        pool.free(2);
        pool.free(0);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.alloc(), 0);
        assert_eq!(pool.alloc(), 2);
        assert_eq!(pool.alloc(), 3);
    }

    #[test]
    fn test_arena_generation_invalidates_stale_handles() {
        let mut arena = Arena::new();
        let (index, generation) = arena.insert("first");
        assert!(arena.is_live(index, generation));

        assert_eq!(arena.remove(index), Some("first"));
        assert!(!arena.is_live(index, generation));
        assert_eq!(arena.remove(index), None);

        let (index2, generation2) = arena.insert("second");
        assert_eq!(index2, index);
        assert_ne!(generation2, generation);
        assert!(!arena.is_live(index, generation));
        assert!(arena.is_live(index2, generation2));
        assert_eq!(arena.get(index2), Some(&"second"));
    }

    #[test]
    fn test_arena_first_generation() {
        let mut arena = Arena::with_first_generation(500);
        let (index, generation) = arena.insert(1);
        assert_eq!((index, generation), (0, 500));
        arena.remove(index);
        assert_eq!(arena.insert(2), (0, 501));
    }

    #[test]
    fn test_handle_store_load() {
        let id = BodyId::new(41, 3, 7);
        assert_eq!(id.index1, 42);
        assert_eq!(BodyId::load(id.store()), id);
        assert!(BodyId::NULL.is_null());
        assert!(!id.is_null());
    }
}
