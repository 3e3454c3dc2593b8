//! Broad-phase pair management on top of one dynamic tree per body type.
//!
//! Proxies are addressed by a proxy key that packs the tree proxy id with
//! the body type, so a key alone is enough to find the right tree. Proxies
//! that move are buffered and re-queried at the start of the next update to
//! find new overlapping pairs.

use std::collections::HashSet;

use crate::collision::aabb::AABB;
use crate::collision::dynamic_tree::DynamicTree;
use crate::objects::BodyType;

/// Packs a tree proxy id and the tree (body) type into one key.
#[inline]
pub fn make_proxy_key(proxy_id: usize, body_type: BodyType) -> usize {
    (proxy_id << 2) | body_type as usize
}

/// Tree the proxy lives in.
#[inline]
pub fn proxy_type(key: usize) -> BodyType {
    match key & 3 {
        0 => BodyType::Static,
        1 => BodyType::Kinematic,
        _ => BodyType::Dynamic,
    }
}

#[inline]
pub fn proxy_id(key: usize) -> usize {
    key >> 2
}

/// Order independent key for a pair of shape indices.
#[inline]
pub fn shape_pair_key(k1: usize, k2: usize) -> u64 {
    if k1 < k2 {
        ((k1 as u64) << 32) | k2 as u64
    } else {
        ((k2 as u64) << 32) | k1 as u64
    }
}

/// The broad-phase is used for computing pairs and performing volume queries
/// and ray casts. It does not persist pairs; the caller owns the contacts and
/// decides which candidate pairs become contacts.
#[derive(Debug, Default)]
pub struct BroadPhase {
    trees: [DynamicTree; 3],
    proxy_count: usize,

    // Proxies that moved since the last pair update, in insertion order.
    move_set: HashSet<usize>,
    move_array: Vec<usize>,
}

impl BroadPhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree(&self, body_type: BodyType) -> &DynamicTree {
        &self.trees[body_type as usize]
    }

    pub fn trees(&self) -> &[DynamicTree; 3] {
        &self.trees
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    pub fn move_count(&self) -> usize {
        self.move_array.len()
    }

    /// Create a proxy with an initial AABB. Pairs are not reported until
    /// [`BroadPhase::update_pairs`] is called. Static proxies are only
    /// buffered when `force_pair_creation` is set.
    pub fn create_proxy(
        &mut self,
        aabb: AABB,
        category_bits: u64,
        shape_index: usize,
        body_type: BodyType,
        force_pair_creation: bool,
    ) -> usize {
        let proxy_id = self.trees[body_type as usize].create_proxy(aabb, category_bits, shape_index as u64);
        let proxy_key = make_proxy_key(proxy_id, body_type);
        if body_type != BodyType::Static || force_pair_creation {
            self.buffer_move(proxy_key);
        }
        self.proxy_count += 1;
        proxy_key
    }

    pub fn destroy_proxy(&mut self, proxy_key: usize) {
        self.unbuffer_move(proxy_key);
        self.trees[proxy_type(proxy_key) as usize].destroy_proxy(proxy_id(proxy_key));
        self.proxy_count -= 1;
    }

    /// Reinserts a proxy with a new AABB, e.g. after a teleport.
    pub fn move_proxy(&mut self, proxy_key: usize, aabb: AABB) {
        self.trees[proxy_type(proxy_key) as usize].move_proxy(proxy_id(proxy_key), aabb);
        self.buffer_move(proxy_key);
    }

    /// Grows a proxy in place. The tree is repaired by the next rebuild.
    pub fn enlarge_proxy(&mut self, proxy_key: usize, aabb: AABB) {
        debug_assert!(proxy_type(proxy_key) != BodyType::Static);
        self.trees[proxy_type(proxy_key) as usize].enlarge_proxy(proxy_id(proxy_key), aabb);
        self.buffer_move(proxy_key);
    }

    pub fn set_category_bits(&mut self, proxy_key: usize, category_bits: u64) {
        self.trees[proxy_type(proxy_key) as usize].set_category_bits(proxy_id(proxy_key), category_bits);
    }

    pub fn fat_aabb(&self, proxy_key: usize) -> AABB {
        self.trees[proxy_type(proxy_key) as usize].fat_aabb(proxy_id(proxy_key))
    }

    /// Queue a proxy so its pairs are refreshed on the next update.
    pub fn buffer_move(&mut self, proxy_key: usize) {
        if self.move_set.insert(proxy_key) {
            self.move_array.push(proxy_key);
        }
    }

    fn unbuffer_move(&mut self, proxy_key: usize) {
        if self.move_set.remove(&proxy_key) {
            if let Some(index) = self.move_array.iter().position(|&k| k == proxy_key) {
                self.move_array.remove(index);
            }
        }
    }

    /// Incrementally rebuilds the trees of moving proxies.
    pub fn rebuild_trees(&mut self) {
        self.trees[BodyType::Dynamic as usize].rebuild(false);
        self.trees[BodyType::Kinematic as usize].rebuild(false);
    }

    pub fn rebuild_static_tree(&mut self) {
        self.trees[BodyType::Static as usize].rebuild(true);
    }

    /// Finds candidate pairs for every buffered move and clears the buffer.
    ///
    /// `accept(shape_a, shape_b)` filters candidates; it is where the caller
    /// rejects pairs that already have a contact or fail shape filtering.
    /// Returned pairs are unique and ordered by discovery, which depends
    /// only on the move order and tree layout.
    pub fn update_pairs<F>(&mut self, mut accept: F) -> Vec<(usize, usize)>
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut pairs = Vec::new();
        let mut seen = HashSet::new();

        for &query_key in &self.move_array {
            let query_type = proxy_type(query_key);
            let query_tree = &self.trees[query_type as usize];
            let query_proxy = proxy_id(query_key);
            let fat_aabb = query_tree.fat_aabb(query_proxy);
            let query_shape = query_tree.user_data(query_proxy) as usize;

            // Static and kinematic proxies only pair with dynamic ones.
            let tree_types: &[BodyType] = match query_type {
                BodyType::Dynamic => &[BodyType::Static, BodyType::Kinematic, BodyType::Dynamic],
                _ => &[BodyType::Dynamic],
            };

            for &tree_type in tree_types {
                self.trees[tree_type as usize].query(fat_aabb, u64::MAX, |proxy, user_data| {
                    let proxy_key = make_proxy_key(proxy, tree_type);
                    if proxy_key == query_key {
                        return true;
                    }

                    // Both proxies moved: report the pair once, from the lower key.
                    if proxy_key < query_key && self.move_set.contains(&proxy_key) {
                        return true;
                    }

                    let shape_index = user_data as usize;
                    let pair_key = shape_pair_key(query_shape, shape_index);
                    if seen.contains(&pair_key) {
                        return true;
                    }

                    let (shape_a, shape_b) = if query_shape < shape_index {
                        (query_shape, shape_index)
                    } else {
                        (shape_index, query_shape)
                    };

                    if accept(shape_a, shape_b) {
                        seen.insert(pair_key);
                        pairs.push((shape_a, shape_b));
                    }
                    true
                });
            }
        }

        self.move_set.clear();
        self.move_array.clear();

        pairs
    }

    /// Approximate memory used by the trees.
    pub fn byte_count(&self) -> usize {
        self.trees.iter().map(|t| t.byte_count()).sum::<usize>()
            + self.move_array.capacity() * std::mem::size_of::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn unit_box(x: f32, y: f32) -> AABB {
        AABB::from_center(Vec2::new(x, y), Vec2::new(0.5, 0.5))
    }

    #[test]
    fn test_proxy_key_round_trip() {
        let key = make_proxy_key(37, BodyType::Kinematic);
        assert_eq!(proxy_id(key), 37);
        assert_eq!(proxy_type(key), BodyType::Kinematic);
        assert_eq!(shape_pair_key(3, 9), shape_pair_key(9, 3));
    }

    #[test]
    fn test_pairs_reported_once() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(unit_box(0.0, 0.0), 1, 0, BodyType::Static, false);
        bp.create_proxy(unit_box(0.5, 0.0), 1, 1, BodyType::Dynamic, false);
        bp.create_proxy(unit_box(1.2, 0.0), 1, 2, BodyType::Dynamic, false);
        bp.create_proxy(unit_box(9.0, 0.0), 1, 3, BodyType::Dynamic, false);

        let mut pairs = bp.update_pairs(|_, _| true);
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);

        // Nothing moved since
        assert!(bp.update_pairs(|_, _| true).is_empty());
    }

    #[test]
    fn test_static_pairs_need_a_dynamic_partner() {
        let mut bp = BroadPhase::new();
        bp.create_proxy(unit_box(0.0, 0.0), 1, 0, BodyType::Static, true);
        bp.create_proxy(unit_box(0.2, 0.0), 1, 1, BodyType::Static, true);
        bp.create_proxy(unit_box(0.4, 0.0), 1, 2, BodyType::Kinematic, false);
        assert!(bp.update_pairs(|_, _| true).is_empty());
    }

    #[test]
    fn test_filter_and_destroy() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(unit_box(0.0, 0.0), 1, 0, BodyType::Dynamic, false);
        bp.create_proxy(unit_box(0.5, 0.0), 1, 1, BodyType::Dynamic, false);
        assert!(bp.update_pairs(|_, _| false).is_empty());

        bp.move_proxy(a, unit_box(0.25, 0.0));
        assert_eq!(bp.update_pairs(|_, _| true), vec![(0, 1)]);

        bp.destroy_proxy(a);
        assert_eq!(bp.proxy_count(), 1);
        assert!(bp.tree(BodyType::Dynamic).validate());
    }
}
