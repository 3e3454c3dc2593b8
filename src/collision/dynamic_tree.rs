//! Dynamic bounding volume hierarchy used by the broad-phase and by user
//! queries.
//!
//! Leaves hold user supplied boxes (usually already fattened). Internal nodes
//! store the union of their children together with the union of their
//! category bits so traversals can prune by both.

use crate::collision::aabb::AABB;
use crate::collision::cast::{RayCastInput, ShapeCastInput};
use crate::common::constants::DEFAULT_CATEGORY_BITS;
use crate::math::Vec2;

/// Null node or proxy index.
pub const NULL_NODE: usize = usize::MAX;

const ALLOCATED_NODE: u16 = 0x0001;
const ENLARGED_NODE: u16 = 0x0002;
const LEAF_NODE: u16 = 0x0004;

const BIN_COUNT: usize = 64;

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    /// The node bounding box.
    aabb: AABB,
    /// Category bits for collision filtering.
    category_bits: u64,
    /// Parent index while allocated, next free index while in the pool.
    parent_or_next: usize,
    child1: usize,
    child2: usize,
    /// User data, leaves only.
    user_data: u64,
    /// Leaf = 0, free node = -1 is represented by the flags instead.
    height: u16,
    flags: u16,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self {
            aabb: AABB::default(),
            category_bits: DEFAULT_CATEGORY_BITS,
            parent_or_next: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            user_data: u64::MAX,
            height: 0,
            flags: ALLOCATED_NODE,
        }
    }
}

impl TreeNode {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.flags & LEAF_NODE != 0
    }

    #[inline]
    fn is_allocated(&self) -> bool {
        self.flags & ALLOCATED_NODE != 0
    }

    #[inline]
    fn is_enlarged(&self) -> bool {
        self.flags & ENLARGED_NODE != 0
    }
}

/// Traversal counters returned by the tree queries.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Number of internal nodes visited during the query.
    pub node_visits: usize,
    /// Number of leaf nodes visited during the query.
    pub leaf_visits: usize,
}

impl std::ops::AddAssign for TreeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.node_visits += rhs.node_visits;
        self.leaf_visits += rhs.leaf_visits;
    }
}

#[derive(Debug, Clone, Copy)]
struct RebuildItem {
    node_index: usize,
    child_count: i32,
    // Leaf indices
    start_index: usize,
    split_index: usize,
    end_index: usize,
}

/// The dynamic tree structure. This should be considered private data.
#[derive(Debug, Clone)]
pub struct DynamicTree {
    nodes: Vec<TreeNode>,
    root: usize,
    node_count: usize,
    free_list: usize,
    proxy_count: usize,

    // Scratch space for rebuilds
    leaf_indices: Vec<usize>,
    leaf_boxes: Vec<AABB>,
    bin_indices: Vec<usize>,
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicTree {
    /// Constructing the tree initializes the node pool.
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(16),
            root: NULL_NODE,
            node_count: 0,
            free_list: NULL_NODE,
            proxy_count: 0,
            leaf_indices: Vec::new(),
            leaf_boxes: Vec::new(),
            bin_indices: Vec::new(),
        }
    }

    fn allocate_node(&mut self) -> usize {
        let index = if self.free_list == NULL_NODE {
            self.nodes.push(TreeNode::default());
            self.nodes.len() - 1
        } else {
            let index = self.free_list;
            self.free_list = self.nodes[index].parent_or_next;
            self.nodes[index] = TreeNode::default();
            index
        };
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, node_id: usize) {
        debug_assert!(node_id < self.nodes.len());
        debug_assert!(self.node_count > 0);
        let node = &mut self.nodes[node_id];
        node.parent_or_next = self.free_list;
        node.flags = 0;
        self.free_list = node_id;
        self.node_count -= 1;
    }

    // Greedy algorithm for sibling selection using the SAH. This has
    // branch-and-bound pruning so it can skip subtrees that cannot beat
    // the best cost found so far.
    fn find_best_sibling(&self, box_d: AABB) -> usize {
        let center_d = box_d.center();
        let area_d = box_d.perimeter();

        let nodes = &self.nodes;
        let root_index = self.root;

        let root_box = nodes[root_index].aabb;

        // Area of current node
        let mut area_base = root_box.perimeter();

        // Area of inflated node
        let mut direct_cost = root_box.union(&box_d).perimeter();
        let mut inherited_cost = 0.0;

        let mut best_sibling = root_index;
        let mut best_cost = direct_cost;

        // Descend the tree from root, following a single greedy path.
        let mut index = root_index;
        while nodes[index].height > 0 {
            let child1 = nodes[index].child1;
            let child2 = nodes[index].child2;

            // Cost of creating a new parent for this node and the new leaf
            let cost = direct_cost + inherited_cost;

            // Sometimes there are multiple identical costs within tolerance.
            // This breaks the ties using the centroid distance.
            if cost < best_cost {
                best_sibling = index;
                best_cost = cost;
            }

            // Inheritance cost seen by children
            inherited_cost += direct_cost - area_base;

            let leaf1 = nodes[child1].height == 0;
            let leaf2 = nodes[child2].height == 0;

            // Cost of descending into child 1
            let mut lower_cost1 = f32::MAX;
            let box1 = nodes[child1].aabb;
            let direct_cost1 = box1.union(&box_d).perimeter();
            let mut area1 = 0.0;
            if leaf1 {
                // Child 1 is a leaf
                // Cost of creating new node and increasing area of node P
                let cost1 = direct_cost1 + inherited_cost;

                // Need this here due to while condition above
                if cost1 < best_cost {
                    best_sibling = child1;
                    best_cost = cost1;
                }
            } else {
                // Child 1 is an internal node
                area1 = box1.perimeter();

                // Lower bound cost of inserting under child 1.
                lower_cost1 = inherited_cost + direct_cost1 + (area_d - area1).min(0.0);
            }

            // Cost of descending into child 2
            let mut lower_cost2 = f32::MAX;
            let box2 = nodes[child2].aabb;
            let direct_cost2 = box2.union(&box_d).perimeter();
            let mut area2 = 0.0;
            if leaf2 {
                let cost2 = direct_cost2 + inherited_cost;
                if cost2 < best_cost {
                    best_sibling = child2;
                    best_cost = cost2;
                }
            } else {
                area2 = box2.perimeter();
                lower_cost2 = inherited_cost + direct_cost2 + (area_d - area2).min(0.0);
            }

            if leaf1 && leaf2 {
                break;
            }

            // Can the cost possibly be decreased?
            if best_cost <= lower_cost1 && best_cost <= lower_cost2 {
                break;
            }

            if lower_cost1 == lower_cost2 && !leaf1 {
                // No clear choice based on lower bound surface area. This can
                // happen when both children fully contain D. Fall back to
                // node distance.
                lower_cost1 = (box1.center() - center_d).length_squared();
                lower_cost2 = (box2.center() - center_d).length_squared();
            }

            // Descend
            if lower_cost1 < lower_cost2 && !leaf1 {
                index = child1;
                area_base = area1;
                direct_cost = direct_cost1;
            } else {
                index = child2;
                area_base = area2;
                direct_cost = direct_cost2;
            }
        }

        best_sibling
    }

    // Perform a left or right rotation if node A is imbalanced.
    fn rotate_nodes(&mut self, i_a: usize) {
        debug_assert!(i_a != NULL_NODE);

        if self.nodes[i_a].height < 2 {
            return;
        }

        let i_b = self.nodes[i_a].child1;
        let i_c = self.nodes[i_a].child2;
        debug_assert!(i_b != NULL_NODE && i_c != NULL_NODE);

        let b = self.nodes[i_b];
        let c = self.nodes[i_c];

        if b.height == 0 {
            // B is a leaf and C is internal
            debug_assert!(c.height > 0);

            let i_f = c.child1;
            let i_g = c.child2;
            let f = self.nodes[i_f];
            let g = self.nodes[i_g];

            // Base cost
            let cost_base = c.aabb.perimeter();

            // Cost of swapping B and F
            let aabb_bg = b.aabb.union(&g.aabb);
            let cost_bf = aabb_bg.perimeter();

            // Cost of swapping B and G
            let aabb_bf = b.aabb.union(&f.aabb);
            let cost_bg = aabb_bf.perimeter();

            if cost_base < cost_bf && cost_base < cost_bg {
                // Rotation does not improve cost
                return;
            }

            if cost_bf < cost_bg {
                self.swap_into(i_a, true, i_f, i_c, true, i_b, aabb_bg, i_g);
            } else {
                self.swap_into(i_a, true, i_g, i_c, false, i_b, aabb_bf, i_f);
            }
        } else if c.height == 0 {
            // C is a leaf and B is internal
            let i_d = b.child1;
            let i_e = b.child2;
            let d = self.nodes[i_d];
            let e = self.nodes[i_e];

            // Base cost
            let cost_base = b.aabb.perimeter();

            // Cost of swapping C and D
            let aabb_ce = c.aabb.union(&e.aabb);
            let cost_cd = aabb_ce.perimeter();

            // Cost of swapping C and E
            let aabb_cd = c.aabb.union(&d.aabb);
            let cost_ce = aabb_cd.perimeter();

            if cost_base < cost_cd && cost_base < cost_ce {
                // Rotation does not improve cost
                return;
            }

            if cost_cd < cost_ce {
                self.swap_into(i_a, false, i_d, i_b, true, i_c, aabb_ce, i_e);
            } else {
                self.swap_into(i_a, false, i_e, i_b, false, i_c, aabb_cd, i_d);
            }
        } else {
            let i_d = b.child1;
            let i_e = b.child2;
            let i_f = c.child1;
            let i_g = c.child2;

            let d = self.nodes[i_d];
            let e = self.nodes[i_e];
            let f = self.nodes[i_f];
            let g = self.nodes[i_g];

            // Base cost
            let area_b = b.aabb.perimeter();
            let area_c = c.aabb.perimeter();
            let cost_base = area_b + area_c;

            #[derive(PartialEq)]
            enum Rotate {
                None,
                BF,
                BG,
                CD,
                CE,
            }

            let mut best_rotation = Rotate::None;
            let mut best_cost = cost_base;

            // Cost of swapping B and F
            let aabb_bg = b.aabb.union(&g.aabb);
            let cost_bf = area_b + aabb_bg.perimeter();
            if cost_bf < best_cost {
                best_rotation = Rotate::BF;
                best_cost = cost_bf;
            }

            // Cost of swapping B and G
            let aabb_bf = b.aabb.union(&f.aabb);
            let cost_bg = area_b + aabb_bf.perimeter();
            if cost_bg < best_cost {
                best_rotation = Rotate::BG;
                best_cost = cost_bg;
            }

            // Cost of swapping C and D
            let aabb_ce = c.aabb.union(&e.aabb);
            let cost_cd = area_c + aabb_ce.perimeter();
            if cost_cd < best_cost {
                best_rotation = Rotate::CD;
                best_cost = cost_cd;
            }

            // Cost of swapping C and E
            let aabb_cd = c.aabb.union(&d.aabb);
            let cost_ce = area_c + aabb_cd.perimeter();
            if cost_ce < best_cost {
                best_rotation = Rotate::CE;
            }

            match best_rotation {
                Rotate::None => {}
                Rotate::BF => self.swap_into(i_a, true, i_f, i_c, true, i_b, aabb_bg, i_g),
                Rotate::BG => self.swap_into(i_a, true, i_g, i_c, false, i_b, aabb_bf, i_f),
                Rotate::CD => self.swap_into(i_a, false, i_d, i_b, true, i_c, aabb_ce, i_e),
                Rotate::CE => self.swap_into(i_a, false, i_e, i_b, false, i_c, aabb_cd, i_d),
            }
        }
    }

    /// Swaps a child of A with a grandchild on the other side.
    ///
    /// `grandchild` moves up to become child 1 (or 2) of `a`, `moved` moves
    /// down into `parent` (the other child of `a`) replacing the grandchild.
    /// `remaining` is the grandchild that stays under `parent`, which gets
    /// `parent_aabb` as its new bounds.
    #[allow(clippy::too_many_arguments)]
    fn swap_into(
        &mut self,
        i_a: usize,
        a_child1: bool,
        grandchild: usize,
        parent: usize,
        parent_child1: bool,
        moved: usize,
        parent_aabb: AABB,
        remaining: usize,
    ) {
        if a_child1 {
            self.nodes[i_a].child1 = grandchild;
        } else {
            self.nodes[i_a].child2 = grandchild;
        }
        if parent_child1 {
            self.nodes[parent].child1 = moved;
        } else {
            self.nodes[parent].child2 = moved;
        }

        self.nodes[moved].parent_or_next = parent;
        self.nodes[grandchild].parent_or_next = i_a;

        let moved_node = self.nodes[moved];
        let remaining_node = self.nodes[remaining];
        {
            let p = &mut self.nodes[parent];
            p.aabb = parent_aabb;
            p.height = 1 + moved_node.height.max(remaining_node.height);
            p.category_bits = moved_node.category_bits | remaining_node.category_bits;
            p.flags |= (moved_node.flags | remaining_node.flags) & ENLARGED_NODE;
        }

        let parent_node = self.nodes[parent];
        let grandchild_node = self.nodes[grandchild];
        let a = &mut self.nodes[i_a];
        a.height = 1 + parent_node.height.max(grandchild_node.height);
        a.category_bits = parent_node.category_bits | grandchild_node.category_bits;
        a.flags |= (parent_node.flags | grandchild_node.flags) & ENLARGED_NODE;
    }

    fn insert_leaf(&mut self, leaf: usize, should_rotate: bool) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf].parent_or_next = NULL_NODE;
            return;
        }

        // Stage 1: find the best sibling for this node
        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = self.find_best_sibling(leaf_aabb);

        // Stage 2: create a new parent for the leaf and sibling
        let old_parent = self.nodes[sibling].parent_or_next;
        let new_parent = self.allocate_node();

        {
            let sibling_node = self.nodes[sibling];
            let leaf_bits = self.nodes[leaf].category_bits;
            let node = &mut self.nodes[new_parent];
            node.parent_or_next = old_parent;
            node.user_data = u64::MAX;
            node.aabb = leaf_aabb.union(&sibling_node.aabb);
            node.category_bits = leaf_bits | sibling_node.category_bits;
            node.height = sibling_node.height + 1;
            node.child1 = sibling;
            node.child2 = leaf;
        }

        if old_parent != NULL_NODE {
            // The sibling was not the root.
            if self.nodes[old_parent].child1 == sibling {
                self.nodes[old_parent].child1 = new_parent;
            } else {
                self.nodes[old_parent].child2 = new_parent;
            }
        } else {
            // The sibling was the root.
            self.root = new_parent;
        }
        self.nodes[sibling].parent_or_next = new_parent;
        self.nodes[leaf].parent_or_next = new_parent;

        // Stage 3: walk back up the tree fixing heights and AABBs
        let mut index = self.nodes[leaf].parent_or_next;
        while index != NULL_NODE {
            let child1 = self.nodes[index].child1;
            let child2 = self.nodes[index].child2;
            debug_assert!(child1 != NULL_NODE && child2 != NULL_NODE);

            let c1 = self.nodes[child1];
            let c2 = self.nodes[child2];
            let node = &mut self.nodes[index];
            node.aabb = c1.aabb.union(&c2.aabb);
            node.category_bits = c1.category_bits | c2.category_bits;
            node.height = 1 + c1.height.max(c2.height);
            node.flags |= (c1.flags | c2.flags) & ENLARGED_NODE;

            if should_rotate {
                self.rotate_nodes(index);
            }

            index = self.nodes[index].parent_or_next;
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf].parent_or_next;
        let grand_parent = self.nodes[parent].parent_or_next;
        let sibling = if self.nodes[parent].child1 == leaf {
            self.nodes[parent].child2
        } else {
            self.nodes[parent].child1
        };

        if grand_parent != NULL_NODE {
            // Destroy parent and connect sibling to grand_parent.
            if self.nodes[grand_parent].child1 == parent {
                self.nodes[grand_parent].child1 = sibling;
            } else {
                self.nodes[grand_parent].child2 = sibling;
            }
            self.nodes[sibling].parent_or_next = grand_parent;
            self.free_node(parent);

            // Adjust ancestor bounds.
            let mut index = grand_parent;
            while index != NULL_NODE {
                let c1 = self.nodes[self.nodes[index].child1];
                let c2 = self.nodes[self.nodes[index].child2];
                let node = &mut self.nodes[index];
                node.aabb = c1.aabb.union(&c2.aabb);
                node.category_bits = c1.category_bits | c2.category_bits;
                node.height = 1 + c1.height.max(c2.height);

                index = node.parent_or_next;
            }
        } else {
            self.root = sibling;
            self.nodes[sibling].parent_or_next = NULL_NODE;
            self.free_node(parent);
        }
    }

    /// Create a proxy. Provide an AABB and a user data value.
    pub fn create_proxy(&mut self, aabb: AABB, category_bits: u64, user_data: u64) -> usize {
        debug_assert!(aabb.is_valid());

        let proxy_id = self.allocate_node();
        {
            let node = &mut self.nodes[proxy_id];
            node.aabb = aabb;
            node.user_data = user_data;
            node.category_bits = category_bits;
            node.height = 0;
            node.flags = ALLOCATED_NODE | LEAF_NODE;
        }

        self.insert_leaf(proxy_id, true);
        self.proxy_count += 1;
        proxy_id
    }

    /// Destroy a proxy. This asserts if the id is invalid.
    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        debug_assert!(proxy_id < self.nodes.len());
        debug_assert!(self.nodes[proxy_id].is_leaf());

        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);

        debug_assert!(self.proxy_count > 0);
        self.proxy_count -= 1;
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Move a proxy to a new AABB by removing and reinserting into the tree.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: AABB) {
        debug_assert!(aabb.is_valid());
        debug_assert!(self.nodes[proxy_id].is_leaf());

        self.remove_leaf(proxy_id);

        self.nodes[proxy_id].aabb = aabb;

        self.insert_leaf(proxy_id, false);
    }

    /// Enlarge a proxy and enlarge ancestors as necessary. Ancestors are
    /// flagged so the next incremental rebuild can fix them.
    pub fn enlarge_proxy(&mut self, proxy_id: usize, aabb: AABB) {
        debug_assert!(aabb.is_valid());
        debug_assert!(self.nodes[proxy_id].is_leaf());

        // Caller must ensure this
        debug_assert!(!self.nodes[proxy_id].aabb.contains(&aabb));

        self.nodes[proxy_id].aabb = aabb;

        let mut parent_index = self.nodes[proxy_id].parent_or_next;
        while parent_index != NULL_NODE {
            let changed = self.nodes[parent_index].aabb.enlarge(&aabb);
            self.nodes[parent_index].flags |= ENLARGED_NODE;
            parent_index = self.nodes[parent_index].parent_or_next;

            if !changed {
                break;
            }
        }

        while parent_index != NULL_NODE {
            if self.nodes[parent_index].is_enlarged() {
                // early out because this ancestor was previously ascended and marked as enlarged
                break;
            }

            self.nodes[parent_index].flags |= ENLARGED_NODE;
            parent_index = self.nodes[parent_index].parent_or_next;
        }
    }

    /// Modify the category bits on a proxy. This is an expensive operation.
    pub fn set_category_bits(&mut self, proxy_id: usize, category_bits: u64) {
        debug_assert!(self.nodes[proxy_id].is_leaf());

        self.nodes[proxy_id].category_bits = category_bits;

        // Fix up category bits in ancestor internal nodes
        let mut node_index = self.nodes[proxy_id].parent_or_next;
        while node_index != NULL_NODE {
            let child1 = self.nodes[node_index].child1;
            let child2 = self.nodes[node_index].child2;
            self.nodes[node_index].category_bits = self.nodes[child1].category_bits | self.nodes[child2].category_bits;
            node_index = self.nodes[node_index].parent_or_next;
        }
    }

    pub fn category_bits(&self, proxy_id: usize) -> u64 {
        self.nodes[proxy_id].category_bits
    }

    pub fn user_data(&self, proxy_id: usize) -> u64 {
        self.nodes[proxy_id].user_data
    }

    /// Get the fat AABB for a proxy.
    pub fn fat_aabb(&self, proxy_id: usize) -> AABB {
        self.nodes[proxy_id].aabb
    }

    /// Query an AABB for overlapping proxies. The callback is called for each
    /// proxy that overlaps the supplied AABB and passes the mask. Return
    /// false from the callback to stop the query.
    pub fn query<F>(&self, aabb: AABB, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(usize, u64) -> bool,
    {
        let mut result = TreeStats::default();

        if self.node_count == 0 {
            return result;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            result.node_visits += 1;

            if node.aabb.overlaps(&aabb) && (node.category_bits & mask_bits) != 0 {
                if node.is_leaf() {
                    // callback to user code with proxy id
                    let proceed = callback(node_id, node.user_data);
                    result.leaf_visits += 1;

                    if !proceed {
                        return result;
                    }
                } else {
                    stack.push(node.child1);
                    stack.push(node.child2);
                }
            }
        }

        result
    }

    /// Query an AABB for overlapping proxies regardless of category bits.
    pub fn query_all<F>(&self, aabb: AABB, callback: F) -> TreeStats
    where
        F: FnMut(usize, u64) -> bool,
    {
        self.query(aabb, u64::MAX, callback)
    }

    /// Ray cast against the proxies in the tree. This relies on the callback
    /// to perform an exact ray cast in the case where the proxy contains a
    /// shape.
    ///
    /// The callback returns the new max fraction: zero terminates the cast,
    /// a negative value skips the proxy, the input max fraction continues
    /// without clipping and a smaller value clips the ray.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(&RayCastInput, usize, u64) -> f32,
    {
        let mut result = TreeStats::default();

        if self.node_count == 0 {
            return result;
        }

        let p1 = input.origin;
        let d = input.translation;

        let r = d.normalize();

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        // Separating axis for segment (Gino, p80).
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;

        let mut p2 = Vec2::mul_add(p1, max_fraction, d);

        // Build a bounding box for the segment.
        let mut segment_aabb = AABB {
            min: p1.min(p2),
            max: p1.max(p2),
        };

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        let mut sub_input = *input;

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            result.node_visits += 1;

            let node_aabb = node.aabb;

            if (node.category_bits & mask_bits) == 0 || !node_aabb.overlaps(&segment_aabb) {
                continue;
            }

            // Separating axis for segment (Gino, p80).
            // |dot(v, p1 - c)| > dot(|v|, h)
            let c = node_aabb.center();
            let h = node_aabb.extents();
            let term1 = v.dot(p1 - c).abs();
            let term2 = abs_v.dot(h);
            if term2 < term1 {
                continue;
            }

            if node.is_leaf() {
                sub_input.max_fraction = max_fraction;

                let value = callback(&sub_input, node_id, node.user_data);
                result.leaf_visits += 1;

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    return result;
                }

                if 0.0 < value && value <= max_fraction {
                    // Update segment bounding box.
                    max_fraction = value;
                    p2 = Vec2::mul_add(p1, max_fraction, d);
                    segment_aabb.min = p1.min(p2);
                    segment_aabb.max = p1.max(p2);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }

        result
    }

    /// Sweep a point cloud with a radius through the tree. The callback
    /// follows the same fraction protocol as [`DynamicTree::ray_cast`].
    pub fn shape_cast<F>(&self, input: &ShapeCastInput, mask_bits: u64, mut callback: F) -> TreeStats
    where
        F: FnMut(&ShapeCastInput, usize, u64) -> f32,
    {
        let mut result = TreeStats::default();

        if self.node_count == 0 || input.proxy.count == 0 {
            return result;
        }

        let Some(mut origin_aabb) = AABB::from_points(input.proxy.points()) else {
            return result;
        };
        origin_aabb = origin_aabb.fattened(input.proxy.radius);

        let p1 = origin_aabb.center();
        let extension = origin_aabb.extents();

        // v is perpendicular to the segment.
        let r = input.translation;
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        // Separating axis for segment (Gino, p80).
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;

        // Build total box for the shape cast
        let mut t = input.translation * max_fraction;
        let mut total_aabb = AABB {
            min: origin_aabb.min.min(origin_aabb.min + t),
            max: origin_aabb.max.max(origin_aabb.max + t),
        };

        let mut sub_input = *input;

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }

            let node = &self.nodes[node_id];
            result.node_visits += 1;

            if (node.category_bits & mask_bits) == 0 || !node.aabb.overlaps(&total_aabb) {
                continue;
            }

            // Separating axis for segment (Gino, p80).
            // |dot(v, p1 - c)| > dot(|v|, h)
            // radius extension is added to the node in this case
            let c = node.aabb.center();
            let h = node.aabb.extents() + extension;
            let term1 = v.dot(p1 - c).abs();
            let term2 = abs_v.dot(h);
            if term2 < term1 {
                continue;
            }

            if node.is_leaf() {
                sub_input.max_fraction = max_fraction;

                let value = callback(&sub_input, node_id, node.user_data);
                result.leaf_visits += 1;

                if value == 0.0 {
                    // The client has terminated the shape cast.
                    return result;
                }

                if 0.0 < value && value < max_fraction {
                    // Update segment bounding box.
                    max_fraction = value;
                    t = input.translation * max_fraction;
                    total_aabb.min = origin_aabb.min.min(origin_aabb.min + t);
                    total_aabb.max = origin_aabb.max.max(origin_aabb.max + t);
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }

        result
    }

    /// Height of the tree, zero for a single leaf or an empty tree.
    pub fn height(&self) -> usize {
        if self.root == NULL_NODE {
            return 0;
        }
        self.nodes[self.root].height as usize
    }

    /// Ratio of the sum of internal node perimeters to the root perimeter.
    pub fn area_ratio(&self) -> f32 {
        if self.root == NULL_NODE {
            return 0.0;
        }

        let root = &self.nodes[self.root];
        let root_area = root.aabb.perimeter();

        let total_area: f32 = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| node.is_allocated() && !node.is_leaf() && *i != self.root)
            .map(|(_, node)| node.aabb.perimeter())
            .sum();

        if root_area > 0.0 {
            total_area / root_area
        } else {
            0.0
        }
    }

    /// Bounding box of everything in the tree.
    pub fn root_bounds(&self) -> AABB {
        if self.root == NULL_NODE {
            return AABB::default();
        }
        self.nodes[self.root].aabb
    }

    /// Approximate memory used by the tree.
    pub fn byte_count(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.nodes.capacity() * std::mem::size_of::<TreeNode>()
            + self.leaf_indices.capacity() * std::mem::size_of::<usize>()
            + self.leaf_boxes.capacity() * std::mem::size_of::<AABB>()
            + self.bin_indices.capacity() * std::mem::size_of::<usize>()
    }

    /// Shift the world origin. Useful for large worlds.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        // shift all AABBs
        for node in self.nodes.iter_mut().filter(|n| n.is_allocated()) {
            node.aabb.min -= new_origin;
            node.aabb.max -= new_origin;
        }
    }

    /// Rebuild the tree while retaining subtrees that haven't changed.
    /// Returns the number of boxes sorted. A full build discards every
    /// internal node.
    pub fn rebuild(&mut self, full_build: bool) -> usize {
        let proxy_count = self.proxy_count;
        if proxy_count == 0 {
            return 0;
        }

        self.leaf_indices.clear();
        self.leaf_boxes.clear();

        let mut stack: Vec<usize> = Vec::with_capacity(64);

        let mut node_index = self.root;

        // Gather all proxy nodes that have grown and all internal nodes that
        // haven't grown. Both are considered leaves in the tree rebuild.
        // Free all internal nodes that have grown.
        loop {
            let node = self.nodes[node_index];
            if node.height == 0 || (!node.is_enlarged() && !full_build) {
                self.leaf_indices.push(node_index);
                self.leaf_boxes.push(node.aabb);

                // Detach
                self.nodes[node_index].parent_or_next = NULL_NODE;
            } else {
                let doomed_node_index = node_index;

                // Handle children
                node_index = node.child1;
                stack.push(node.child2);

                // Remove doomed node
                self.free_node(doomed_node_index);

                continue;
            }

            match stack.pop() {
                Some(next) => node_index = next,
                None => break,
            }
        }

        let leaf_count = self.leaf_indices.len();
        debug_assert!(leaf_count <= proxy_count);

        let new_root = self.build_tree(leaf_count);
        self.root = new_root;
        self.nodes[new_root].parent_or_next = NULL_NODE;

        debug_assert!(self.validate());

        leaf_count
    }

    // "On Fast Construction of SAH-based Bounding Volume Hierarchies" by Ingo Wald
    // Returns the left child count
    fn partition_sah(indices: &mut [usize], bin_indices: &mut [usize], boxes: &mut [AABB]) -> usize {
        let count = indices.len();
        debug_assert!(count > 0);

        let empty = AABB {
            min: Vec2::new(f32::MAX, f32::MAX),
            max: Vec2::new(-f32::MAX, -f32::MAX),
        };

        let mut bin_boxes = [empty; BIN_COUNT];
        let mut bin_counts = [0usize; BIN_COUNT];

        let mut centroid_aabb = AABB {
            min: boxes[0].center(),
            max: boxes[0].center(),
        };
        for b in boxes.iter().skip(1) {
            let center = b.center();
            centroid_aabb.min = centroid_aabb.min.min(center);
            centroid_aabb.max = centroid_aabb.max.max(center);
        }

        let d = centroid_aabb.max - centroid_aabb.min;

        // Find longest axis
        let (axis_index, extent) = if d.x > d.y { (0, d.x) } else { (1, d.y) };
        let inv_d = if extent > 0.0 { 1.0 / extent } else { 0.0 };

        let axis = |v: Vec2| if axis_index == 0 { v.x } else { v.y };

        // Assign boxes to bins and compute bin boxes
        let min_c = axis(centroid_aabb.min);
        for i in 0..count {
            let c = boxes[i].center();
            let bin = (BIN_COUNT as f32 * (axis(c) - min_c) * inv_d) as isize;
            let bin = bin.clamp(0, BIN_COUNT as isize - 1) as usize;
            bin_indices[i] = bin;
            bin_counts[bin] += 1;
            bin_boxes[bin] = bin_boxes[bin].union(&boxes[i]);
        }

        let plane_count = BIN_COUNT - 1;

        // Prepare all the left planes, candidates for left child
        let mut left_counts = [0usize; BIN_COUNT - 1];
        let mut left_boxes = [empty; BIN_COUNT - 1];
        left_counts[0] = bin_counts[0];
        left_boxes[0] = bin_boxes[0];
        for i in 1..plane_count {
            left_counts[i] = left_counts[i - 1] + bin_counts[i];
            left_boxes[i] = left_boxes[i - 1].union(&bin_boxes[i]);
        }

        // Prepare all the right planes, candidates for right child
        let mut right_counts = [0usize; BIN_COUNT - 1];
        let mut right_boxes = [empty; BIN_COUNT - 1];
        right_counts[plane_count - 1] = bin_counts[plane_count];
        right_boxes[plane_count - 1] = bin_boxes[plane_count];
        for i in (0..plane_count - 1).rev() {
            right_counts[i] = right_counts[i + 1] + bin_counts[i + 1];
            right_boxes[i] = right_boxes[i + 1].union(&bin_boxes[i + 1]);
        }

        // Find best split to minimize SAH
        let mut min_cost = f32::MAX;
        let mut best_plane = 0;
        for i in 0..plane_count {
            if left_counts[i] == 0 || right_counts[i] == 0 {
                continue;
            }

            let left_area = left_boxes[i].perimeter();
            let right_area = right_boxes[i].perimeter();

            let cost = left_counts[i] as f32 * left_area + right_counts[i] as f32 * right_area;
            if cost < min_cost {
                best_plane = i;
                min_cost = cost;
            }
        }

        // Partition node indices and boxes using the Hoare partition scheme
        let mut i1 = 0;
        let mut i2 = count;
        while i1 < i2 {
            while i1 < i2 && bin_indices[i1] <= best_plane {
                i1 += 1;
            }

            while i1 < i2 && bin_indices[i2 - 1] > best_plane {
                i2 -= 1;
            }

            if i1 < i2 {
                indices.swap(i1, i2 - 1);
                boxes.swap(i1, i2 - 1);
                bin_indices.swap(i1, i2 - 1);

                i1 += 1;
                i2 -= 1;
            }
        }
        debug_assert_eq!(i1, i2);

        if i1 > 0 && i1 < count {
            i1
        } else {
            count / 2
        }
    }

    // Returns the root node index.
    fn build_tree(&mut self, leaf_count: usize) -> usize {
        if leaf_count == 1 {
            let leaf = self.leaf_indices[0];
            self.nodes[leaf].parent_or_next = NULL_NODE;
            return leaf;
        }

        let mut leaf_indices = std::mem::take(&mut self.leaf_indices);
        let mut leaf_boxes = std::mem::take(&mut self.leaf_boxes);
        let mut bin_indices = std::mem::take(&mut self.bin_indices);
        bin_indices.clear();
        bin_indices.resize(leaf_count, 0);

        let mut stack: Vec<RebuildItem> = Vec::with_capacity(64);

        let root_index = self.allocate_node();
        stack.push(RebuildItem {
            node_index: root_index,
            child_count: -1,
            start_index: 0,
            end_index: leaf_count,
            split_index: Self::partition_sah(&mut leaf_indices, &mut bin_indices, &mut leaf_boxes),
        });

        loop {
            let top = stack.len() - 1;
            stack[top].child_count += 1;
            let item = stack[top];

            if item.child_count == 2 {
                // This internal node has both children established

                if top == 0 {
                    // all done
                    break;
                }

                let parent_item = stack[top - 1];
                let parent_index = parent_item.node_index;

                if parent_item.child_count == 0 {
                    debug_assert_eq!(self.nodes[parent_index].child1, NULL_NODE);
                    self.nodes[parent_index].child1 = item.node_index;
                } else {
                    debug_assert_eq!(parent_item.child_count, 1);
                    debug_assert_eq!(self.nodes[parent_index].child2, NULL_NODE);
                    self.nodes[parent_index].child2 = item.node_index;
                }

                debug_assert_eq!(self.nodes[item.node_index].parent_or_next, NULL_NODE);
                self.nodes[item.node_index].parent_or_next = parent_index;
                self.refit_node(item.node_index);

                // Pop stack
                stack.pop();
            } else {
                let (start_index, end_index) = if item.child_count == 0 {
                    (item.start_index, item.split_index)
                } else {
                    debug_assert_eq!(item.child_count, 1);
                    (item.split_index, item.end_index)
                };

                debug_assert!(start_index < end_index);

                let count = end_index - start_index;

                if count == 1 {
                    let child_index = leaf_indices[start_index];

                    if item.child_count == 0 {
                        self.nodes[item.node_index].child1 = child_index;
                    } else {
                        self.nodes[item.node_index].child2 = child_index;
                    }

                    self.nodes[child_index].parent_or_next = item.node_index;
                } else {
                    let node_index = self.allocate_node();
                    let split = Self::partition_sah(
                        &mut leaf_indices[start_index..end_index],
                        &mut bin_indices[start_index..end_index],
                        &mut leaf_boxes[start_index..end_index],
                    );
                    stack.push(RebuildItem {
                        node_index,
                        child_count: -1,
                        start_index,
                        end_index,
                        split_index: start_index + split,
                    });
                }
            }
        }

        self.refit_node(root_index);

        self.leaf_indices = leaf_indices;
        self.leaf_boxes = leaf_boxes;
        self.bin_indices = bin_indices;

        root_index
    }

    fn refit_node(&mut self, index: usize) {
        let c1 = self.nodes[self.nodes[index].child1];
        let c2 = self.nodes[self.nodes[index].child2];
        let node = &mut self.nodes[index];
        node.aabb = c1.aabb.union(&c2.aabb);
        node.height = 1 + c1.height.max(c2.height);
        node.category_bits = c1.category_bits | c2.category_bits;
    }

    fn compute_height(&self, node_id: usize) -> usize {
        let node = &self.nodes[node_id];
        if node.is_leaf() {
            return 0;
        }
        1 + self.compute_height(node.child1).max(self.compute_height(node.child2))
    }

    fn validate_structure(&self, index: usize) -> bool {
        if index == NULL_NODE {
            return true;
        }

        if index == self.root && self.nodes[index].parent_or_next != NULL_NODE {
            return false;
        }

        let node = &self.nodes[index];
        if !node.is_allocated() {
            return false;
        }

        if node.is_leaf() {
            return node.height == 0;
        }

        let child1 = node.child1;
        let child2 = node.child2;
        if child1 >= self.nodes.len() || child2 >= self.nodes.len() {
            return false;
        }

        self.nodes[child1].parent_or_next == index
            && self.nodes[child2].parent_or_next == index
            && self.validate_structure(child1)
            && self.validate_structure(child2)
    }

    fn validate_metrics(&self, index: usize) -> bool {
        if index == NULL_NODE {
            return true;
        }

        let node = &self.nodes[index];
        if node.is_leaf() {
            return true;
        }

        let c1 = &self.nodes[node.child1];
        let c2 = &self.nodes[node.child2];

        let height = 1 + c1.height.max(c2.height);
        if node.height != height {
            return false;
        }

        // Containment
        if !node.aabb.contains(&c1.aabb) || !node.aabb.contains(&c2.aabb) {
            return false;
        }

        if node.category_bits != c1.category_bits | c2.category_bits {
            return false;
        }

        self.validate_metrics(node.child1) && self.validate_metrics(node.child2)
    }

    /// Checks parent/child links, heights, containment, category bits and
    /// the free list. Intended for tests and debug builds.
    pub fn validate(&self) -> bool {
        if self.root == NULL_NODE {
            return self.proxy_count == 0;
        }

        if !self.validate_structure(self.root) || !self.validate_metrics(self.root) {
            return false;
        }

        let mut free_count = 0;
        let mut free_index = self.free_list;
        while free_index != NULL_NODE {
            if free_index >= self.nodes.len() || self.nodes[free_index].is_allocated() {
                return false;
            }
            free_index = self.nodes[free_index].parent_or_next;
            free_count += 1;
        }

        let height = self.height();
        let computed_height = self.compute_height(self.root);

        height == computed_height && self.node_count + free_count == self.nodes.len()
    }

    /// Checks that no node is flagged as enlarged, which holds right after a
    /// rebuild.
    pub fn validate_no_enlarged(&self) -> bool {
        self.nodes.iter().filter(|node| node.is_allocated()).all(|node| !node.is_enlarged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::distance::make_proxy;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_box(rng: &mut StdRng) -> AABB {
        let center = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
        let half = Vec2::new(rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0));
        AABB::from_center(center, half)
    }

    fn brute_force(boxes: &[(usize, AABB)], query: &AABB) -> Vec<usize> {
        let mut ids: Vec<usize> = boxes.iter().filter(|(_, b)| b.overlaps(query)).map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = DynamicTree::new();
        let mut boxes = Vec::new();
        for i in 0..200 {
            let aabb = random_box(&mut rng);
            let id = tree.create_proxy(aabb, DEFAULT_CATEGORY_BITS, i);
            boxes.push((id, aabb));
        }
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 200);

        for _ in 0..20 {
            let query = random_box(&mut rng).fattened(5.0);
            let mut found = Vec::new();
            tree.query(query, u64::MAX, |id, _| {
                found.push(id);
                true
            });
            found.sort_unstable();
            assert_eq!(found, brute_force(&boxes, &query));
        }
    }

    #[test]
    fn test_every_leaf_finds_itself() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut tree = DynamicTree::new();
        let ids: Vec<(usize, AABB)> = (0..64)
            .map(|i| {
                let aabb = random_box(&mut rng);
                (tree.create_proxy(aabb, 1, i), aabb)
            })
            .collect();

        for (id, aabb) in &ids {
            let mut hit = false;
            tree.query(*aabb, u64::MAX, |found, _| {
                hit |= found == *id;
                true
            });
            assert!(hit);
        }
    }

    #[test]
    fn test_move_destroy_and_rebuild() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut tree = DynamicTree::new();
        let mut proxies: Vec<usize> = (0..100).map(|i| tree.create_proxy(random_box(&mut rng), 1, i)).collect();

        for &id in proxies.iter().take(50) {
            tree.move_proxy(id, random_box(&mut rng));
        }
        assert!(tree.validate());

        for id in proxies.drain(..25) {
            tree.destroy_proxy(id);
        }
        assert!(tree.validate());
        assert_eq!(tree.proxy_count(), 75);

        // grow some leaves in place and then fix the tree incrementally
        for &id in proxies.iter().take(10) {
            let grown = tree.fat_aabb(id).fattened(3.0);
            tree.enlarge_proxy(id, grown);
        }
        assert!(!tree.validate_no_enlarged());
        tree.rebuild(false);
        assert!(tree.validate());
        assert!(tree.validate_no_enlarged());

        let sorted = tree.rebuild(true);
        assert_eq!(sorted, 75);
        assert!(tree.validate());
        assert!(tree.area_ratio() > 0.0);
    }

    #[test]
    fn test_category_mask_prunes() {
        let mut tree = DynamicTree::new();
        let a = tree.create_proxy(AABB::from_center(Vec2::ZERO, Vec2::new(1.0, 1.0)), 0b01, 7);
        let b = tree.create_proxy(AABB::from_center(Vec2::new(0.5, 0.0), Vec2::new(1.0, 1.0)), 0b10, 8);

        let mut found = Vec::new();
        tree.query(AABB::from_center(Vec2::ZERO, Vec2::new(0.1, 0.1)), 0b10, |id, data| {
            found.push((id, data));
            true
        });
        assert_eq!(found, vec![(b, 8)]);

        tree.set_category_bits(a, 0b10);
        let mut count = 0;
        tree.query(AABB::from_center(Vec2::ZERO, Vec2::new(0.1, 0.1)), 0b10, |_, _| {
            count += 1;
            true
        });
        assert_eq!(count, 2);
        assert!(tree.validate());
    }

    #[test]
    fn test_ray_cast_clipping() {
        let mut tree = DynamicTree::new();
        for i in 0..5 {
            let center = Vec2::new(2.0 * i as f32 + 2.0, 0.0);
            tree.create_proxy(AABB::from_center(center, Vec2::new(0.5, 0.5)), 1, i);
        }

        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(20.0, 0.0));

        // Collect everything
        let mut all = 0;
        tree.ray_cast(&input, u64::MAX, |sub, _, _| {
            all += 1;
            sub.max_fraction
        });
        assert_eq!(all, 5);

        // Clip to the closest hit
        let mut closest = f32::MAX;
        tree.ray_cast(&input, u64::MAX, |sub, id, _| {
            let aabb = tree.fat_aabb(id);
            let output = aabb.ray_cast(sub.origin, Vec2::mul_add(sub.origin, sub.max_fraction, sub.translation));
            if output.hit {
                let fraction = output.fraction * sub.max_fraction;
                closest = closest.min(fraction);
                return fraction;
            }
            sub.max_fraction
        });
        assert!((closest - 1.5 / 20.0).abs() < 1e-5);

        // Terminate immediately
        let stats = tree.ray_cast(&input, u64::MAX, |_, _, _| 0.0);
        assert_eq!(stats.leaf_visits, 1);
    }

    #[test]
    fn test_shape_cast_visits_swept_leaves() {
        let mut tree = DynamicTree::new();
        tree.create_proxy(AABB::from_center(Vec2::new(5.0, 0.0), Vec2::new(0.5, 0.5)), 1, 0);
        tree.create_proxy(AABB::from_center(Vec2::new(5.0, 10.0), Vec2::new(0.5, 0.5)), 1, 1);

        let input = ShapeCastInput {
            proxy: make_proxy(&[Vec2::ZERO], 0.25),
            translation: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
            can_encroach: false,
        };
        let mut hits = Vec::new();
        tree.shape_cast(&input, u64::MAX, |sub, _, data| {
            hits.push(data);
            sub.max_fraction
        });
        assert_eq!(hits, vec![0]);
    }
}
