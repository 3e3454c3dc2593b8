//! Constraint graph coloring.
//!
//! Constraints in one color never share a dynamic body, so a color can be
//! solved in parallel without the bodies racing. Static and kinematic
//! bodies are read only during the solve and never consume a color slot.
//! Constraints that find no free color go to the overflow set, which is
//! solved serially before the colors.

use crate::common::constants::{DYNAMIC_COLOR_COUNT, GRAPH_COLOR_COUNT};

/// Growable bit set over solver body indices.
#[derive(Debug, Clone, Default)]
struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    fn with_capacity(bit_count: usize) -> Self {
        Self {
            words: vec![0; bit_count.div_ceil(64)],
        }
    }

    #[inline]
    fn get(&self, bit: usize) -> bool {
        self.words.get(bit / 64).is_some_and(|w| w & (1 << (bit % 64)) != 0)
    }

    #[inline]
    fn set(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }
}

/// Constraints of one color, as indices into the step's joint and contact
/// arrays.
#[derive(Debug, Clone, Default)]
pub(crate) struct GraphColor {
    pub joints: Vec<usize>,
    pub contacts: Vec<usize>,
}

impl GraphColor {
    pub fn len(&self) -> usize {
        self.joints.len() + self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub(crate) struct ConstraintGraph {
    body_sets: Vec<BitSet>,
    pub colors: Vec<GraphColor>,
    pub overflow: GraphColor,
}

/// Which constraint array an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintKind {
    Joint,
    Contact,
}

impl ConstraintGraph {
    pub fn new(body_count: usize) -> Self {
        Self {
            body_sets: (0..GRAPH_COLOR_COUNT).map(|_| BitSet::with_capacity(body_count)).collect(),
            colors: vec![GraphColor::default(); GRAPH_COLOR_COUNT],
            overflow: GraphColor::default(),
        }
    }

    /// Finds a color for a constraint between two solver bodies. `None`
    /// marks a body that does not need a slot (static, kinematic or
    /// sleeping). Returns the color, or `None` for overflow.
    fn assign_color(&mut self, body_a: Option<usize>, body_b: Option<usize>) -> Option<usize> {
        match (body_a, body_b) {
            (Some(a), Some(b)) => {
                for (color, set) in self.body_sets[..DYNAMIC_COLOR_COUNT].iter_mut().enumerate() {
                    if set.get(a) || set.get(b) {
                        continue;
                    }
                    set.set(a);
                    set.set(b);
                    return Some(color);
                }
                None
            }
            (Some(body), None) | (None, Some(body)) => {
                // Color zero is kept free of static constraints so dynamic
                // pairs find room early.
                for (offset, set) in self.body_sets[1..].iter_mut().enumerate() {
                    if set.get(body) {
                        continue;
                    }
                    set.set(body);
                    return Some(offset + 1);
                }
                None
            }
            (None, None) => Some(0),
        }
    }

    /// Adds a constraint and records it in its color.
    pub fn add(&mut self, kind: ConstraintKind, index: usize, body_a: Option<usize>, body_b: Option<usize>) {
        let color = self.assign_color(body_a, body_b);
        let target = match color {
            Some(color) => &mut self.colors[color],
            None => &mut self.overflow,
        };
        match kind {
            ConstraintKind::Joint => target.joints.push(index),
            ConstraintKind::Contact => target.contacts.push(index),
        }
    }

    /// Constraint count per color followed by the overflow count.
    pub fn color_counts(&self) -> [usize; GRAPH_COLOR_COUNT + 1] {
        let mut counts = [0; GRAPH_COLOR_COUNT + 1];
        for (count, color) in counts.iter_mut().zip(&self.colors) {
            *count = color.len();
        }
        counts[GRAPH_COLOR_COUNT] = self.overflow.len();
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_colors_never_share_dynamic_bodies() {
        let mut rng = StdRng::seed_from_u64(7);
        let body_count = 200;
        let mut graph = ConstraintGraph::new(body_count);
        let mut pairs = Vec::new();
        for index in 0..1000 {
            let a = rng.gen_range(0..body_count);
            let b = if rng.gen_bool(0.2) {
                None
            } else {
                Some(rng.gen_range(0..body_count)).filter(|&b| b != a)
            };
            graph.add(ConstraintKind::Contact, index, Some(a), b);
            pairs.push((Some(a), b));
        }

        for color in &graph.colors {
            let mut used = std::collections::HashSet::new();
            for &c in &color.contacts {
                let (a, b) = pairs[c];
                for body in [a, b].into_iter().flatten() {
                    assert!(used.insert(body), "body {body} appears twice in a color");
                }
            }
        }

        let total: usize = graph.color_counts().iter().sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_static_constraints_skip_color_zero() {
        let mut graph = ConstraintGraph::new(4);
        graph.add(ConstraintKind::Joint, 0, Some(1), None);
        assert_eq!(graph.colors[1].joints, vec![0]);

        graph.add(ConstraintKind::Contact, 0, Some(2), Some(3));
        assert_eq!(graph.colors[0].contacts, vec![0]);
    }

    #[test]
    fn test_overflow_when_colors_run_out() {
        let mut graph = ConstraintGraph::new(2);
        for index in 0..DYNAMIC_COLOR_COUNT + 3 {
            graph.add(ConstraintKind::Contact, index, Some(0), Some(1));
        }
        assert_eq!(graph.overflow.contacts.len(), 3);
        assert!(graph.colors.iter().take(DYNAMIC_COLOR_COUNT).all(|c| c.len() == 1));
    }
}
