//! Surface materials and collision filtering.

use super::constants::{DEFAULT_CATEGORY_BITS, DEFAULT_MASK_BITS};

/// Surface properties of a shape that affect contact response.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceMaterial {
    /// Coulomb friction coefficient, usually in `[0, 1]`.
    pub friction: f32,
    /// Coefficient of restitution (bounce), usually in `[0, 1]`.
    pub restitution: f32,
    /// Rolling resistance, usually in `[0, 1]`.
    pub rolling_resistance: f32,
    /// Tangent speed for conveyor belts.
    pub tangent_speed: f32,
    /// User material identifier, passed to the mixing callbacks.
    pub user_material_id: u64,
    /// Debug draw color. Stored for callers, unused by the engine.
    pub custom_color: u32,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        SurfaceMaterial {
            friction: 0.6,
            restitution: 0.0,
            rolling_resistance: 0.0,
            tangent_speed: 0.0,
            user_material_id: 0,
            custom_color: 0,
        }
    }
}

/// Friction mixing law: geometric mean.
pub fn mix_friction(friction1: f32, _material1: u64, friction2: f32, _material2: u64) -> f32 {
    (friction1 * friction2).sqrt()
}

/// Restitution mixing law: the bouncier surface wins.
pub fn mix_restitution(restitution1: f32, _material1: u64, restitution2: f32, _material2: u64) -> f32 {
    restitution1.max(restitution2)
}

/// Collision filtering data for a shape.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    /// The collision category bits of this shape.
    pub category_bits: u64,
    /// The categories this shape accepts for collision.
    pub mask_bits: u64,
    /// Shapes with the same positive group always collide, with the same
    /// negative group never collide. Zero means no group.
    pub group_index: i32,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            category_bits: DEFAULT_CATEGORY_BITS,
            mask_bits: DEFAULT_MASK_BITS,
            group_index: 0,
        }
    }
}

impl Filter {
    /// Pairwise filtering rule used by the broad-phase.
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// Filtering for world queries.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryFilter {
    /// The categories the query belongs to.
    pub category_bits: u64,
    /// The shape categories the query accepts.
    pub mask_bits: u64,
}

impl Default for QueryFilter {
    fn default() -> Self {
        QueryFilter {
            category_bits: DEFAULT_CATEGORY_BITS,
            mask_bits: DEFAULT_MASK_BITS,
        }
    }
}

impl QueryFilter {
    /// True if a shape with this filter is visible to the query.
    pub fn accepts(&self, shape_filter: &Filter) -> bool {
        (shape_filter.category_bits & self.mask_bits) != 0
            && (shape_filter.mask_bits & self.category_bits) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixing() {
        assert!((mix_friction(0.4, 0, 0.9, 0) - 0.6).abs() < 1e-6);
        assert_eq!(mix_restitution(0.2, 0, 0.7, 0), 0.7);
    }

    #[test]
    fn test_filter_groups_and_masks() {
        let a = Filter::default();
        let b = Filter::default();
        assert!(a.should_collide(&b));

        let no_collide = Filter { group_index: -3, ..Default::default() };
        assert!(!no_collide.should_collide(&no_collide));

        let always = Filter { category_bits: 2, mask_bits: 0, group_index: 5 };
        assert!(always.should_collide(&always));

        let masked = Filter { category_bits: 2, mask_bits: 4, group_index: 0 };
        assert!(!masked.should_collide(&a));

        let query = QueryFilter { category_bits: 1, mask_bits: 2 };
        assert!(query.accepts(&Filter { category_bits: 2, ..Default::default() }));
        assert!(!query.accepts(&Filter::default()));
    }
}
