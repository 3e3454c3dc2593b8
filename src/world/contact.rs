//! Contacts between shape pairs whose fat bounding boxes overlap.
//!
//! A contact exists from the moment the broad-phase reports the pair until
//! the fat boxes separate. It is touching while its manifold has points.

use crate::collision::distance::SimplexCache;
use crate::collision::manifold::{collide_shapes, Manifold};
use crate::common::constants::linear_slop;
use crate::common::ShapeId;
use crate::math::{Transform, Vec2};
use crate::objects::Shape;

use super::def::PreSolveFn;

/// What a collide pass did to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContactUpdate {
    Unchanged,
    StartedTouching,
    StoppedTouching,
    /// The fat boxes no longer overlap; the contact should be destroyed.
    Disjoint,
}

#[derive(Debug, Clone)]
pub(crate) struct Contact {
    pub shape_a: usize,
    pub shape_b: usize,
    pub body_a: usize,
    pub body_b: usize,
    /// Anchors are relative to the body centers of mass once updated.
    pub manifold: Manifold,
    pub cache: SimplexCache,

    pub friction: f32,
    pub restitution: f32,
    pub rolling_resistance: f32,
    pub tangent_speed: f32,

    pub touching: bool,
    pub enable_contact_events: bool,
    pub enable_hit_events: bool,
    pub enable_pre_solve_events: bool,
    /// Island this contact links bodies in, if any.
    pub island: Option<usize>,
}

impl Contact {
    pub fn new(shape_a: usize, a: &Shape, shape_b: usize, b: &Shape, friction: f32, restitution: f32) -> Self {
        Self {
            shape_a,
            shape_b,
            body_a: a.body,
            body_b: b.body,
            manifold: Manifold::default(),
            cache: SimplexCache::default(),
            friction,
            restitution,
            rolling_resistance: a.material.rolling_resistance.max(b.material.rolling_resistance),
            tangent_speed: a.material.tangent_speed + b.material.tangent_speed,
            touching: false,
            enable_contact_events: a.enable_contact_events || b.enable_contact_events,
            enable_hit_events: a.enable_hit_events || b.enable_hit_events,
            enable_pre_solve_events: a.enable_pre_solve_events || b.enable_pre_solve_events,
            island: None,
        }
    }

    /// Recomputes the manifold and carries accumulated impulses over to
    /// points whose feature id persisted. `center_offset_*` is the world
    /// space offset from the body origin to its center of mass.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        shape_a: &Shape,
        xf_a: Transform,
        center_offset_a: Vec2,
        shape_b: &Shape,
        xf_b: Transform,
        center_offset_b: Vec2,
        pre_solve: Option<(&PreSolveFn, ShapeId, ShapeId)>,
        enable_speculative: bool,
    ) -> ContactUpdate {
        let old_manifold = self.manifold;
        let was_touching = self.touching;

        let mut manifold = collide_shapes(&shape_a.geometry, xf_a, &shape_b.geometry, xf_b, &mut self.cache);

        if !enable_speculative && manifold.point_count > 0 {
            let mut kept = Manifold {
                normal: manifold.normal,
                ..Default::default()
            };
            for mp in manifold.points().iter().filter(|mp| mp.separation <= linear_slop()) {
                kept.points[kept.point_count] = *mp;
                kept.point_count += 1;
            }
            manifold = kept;
        }

        for mp in manifold.points_mut() {
            mp.anchor_a = mp.anchor_a - center_offset_a;
            mp.anchor_b = mp.anchor_b - center_offset_b;
            mp.normal_impulse = 0.0;
            mp.tangent_impulse = 0.0;
            mp.persisted = false;

            if let Some(old) = old_manifold.points().iter().find(|old| old.id == mp.id) {
                mp.normal_impulse = old.normal_impulse;
                mp.tangent_impulse = old.tangent_impulse;
                mp.persisted = true;
            }
        }
        manifold.rolling_impulse = if manifold.point_count > 0 {
            old_manifold.rolling_impulse
        } else {
            0.0
        };

        let mut touching = manifold.point_count > 0;
        if touching && self.enable_pre_solve_events {
            if let Some((callback, id_a, id_b)) = pre_solve {
                if !callback(id_a, id_b, &manifold) {
                    // disabled for this step only
                    manifold.point_count = 0;
                    touching = false;
                }
            }
        }

        self.manifold = manifold;
        self.touching = touching;

        match (was_touching, touching) {
            (false, true) => ContactUpdate::StartedTouching,
            (true, false) => ContactUpdate::StoppedTouching,
            _ => ContactUpdate::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Rot;
    use crate::objects::ShapeDef;
    use crate::shapes::{make_box, Circle};

    fn at(x: f32, y: f32) -> Transform {
        Transform::new(Vec2::new(x, y), Rot::IDENTITY)
    }

    #[test]
    fn test_update_matches_ids_and_keeps_impulses() {
        let ground = Shape::new(0, 0, &ShapeDef::default(), make_box(5.0, 0.5).into());
        let block = Shape::new(1, 0, &ShapeDef::default(), make_box(0.5, 0.5).into());
        let mut contact = Contact::new(0, &ground, 1, &block, 0.6, 0.0);

        let update = contact.update(&ground, at(0.0, 0.0), Vec2::ZERO, &block, at(0.0, 0.99), Vec2::ZERO, None, true);
        assert_eq!(update, ContactUpdate::StartedTouching);
        assert_eq!(contact.manifold.point_count, 2);
        assert!(contact.manifold.points().iter().all(|mp| !mp.persisted));

        for mp in contact.manifold.points_mut() {
            mp.normal_impulse = 2.5;
        }

        let update = contact.update(&ground, at(0.0, 0.0), Vec2::ZERO, &block, at(0.0, 0.985), Vec2::ZERO, None, true);
        assert_eq!(update, ContactUpdate::Unchanged);
        for mp in contact.manifold.points() {
            assert!(mp.persisted);
            assert_eq!(mp.normal_impulse, 2.5);
        }

        let update = contact.update(&ground, at(0.0, 0.0), Vec2::ZERO, &block, at(0.0, 3.0), Vec2::ZERO, None, true);
        assert_eq!(update, ContactUpdate::StoppedTouching);
        assert!(!contact.touching);
    }

    #[test]
    fn test_anchors_shift_to_center_of_mass() {
        let circle = Shape::new(0, 0, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5).into());
        let mut contact = Contact::new(0, &circle, 1, &circle, 0.6, 0.0);
        let offset = Vec2::new(0.25, 0.0);
        contact.update(&circle, at(0.0, 0.0), offset, &circle, at(0.9, 0.0), Vec2::ZERO, None, true);
        let mp = contact.manifold.points[0];
        assert!((mp.anchor_a.x - (0.45 - 0.25)).abs() < 1e-6);
    }

    #[test]
    fn test_pre_solve_can_disable() {
        let circle = Shape::new(0, 0, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5).into());
        let mut contact = Contact::new(0, &circle, 1, &circle, 0.6, 0.0);
        contact.enable_pre_solve_events = true;
        let reject: PreSolveFn = std::sync::Arc::new(|_, _, _| false);
        let update = contact.update(
            &circle,
            at(0.0, 0.0),
            Vec2::ZERO,
            &circle,
            at(0.9, 0.0),
            Vec2::ZERO,
            Some((&reject, ShapeId::NULL, ShapeId::NULL)),
            true,
        );
        assert_eq!(update, ContactUpdate::Unchanged);
        assert_eq!(contact.manifold.point_count, 0);
    }
}
