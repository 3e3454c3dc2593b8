//! Chain operations of the world.

use tracing::debug;

use super::physics_world::PhysicsWorld;
use crate::common::constants::linear_slop;
use crate::common::{BodyId, ChainId, PhysicsError, Result, ShapeId, SurfaceMaterial};
use crate::objects::{Chain, ChainDef, ShapeDef};
use crate::shapes::ShapeGeometry;

impl PhysicsWorld {
    /// Creates a chain of one-sided segments on a body. Needs at least four
    /// points; open chains use the end points as ghost vertices only.
    pub fn create_chain(&mut self, body: BodyId, def: &ChainDef) -> Result<ChainId> {
        let body_index = self.body_index(body)?;
        if def.points.len() < 4 {
            return Err(PhysicsError::DegenerateGeometry("chain needs at least four points"));
        }
        if !def.points.iter().all(|p| p.is_valid()) {
            return Err(PhysicsError::InvalidDefinition("chain points"));
        }
        let segment_count = def.segment_count();
        if def.materials.len() > 1 && def.materials.len() != segment_count {
            return Err(PhysicsError::InvalidDefinition("chain materials"));
        }

        let segments = def.make_segments();
        if segments.iter().any(|s| !(s.segment.length() > linear_slop())) {
            return Err(PhysicsError::DegenerateGeometry("chain points are too close"));
        }

        let (chain_index, generation) = self.chains.insert(Chain {
            body: body_index,
            generation: 0,
            shapes: Vec::with_capacity(segments.len()),
            materials: (0..segment_count).map(|i| def.material(i)).collect(),
            is_loop: def.is_loop,
            user_data: def.user_data,
        });
        self.chains[chain_index].generation = generation;

        let mut shapes = Vec::with_capacity(segments.len());
        for (i, mut segment) in segments.into_iter().enumerate() {
            segment.chain_id = chain_index as i32;
            let shape_def = ShapeDef {
                user_data: def.user_data,
                material: def.material(i),
                density: 0.0,
                filter: def.filter,
                enable_sensor_events: def.enable_sensor_events,
                update_body_mass: false,
                ..Default::default()
            };
            let shape = self.create_shape_internal(body_index, &shape_def, ShapeGeometry::ChainSegment(segment), Some(chain_index));
            shapes.push(shape);
        }
        self.chains[chain_index].shapes = shapes;

        debug!(chain = chain_index, segments = segment_count, "chain created");
        Ok(self.chain_id(chain_index))
    }

    /// Destroys a chain and all its segments.
    pub fn destroy_chain(&mut self, id: ChainId) -> Result<()> {
        let index = self.chain_index(id)?;
        let shapes = std::mem::take(&mut self.chains[index].shapes);
        for shape_index in shapes {
            self.destroy_shape_internal(shape_index, true);
        }
        self.chains.remove(index);
        Ok(())
    }

    pub fn chain_is_valid(&self, id: ChainId) -> bool {
        self.chain_index(id).is_ok()
    }

    pub fn chain_body(&self, id: ChainId) -> Result<BodyId> {
        let index = self.chain_index(id)?;
        Ok(self.body_id(self.chains[index].body))
    }

    pub fn chain_is_loop(&self, id: ChainId) -> Result<bool> {
        Ok(self.chains[self.chain_index(id)?].is_loop)
    }

    pub fn chain_segment_count(&self, id: ChainId) -> Result<usize> {
        Ok(self.chains[self.chain_index(id)?].shapes.len())
    }

    /// Segment shapes in chain order.
    pub fn chain_segments(&self, id: ChainId) -> Result<Vec<ShapeId>> {
        let index = self.chain_index(id)?;
        Ok(self.chains[index].shapes.iter().map(|&s| self.shape_id(s)).collect())
    }

    pub fn chain_user_data(&self, id: ChainId) -> Result<u64> {
        Ok(self.chains[self.chain_index(id)?].user_data)
    }

    pub fn set_chain_user_data(&mut self, id: ChainId, user_data: u64) -> Result<()> {
        let index = self.chain_index(id)?;
        self.chains[index].user_data = user_data;
        Ok(())
    }

    /// Friction of the first segment.
    pub fn chain_friction(&self, id: ChainId) -> Result<f32> {
        let chain = &self.chains[self.chain_index(id)?];
        Ok(chain.materials.first().map_or(0.0, |m| m.friction))
    }

    /// Sets the friction of every segment. Applies to new contacts.
    pub fn set_chain_friction(&mut self, id: ChainId, friction: f32) -> Result<()> {
        if !friction.is_finite() || friction < 0.0 {
            return Err(PhysicsError::InvalidDefinition("friction"));
        }
        self.update_chain_materials(id, |m| m.friction = friction)
    }

    /// Restitution of the first segment.
    pub fn chain_restitution(&self, id: ChainId) -> Result<f32> {
        let chain = &self.chains[self.chain_index(id)?];
        Ok(chain.materials.first().map_or(0.0, |m| m.restitution))
    }

    /// Sets the restitution of every segment. Applies to new contacts.
    pub fn set_chain_restitution(&mut self, id: ChainId, restitution: f32) -> Result<()> {
        if !restitution.is_finite() || restitution < 0.0 {
            return Err(PhysicsError::InvalidDefinition("restitution"));
        }
        self.update_chain_materials(id, |m| m.restitution = restitution)
    }

    pub fn chain_material(&self, id: ChainId, segment: usize) -> Result<SurfaceMaterial> {
        let chain = &self.chains[self.chain_index(id)?];
        chain
            .materials
            .get(segment)
            .copied()
            .ok_or(PhysicsError::InvalidDefinition("chain segment index"))
    }

    pub fn set_chain_material(&mut self, id: ChainId, segment: usize, material: SurfaceMaterial) -> Result<()> {
        let index = self.chain_index(id)?;
        let chain = &mut self.chains[index];
        let (Some(slot), Some(&shape_index)) = (chain.materials.get_mut(segment), chain.shapes.get(segment)) else {
            return Err(PhysicsError::InvalidDefinition("chain segment index"));
        };
        *slot = material;
        self.shapes[shape_index].material = material;
        Ok(())
    }

    fn update_chain_materials(&mut self, id: ChainId, mut update: impl FnMut(&mut SurfaceMaterial)) -> Result<()> {
        let index = self.chain_index(id)?;
        let chain = &mut self.chains[index];
        for (material, &shape_index) in chain.materials.iter_mut().zip(&chain.shapes) {
            update(material);
            self.shapes[shape_index].material = *material;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::objects::BodyDef;
    use crate::shapes::Circle;
    use crate::world::WorldDef;
    use approx::assert_relative_eq;

    fn ground_points() -> Vec<Vec2> {
        vec![
            Vec2::new(20.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(-10.0, 0.0),
            Vec2::new(-20.0, 0.0),
        ]
    }

    #[test]
    fn test_short_chain_is_rejected() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        let def = ChainDef {
            points: ground_points()[..3].to_vec(),
            ..Default::default()
        };
        assert!(matches!(
            world.create_chain(ground, &def),
            Err(PhysicsError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_chain_segments_and_destroy() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        let def = ChainDef {
            points: ground_points(),
            is_loop: true,
            ..Default::default()
        };
        let chain = world.create_chain(ground, &def).expect("chain");
        let segments = world.chain_segments(chain).expect("segments");
        assert_eq!(segments.len(), 4);
        assert_eq!(world.shape_parent_chain(segments[0]).expect("parent"), Some(chain));
        assert_eq!(world.destroy_shape(segments[0], false), Err(PhysicsError::InvalidShape));

        world.set_chain_friction(chain, 0.2).expect("friction");
        assert_relative_eq!(world.shape_friction(segments[3]).expect("friction"), 0.2);

        world.destroy_chain(chain).expect("destroy");
        assert!(!world.chain_is_valid(chain));
        assert!(segments.iter().all(|&s| !world.shape_is_valid(s)));
        assert_eq!(world.body_shape_count(ground).expect("count"), 0);
    }

    #[test]
    fn test_ball_rests_on_open_chain() {
        let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
        let ground = world.create_body(&BodyDef::default()).expect("ground");
        // Walking right to left puts the colliding side on top.
        let def = ChainDef {
            points: ground_points(),
            ..Default::default()
        };
        world.create_chain(ground, &def).expect("chain");

        let ball = world
            .create_body(&BodyDef {
                position: Vec2::new(0.0, 2.0),
                ..BodyDef::dynamic()
            })
            .expect("ball");
        world
            .create_shape(ball, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
            .expect("shape");

        for _ in 0..120 {
            world.step(1.0 / 60.0, 4);
        }
        let position = world.body_position(ball).expect("position");
        assert_relative_eq!(position.y, 0.5, epsilon = 0.02);
    }
}
