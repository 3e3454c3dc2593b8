//! Chain definitions. A chain is a sequence of one-sided segments sharing a
//! body, connected through ghost vertices for smooth collision.

use crate::common::{Filter, SurfaceMaterial};
use crate::math::Vec2;
use crate::shapes::ChainSegment;

/// Used to create a chain of line segments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainDef {
    /// Application specific data.
    pub user_data: u64,
    /// The chain points, at least 4. Segments collide on their right side
    /// when walking the points in order.
    pub points: Vec<Vec2>,
    /// Surface materials. Either one material for the whole chain or one
    /// per segment.
    pub materials: Vec<SurfaceMaterial>,
    /// Contact filtering data.
    pub filter: Filter,
    /// Indicates a closed chain formed by connecting the first and last
    /// vertices.
    pub is_loop: bool,
    /// Enable sensors to detect this chain.
    pub enable_sensor_events: bool,
}

impl Default for ChainDef {
    fn default() -> Self {
        Self {
            user_data: 0,
            points: Vec::new(),
            materials: vec![SurfaceMaterial::default()],
            filter: Filter::default(),
            is_loop: false,
            enable_sensor_events: true,
        }
    }
}

impl ChainDef {
    /// Number of segments the chain will produce.
    pub fn segment_count(&self) -> usize {
        let n = self.points.len();
        if self.is_loop {
            n
        } else {
            n.saturating_sub(3)
        }
    }

    /// Material of segment `index`.
    pub fn material(&self, index: usize) -> SurfaceMaterial {
        match self.materials.len() {
            0 => SurfaceMaterial::default(),
            1 => self.materials[0],
            _ => self.materials[index.min(self.materials.len() - 1)],
        }
    }

    /// Builds the chain segments. Open chains use the first and last points
    /// only as ghost vertices.
    pub fn make_segments(&self) -> Vec<ChainSegment> {
        let points = &self.points;
        let n = points.len();
        if n < 4 {
            return Vec::new();
        }

        if self.is_loop {
            (0..n)
                .map(|i| {
                    let ghost1 = points[(i + n - 1) % n];
                    let point1 = points[i];
                    let point2 = points[(i + 1) % n];
                    let ghost2 = points[(i + 2) % n];
                    ChainSegment::new(ghost1, point1, point2, ghost2)
                })
                .collect()
        } else {
            points
                .windows(4)
                .map(|w| ChainSegment::new(w[0], w[1], w[2], w[3]))
                .collect()
        }
    }
}

/// The world's record of a chain.
#[derive(Debug, Clone)]
pub(crate) struct Chain {
    pub body: usize,
    pub generation: u16,
    /// Segment shape indices in chain order.
    pub shapes: Vec<usize>,
    pub materials: Vec<SurfaceMaterial>,
    pub is_loop: bool,
    pub user_data: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_points() -> Vec<Vec2> {
        vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ]
    }

    #[test]
    fn test_loop_segments_wrap() {
        let def = ChainDef {
            points: square_points(),
            is_loop: true,
            ..Default::default()
        };
        let segments = def.make_segments();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].ghost1, Vec2::new(-1.0, 1.0));
        assert_eq!(segments[3].segment.point2, Vec2::new(-1.0, -1.0));
        assert_eq!(segments[3].ghost2, Vec2::new(1.0, -1.0));
    }

    #[test]
    fn test_open_chain_uses_ghosts() {
        let def = ChainDef {
            points: square_points(),
            ..Default::default()
        };
        let segments = def.make_segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].ghost1, Vec2::new(-1.0, -1.0));
        assert_eq!(segments[0].segment.point1, Vec2::new(1.0, -1.0));
        assert_eq!(segments[0].ghost2, Vec2::new(-1.0, 1.0));
        assert_eq!(def.segment_count(), 1);

        let short = ChainDef {
            points: square_points()[..3].to_vec(),
            ..Default::default()
        };
        assert!(short.make_segments().is_empty());
    }
}
