use super::vec2::Vec2;

/// Separating plane `dot(normal, point) = offset`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Plane {
    pub normal: Vec2,
    pub offset: f32,
}

impl Plane {
    pub fn new(normal: Vec2, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Signed distance of a point to the plane.
    #[inline]
    pub fn separation(&self, point: Vec2) -> f32 {
        self.normal.dot(point) - self.offset
    }

    pub fn is_valid(&self) -> bool {
        self.normal.is_valid() && self.offset.is_finite() && self.normal.is_normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_separation() {
        let plane = Plane::new(Vec2::new(0.0, 1.0), 2.0);
        assert_eq!(plane.separation(Vec2::new(7.0, 5.0)), 3.0);
        assert_eq!(plane.separation(Vec2::new(-1.0, 0.0)), -2.0);
        assert!(plane.is_valid());
    }
}
