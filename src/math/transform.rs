use super::rotation::Rot;
use super::vec2::Vec2;

/// A rigid transform: a translation followed by a rotation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Creates a new transform.
    pub fn new(p: Vec2, q: Rot) -> Self {
        Self { p, q }
    }

    /// Creates a transform from a position and an angle in radians.
    pub fn from_angle(p: Vec2, radians: f32) -> Self {
        Self {
            p,
            q: Rot::from_angle(radians),
        }
    }

    /// Applies the transform (rotation then translation) to a point.
    #[inline]
    pub fn apply(self, point: Vec2) -> Vec2 {
        self.q.rotate(point) + self.p
    }

    /// Applies the inverse transform (inverse translation then inverse rotation) to a point.
    #[inline]
    pub fn apply_inverse(self, point: Vec2) -> Vec2 {
        self.q.inv_rotate(point - self.p)
    }

    /// Composition `self * other`: maps from `other`'s frame through `self`.
    pub fn mul(self, other: Transform) -> Transform {
        Transform {
            q: self.q.mul(other.q),
            p: self.q.rotate(other.p) + self.p,
        }
    }

    /// `inverse(self) * other`: expresses `other` in the frame of `self`.
    pub fn inv_mul(self, other: Transform) -> Transform {
        Transform {
            q: self.q.inv_mul(other.q),
            p: self.q.inv_rotate(other.p - self.p),
        }
    }

    pub fn is_valid(self) -> bool {
        self.p.is_valid() && self.q.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_apply_identity() {
        let t = Transform::IDENTITY;
        let p = Vec2::new(5.0, -3.0);
        assert_eq!(t.apply(p), p);
        assert_eq!(t.apply_inverse(p), p);
    }

    #[test]
    fn test_transform_apply_rotation_translation() {
        let t = Transform::from_angle(Vec2::new(10.0, 5.0), PI / 2.0);
        let p = Vec2::new(1.0, 0.0);
        let tp = t.apply(p);
        // Rotating (1,0) by 90 degrees gives (0,1), then translate
        assert!((tp.x - 10.0).abs() < EPSILON);
        assert!((tp.y - 6.0).abs() < EPSILON);

        let back = t.apply_inverse(tp);
        assert!((back.x - p.x).abs() < EPSILON);
        assert!((back.y - p.y).abs() < EPSILON);
    }

    #[test]
    fn test_transform_composition() {
        let a = Transform::from_angle(Vec2::new(1.0, 2.0), 0.4);
        let b = Transform::from_angle(Vec2::new(-3.0, 0.5), -1.2);
        let p = Vec2::new(0.7, -0.2);

        let ab = a.mul(b);
        let expected = a.apply(b.apply(p));
        let actual = ab.apply(p);
        assert!((expected.x - actual.x).abs() < EPSILON);
        assert!((expected.y - actual.y).abs() < EPSILON);

        // inv_mul(a, ab) recovers b
        let rb = a.inv_mul(ab);
        assert!((rb.p.x - b.p.x).abs() < EPSILON);
        assert!((rb.p.y - b.p.y).abs() < EPSILON);
        assert!((rb.q.angle() - b.q.angle()).abs() < EPSILON);
    }
}
