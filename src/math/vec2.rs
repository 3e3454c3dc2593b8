use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// A 2D column vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const X: Vec2 = Vec2 { x: 1.0, y: 0.0 };
    pub const Y: Vec2 = Vec2 { x: 0.0, y: 1.0 };

    /// Creates a new Vec2.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Vector dot product.
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Vector cross product. In 2D this yields a scalar.
    #[inline]
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Cross product of this vector with a scalar, `v x s`.
    #[inline]
    pub fn cross_scalar(self, s: f32) -> Self {
        Self::new(s * self.y, -s * self.x)
    }

    /// Cross product of a scalar with a vector, `s x v`.
    #[inline]
    pub fn scalar_cross(s: f32, v: Self) -> Self {
        Self::new(-s * v.y, s * v.x)
    }

    /// Counter-clockwise perpendicular, `s x v` with `s = 1`.
    #[inline]
    pub fn left_perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Clockwise perpendicular, `v x s` with `s = 1`.
    #[inline]
    pub fn right_perp(self) -> Self {
        Self::new(self.y, -self.x)
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (other - self).length_squared()
    }

    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Returns the unit vector in the same direction, or zero if the vector
    /// is too short to normalize.
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length < f32::EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / length)
    }

    /// Returns the length together with the normalized vector.
    pub fn length_and_normalize(self) -> (f32, Self) {
        let length = self.length();
        if length < f32::EPSILON {
            return (0.0, Self::ZERO);
        }
        (length, self * (1.0 / length))
    }

    /// True if the vector has unit length within a loose tolerance.
    pub fn is_normalized(self) -> bool {
        let aa = self.length_squared();
        (1.0 - aa).abs() < 100.0 * f32::EPSILON
    }

    /// Component-wise multiplication.
    #[inline]
    pub fn component_mul(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y)
    }

    /// `a + s * b`
    #[inline]
    pub fn mul_add(a: Self, s: f32, b: Self) -> Self {
        Self::new(a.x + s * b.x, a.y + s * b.y)
    }

    /// `a - s * b`
    #[inline]
    pub fn mul_sub(a: Self, s: f32, b: Self) -> Self {
        Self::new(a.x - s * b.x, a.y - s * b.y)
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Clamps each component into `[lower, upper]`.
    #[inline]
    pub fn clamp(self, lower: Self, upper: Self) -> Self {
        self.max(lower).min(upper)
    }

    /// Linear interpolation from `a` to `b`.
    #[inline]
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self::new((1.0 - t) * a.x + t * b.x, (1.0 - t) * a.y + t * b.y)
    }

    /// Both components are finite numbers.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// Implement Add trait
impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

// Implement Sub trait
impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

// Scalar multiplication (Vec2 * f32)
impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

// Scalar multiplication (f32 * Vec2)
impl Mul<Vec2> for f32 {
    type Output = Vec2;

    #[inline]
    fn mul(self, vec: Vec2) -> Vec2 {
        vec * self
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, scalar: f32) {
        self.x *= scalar;
        self.y *= scalar;
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

// Division by a scalar. Division by zero follows IEEE rules.
impl Div<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_vec2_arithmetic() {
        let v1 = Vec2::new(1.0, 2.0);
        let v2 = Vec2::new(3.0, 4.0);
        assert_eq!(v1 + v2, Vec2::new(4.0, 6.0));
        assert_eq!(v2 - v1, Vec2::new(2.0, 2.0));
        assert_eq!(v1 * 3.0, Vec2::new(3.0, 6.0));
        assert_eq!(3.0 * v1, Vec2::new(3.0, 6.0));
        assert_eq!(-v1, Vec2::new(-1.0, -2.0));
    }

    #[test]
    fn test_vec2_dot_and_cross() {
        let v1 = Vec2::new(1.0, 2.0);
        let v2 = Vec2::new(3.0, 4.0);
        assert!((v1.dot(v2) - 11.0).abs() < EPSILON);
        assert!((v1.cross(v2) - -2.0).abs() < EPSILON);

        // s x v is the left perpendicular scaled by s
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(Vec2::scalar_cross(1.0, v), v.left_perp());
        assert_eq!(v.cross_scalar(1.0), v.right_perp());
        assert!(v.dot(v.left_perp()).abs() < EPSILON);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2::new(3.0, 4.0);
        let (length, n) = v.length_and_normalize();
        assert!((length - 5.0).abs() < EPSILON);
        assert!((n.length() - 1.0).abs() < EPSILON);
        assert!(n.is_normalized());

        // Tiny vectors collapse to zero instead of producing NaN
        assert_eq!(Vec2::new(1.0e-9, 0.0).normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_vec2_lerp_and_clamp() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, -4.0);
        assert_eq!(Vec2::lerp(a, b, 0.5), Vec2::new(1.0, -2.0));
        let c = Vec2::new(5.0, -5.0).clamp(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        assert_eq!(c, Vec2::new(1.0, -1.0));
        assert!(!Vec2::new(f32::NAN, 0.0).is_valid());
    }
}
