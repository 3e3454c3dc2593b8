use super::vec2::Vec2;
use std::f32::consts::PI;

/// Rotation stored as a unit cosine/sine pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Rot {
    /// Cosine component.
    pub c: f32,
    /// Sine component.
    pub s: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Cosine and sine of an angle, as produced by [`compute_cos_sin`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosSin {
    pub cosine: f32,
    pub sine: f32,
}

/// Wraps an angle into `[-pi, pi]`.
pub fn unwind_angle(radians: f32) -> f32 {
    if (-PI..=PI).contains(&radians) {
        return radians;
    }
    radians - 2.0 * PI * ((radians + PI) / (2.0 * PI)).floor()
}

/// Rational approximation of cosine and sine that yields identical results
/// on every platform, unlike the libm routines.
pub fn compute_cos_sin(radians: f32) -> CosSin {
    let x = unwind_angle(radians);
    let pi2 = PI * PI;

    // cosine needs the angle in [-pi/2, pi/2]
    let c = if x < -0.5 * PI {
        let y = x + PI;
        let y2 = y * y;
        -(pi2 - 4.0 * y2) / (pi2 + y2)
    } else if x > 0.5 * PI {
        let y = x - PI;
        let y2 = y * y;
        -(pi2 - 4.0 * y2) / (pi2 + y2)
    } else {
        let y2 = x * x;
        (pi2 - 4.0 * y2) / (pi2 + y2)
    };

    // sine needs the angle in [0, pi]
    let s = if x < 0.0 {
        let y = x + PI;
        -16.0 * y * (PI - y) / (5.0 * pi2 - 4.0 * y * (PI - y))
    } else {
        16.0 * x * (PI - x) / (5.0 * pi2 - 4.0 * x * (PI - x))
    };

    let mag = (s * s + c * c).sqrt();
    let inv_mag = if mag > 0.0 { 1.0 / mag } else { 0.0 };
    CosSin {
        cosine: c * inv_mag,
        sine: s * inv_mag,
    }
}

impl Rot {
    pub const IDENTITY: Rot = Rot { c: 1.0, s: 0.0 };

    /// Creates a rotation from raw cosine/sine values without normalizing.
    pub const fn new(c: f32, s: f32) -> Self {
        Self { c, s }
    }

    /// Creates a rotation from an angle in radians.
    pub fn from_angle(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self { c, s }
    }

    /// Creates a rotation using the platform independent approximation.
    pub fn from_angle_approx(radians: f32) -> Self {
        let cs = compute_cos_sin(radians);
        Self {
            c: cs.cosine,
            s: cs.sine,
        }
    }

    /// Rotation that maps the x-axis onto the given unit vector.
    pub fn from_unit_vector(v: Vec2) -> Self {
        Self { c: v.x, s: v.y }.normalize()
    }

    /// Angle in radians in `[-pi, pi]`.
    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    pub fn normalize(self) -> Self {
        let mag = (self.s * self.s + self.c * self.c).sqrt();
        let inv_mag = if mag > 0.0 { 1.0 / mag } else { 0.0 };
        Self {
            c: self.c * inv_mag,
            s: self.s * inv_mag,
        }
    }

    pub fn is_normalized(self) -> bool {
        let qq = self.s * self.s + self.c * self.c;
        1.0 - 0.0006 < qq && qq < 1.0 + 0.0006
    }

    pub fn is_valid(self) -> bool {
        self.s.is_finite() && self.c.is_finite() && self.is_normalized()
    }

    /// Rotates a vector.
    #[inline]
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotates a vector by the inverse rotation.
    #[inline]
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// `self * other`
    pub fn mul(self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// `transpose(self) * other`
    pub fn inv_mul(self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }

    /// Advances the rotation by a small angle and re-normalizes, which keeps
    /// the pair on the unit circle without any trigonometry.
    pub fn integrate(self, delta_angle: f32) -> Rot {
        let q2 = Rot {
            c: self.c - delta_angle * self.s,
            s: self.s + delta_angle * self.c,
        };
        q2.normalize()
    }

    /// Normalized linear interpolation between two rotations.
    pub fn nlerp(q1: Rot, q2: Rot, t: f32) -> Rot {
        let omt = 1.0 - t;
        Rot {
            c: omt * q1.c + t * q2.c,
            s: omt * q1.s + t * q2.s,
        }
        .normalize()
    }

    /// Relative angle `b - a` in `[-pi, pi]`.
    pub fn relative_angle(a: Rot, b: Rot) -> f32 {
        let s = a.c * b.s - a.s * b.c;
        let c = a.c * b.c + a.s * b.s;
        s.atan2(c)
    }

    /// Angular velocity needed to rotate from `q1` to `q2` over a step with
    /// inverse duration `inv_h`.
    pub fn angular_velocity(q1: Rot, q2: Rot, inv_h: f32) -> f32 {
        inv_h * (q2.s * q1.c - q2.c * q1.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_rotate_quarter_turn() {
        let q = Rot::from_angle(0.5 * PI);
        let v = q.rotate(Vec2::new(1.0, 0.0));
        assert!(v.x.abs() < EPSILON);
        assert!((v.y - 1.0).abs() < EPSILON);
        let back = q.inv_rotate(v);
        assert!((back.x - 1.0).abs() < EPSILON);
        assert!(back.y.abs() < EPSILON);
    }

    #[test]
    fn test_integrate_stays_normalized() {
        let mut q = Rot::IDENTITY;
        for _ in 0..1000 {
            q = q.integrate(0.01);
        }
        assert!(q.is_normalized());
        assert!((q.angle() - unwind_angle(10.0)).abs() < 0.05);
    }

    #[test]
    fn test_relative_angle_and_mul() {
        let a = Rot::from_angle(0.3);
        let b = Rot::from_angle(1.1);
        assert!((Rot::relative_angle(a, b) - 0.8).abs() < EPSILON);
        assert!((a.mul(b).angle() - 1.4).abs() < EPSILON);
        assert!((a.inv_mul(b).angle() - 0.8).abs() < EPSILON);
    }

    #[test]
    fn test_unwind_angle() {
        assert!((unwind_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-4);
        assert!((unwind_angle(-2.5 * PI) - -0.5 * PI).abs() < 1e-4);
        assert_eq!(unwind_angle(1.0), 1.0);
    }

    #[test]
    fn test_cos_sin_approximation() {
        for i in -20..=20 {
            let angle = 0.15 * i as f32;
            let cs = compute_cos_sin(angle);
            assert!((cs.cosine - angle.cos()).abs() < 0.003);
            assert!((cs.sine - angle.sin()).abs() < 0.003);
        }
    }
}
