// Defines an Axis-Aligned Bounding Box

use crate::collision::cast::CastOutput;
use crate::math::Vec2;

/// An Axis-Aligned Bounding Box defined by its minimum and maximum corner points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    /// Creates a new AABB, sorting the corners so that `min <= max`.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        AABB {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box centered on `center` with the given half extents.
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        AABB {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Checks if this AABB overlaps another. Touching boxes overlap.
    #[inline]
    pub fn overlaps(&self, other: &AABB) -> bool {
        !(other.min.x > self.max.x || other.min.y > self.max.y || self.min.x > other.max.x || self.min.y > other.max.y)
    }

    /// Does this box fully contain `other`?
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x && self.min.y <= other.min.y && other.max.x <= self.max.x && other.max.y <= self.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.min.x <= point.x && point.x <= self.max.x && self.min.y <= point.y && point.y <= self.max.y
    }

    /// Smallest box containing both boxes.
    #[inline]
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Merges another AABB into this one, expanding this AABB to contain both.
    pub fn merge(&mut self, other: &AABB) {
        *self = self.union(other);
    }

    /// Grows this box to contain `other`. Returns true if the box changed.
    pub fn enlarge(&mut self, other: &AABB) -> bool {
        let mut changed = false;
        if other.min.x < self.min.x {
            self.min.x = other.min.x;
            changed = true;
        }
        if other.min.y < self.min.y {
            self.min.y = other.min.y;
            changed = true;
        }
        if self.max.x < other.max.x {
            self.max.x = other.max.x;
            changed = true;
        }
        if self.max.y < other.max.y {
            self.max.y = other.max.y;
            changed = true;
        }
        changed
    }

    /// Box grown by `margin` on every side.
    #[inline]
    pub fn fattened(&self, margin: f32) -> AABB {
        let r = Vec2::new(margin, margin);
        AABB {
            min: self.min - r,
            max: self.max + r,
        }
    }

    /// Perimeter length, the cost metric of the dynamic tree.
    #[inline]
    pub fn perimeter(&self) -> f32 {
        let wx = self.max.x - self.min.x;
        let wy = self.max.y - self.min.y;
        2.0 * (wx + wy)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(0.5 * (self.min.x + self.max.x), 0.5 * (self.min.y + self.max.y))
    }

    /// Half widths.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        Vec2::new(0.5 * (self.max.x - self.min.x), 0.5 * (self.max.y - self.min.y))
    }

    /// Finite corners with `min <= max`.
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_valid() && self.max.is_valid()
    }

    /// Creates an AABB that encompasses a set of points.
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = AABB { min: *first, max: *first };
        for point in rest {
            aabb.min = aabb.min.min(*point);
            aabb.max = aabb.max.max(*point);
        }
        Some(aabb)
    }

    /// Slab test of the segment `p1-p2` against the box. Rays starting
    /// inside the box report no hit.
    pub fn ray_cast(&self, p1: Vec2, p2: Vec2) -> CastOutput {
        let mut output = CastOutput::default();

        let mut tmin = -f32::MAX;
        let mut tmax = f32::MAX;

        let d = p2 - p1;
        let abs_d = d.abs();
        let mut normal = Vec2::ZERO;

        for axis in 0..2 {
            let (p, dd, abs_dd, lower, upper) = if axis == 0 {
                (p1.x, d.x, abs_d.x, self.min.x, self.max.x)
            } else {
                (p1.y, d.y, abs_d.y, self.min.y, self.max.y)
            };

            if abs_dd < f32::EPSILON {
                // Parallel
                if p < lower || upper < p {
                    return output;
                }
            } else {
                let inv_d = 1.0 / dd;
                let mut t1 = (lower - p) * inv_d;
                let mut t2 = (upper - p) * inv_d;

                // Sign of the normal vector
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }

                // Push the min up
                if t1 > tmin {
                    normal = if axis == 0 { Vec2::new(s, 0.0) } else { Vec2::new(0.0, s) };
                    tmin = t1;
                }

                // Pull the max down
                tmax = tmax.min(t2);

                if tmin > tmax {
                    return output;
                }
            }
        }

        // Does the ray start inside the box or hit beyond the segment?
        if !(0.0..=1.0).contains(&tmin) {
            return output;
        }

        output.fraction = tmin;
        output.normal = normal;
        output.point = Vec2::lerp(p1, p2, tmin);
        output.hit = true;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_and_containment() {
        let a = AABB::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 2.0));
        let b = AABB::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = AABB::new(Vec2::new(2.5, 2.5), Vec2::new(3.0, 3.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.union(&c).contains(&b));
        assert!(!a.contains(&b));
        assert_eq!(a.perimeter(), 8.0);
        assert_eq!(a.center(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_enlarge_reports_change() {
        let mut a = AABB::new(Vec2::ZERO, Vec2::new(1.0, 1.0));
        assert!(!a.enlarge(&AABB::new(Vec2::new(0.2, 0.2), Vec2::new(0.8, 0.8))));
        assert!(a.enlarge(&AABB::new(Vec2::new(-1.0, 0.2), Vec2::new(0.8, 0.8))));
        assert_eq!(a.min.x, -1.0);
    }

    #[test]
    fn test_from_points() {
        assert!(AABB::from_points(&[]).is_none());
        let aabb = AABB::from_points(&[Vec2::new(1.0, -2.0), Vec2::new(-3.0, 4.0)]).unwrap();
        assert_eq!(aabb.min, Vec2::new(-3.0, -2.0));
        assert_eq!(aabb.max, Vec2::new(1.0, 4.0));
        assert!(aabb.is_valid());
    }

    #[test]
    fn test_ray_cast() {
        let aabb = AABB::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0));
        let output = aabb.ray_cast(Vec2::new(-3.0, 0.0), Vec2::new(3.0, 0.0));
        assert!(output.hit);
        assert!((output.fraction - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(output.normal, Vec2::new(-1.0, 0.0));

        // Starting inside is not a hit
        assert!(!aabb.ray_cast(Vec2::ZERO, Vec2::new(3.0, 0.0)).hit);
        // Miss above the box
        assert!(!aabb.ray_cast(Vec2::new(-3.0, 2.0), Vec2::new(3.0, 2.0)).hit);
    }
}
