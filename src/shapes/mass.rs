use crate::math::Vec2;

/// Mass properties of a shape or body.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MassData {
    /// The mass of the shape, usually in kilograms.
    pub mass: f32,
    /// The position of the shape's centroid relative to the shape's origin.
    pub center: Vec2,
    /// The rotational inertia of the shape about its centroid.
    pub rotational_inertia: f32,
}

impl MassData {
    /// Rotational inertia about an arbitrary point, by the parallel axis theorem.
    pub fn inertia_about(&self, point: Vec2) -> f32 {
        self.rotational_inertia + self.mass * self.center.distance_squared(point)
    }
}

/// Combines mass data of several shapes into the mass data of their union.
/// The returned inertia is about the combined center of mass.
pub fn combine_mass(parts: &[MassData]) -> MassData {
    let mass: f32 = parts.iter().map(|m| m.mass).sum();
    if mass <= 0.0 {
        return MassData::default();
    }

    let mut center = Vec2::ZERO;
    for part in parts {
        center = Vec2::mul_add(center, part.mass, part.center);
    }
    center = center * (1.0 / mass);

    let rotational_inertia = parts.iter().map(|m| m.inertia_about(center)).sum();
    MassData {
        mass,
        center,
        rotational_inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_two_point_masses() {
        let a = MassData { mass: 1.0, center: Vec2::new(-1.0, 0.0), rotational_inertia: 0.0 };
        let b = MassData { mass: 1.0, center: Vec2::new(1.0, 0.0), rotational_inertia: 0.0 };
        let combined = combine_mass(&[a, b]);
        assert_eq!(combined.mass, 2.0);
        assert_eq!(combined.center, Vec2::ZERO);
        assert_eq!(combined.rotational_inertia, 2.0);
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine_mass(&[]), MassData::default());
    }
}
