//! Soft constraint coefficients.
//!
//! A soft constraint behaves like a damped spring with natural frequency
//! `hertz` and damping ratio `zeta`, integrated implicitly over the sub-step
//! `h`. The three coefficients scale the position bias, the effective mass
//! and the accumulated impulse of a rigid solve so the same code handles
//! rigid, soft and spring behavior.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Softness {
    pub bias_rate: f32,
    pub mass_scale: f32,
    pub impulse_scale: f32,
}

impl Default for Softness {
    /// A rigid constraint without position correction.
    fn default() -> Self {
        Self {
            bias_rate: 0.0,
            mass_scale: 1.0,
            impulse_scale: 0.0,
        }
    }
}

/// Builds the coefficients for a spring of the given stiffness. Zero hertz
/// gives a rigid constraint.
pub fn make_soft(hertz: f32, zeta: f32, h: f32) -> Softness {
    if hertz == 0.0 {
        return Softness::default();
    }

    let omega = 2.0 * PI * hertz;
    let a1 = 2.0 * zeta + h * omega;
    let a2 = h * omega * a1;
    let a3 = 1.0 / (1.0 + a2);
    Softness {
        bias_rate: omega / a1,
        mass_scale: a2 * a3,
        impulse_scale: a3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rigid_when_zero_hertz() {
        assert_eq!(make_soft(0.0, 1.0, 1.0 / 240.0), Softness::default());
    }

    #[test]
    fn test_mass_and_impulse_scale_sum_to_one() {
        let soft = make_soft(30.0, 10.0, 1.0 / 240.0);
        assert_relative_eq!(soft.mass_scale + soft.impulse_scale, 1.0, epsilon = 1e-6);
        assert!(soft.bias_rate > 0.0);

        // Stiffer springs approach the rigid mass
        let stiff = make_soft(1000.0, 1.0, 1.0 / 240.0);
        assert!(stiff.mass_scale > soft.mass_scale);
    }
}
