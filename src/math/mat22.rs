use super::vec2::Vec2;

/// A 2-by-2 matrix stored as two columns.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat22 {
    pub cx: Vec2,
    pub cy: Vec2,
}

impl Mat22 {
    pub const ZERO: Mat22 = Mat22 {
        cx: Vec2::ZERO,
        cy: Vec2::ZERO,
    };

    pub fn new(cx: Vec2, cy: Vec2) -> Self {
        Self { cx, cy }
    }

    /// Matrix-vector product.
    pub fn mul_v(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cx.x * v.x + self.cy.x * v.y,
            self.cx.y * v.x + self.cy.y * v.y,
        )
    }

    /// Inverse, or the zero matrix when singular.
    pub fn inverse(&self) -> Mat22 {
        let (a, b, c, d) = (self.cx.x, self.cy.x, self.cx.y, self.cy.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat22 {
            cx: Vec2::new(det * d, -det * c),
            cy: Vec2::new(-det * b, det * a),
        }
    }

    /// Solves `A * x = b`. Returns zero when the matrix is singular.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.cx.x, self.cy.x, self.cx.y, self.cy.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_matches_inverse() {
        let m = Mat22::new(Vec2::new(4.0, 1.0), Vec2::new(2.0, 3.0));
        let b = Vec2::new(1.0, -2.0);
        let x = m.solve(b);
        let r = m.mul_v(x);
        assert!((r.x - b.x).abs() < 1e-5 && (r.y - b.y).abs() < 1e-5);
        let y = m.inverse().mul_v(b);
        assert!((x.x - y.x).abs() < 1e-5 && (x.y - y.y).abs() < 1e-5);
    }

    #[test]
    fn test_singular_matrix_solves_to_zero() {
        let m = Mat22::new(Vec2::new(1.0, 2.0), Vec2::new(2.0, 4.0));
        assert_eq!(m.solve(Vec2::new(1.0, 1.0)), Vec2::ZERO);
    }
}
