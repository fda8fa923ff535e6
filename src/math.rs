//! Mathematical utilities and nalgebra extensions for the horizon-dcm library

use nalgebra::{ComplexField, Matrix3, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Reciprocal square root for arguments close to one
///
/// First-order Taylor expansion of `1/sqrt(x)` around `x = 1`:
/// `1/sqrt(x) ~= (3 - x) / 2`. Only meaningful when `x` is already near one,
/// which holds for the squared row lengths of a matrix renormalized every cycle.
#[inline]
pub fn taylor_inverse_sqrt(x: f32) -> f32 {
    0.5 * (3.0 - x)
}

/// Extension trait for checking how far a matrix is from a rotation
pub trait Matrix3Ext {
    /// Row `i` as a column vector
    fn row_vector(&self, i: usize) -> Vector3<f32>;

    /// Largest absolute deviation from orthonormality over all rows
    ///
    /// Max of `|row_i . row_j|` for `i != j` and `| |row_i| - 1 |`.
    fn orthonormality_error(&self) -> f32;
}

impl Matrix3Ext for Matrix3<f32> {
    fn row_vector(&self, i: usize) -> Vector3<f32> {
        self.row(i).transpose()
    }

    fn orthonormality_error(&self) -> f32 {
        let rows = [self.row_vector(0), self.row_vector(1), self.row_vector(2)];
        let mut worst: f32 = 0.0;
        for i in 0..3 {
            worst = worst.max((rows[i].norm() - 1.0).abs());
            for j in (i + 1)..3 {
                worst = worst.max(rows[i].dot(&rows[j]).abs());
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taylor_inverse_sqrt() {
        for x in [0.98f32, 0.999, 1.0, 1.001, 1.02] {
            let exact = 1.0 / x.sqrt();
            // second-order error term is 3/8 (x - 1)^2
            assert!((taylor_inverse_sqrt(x) - exact).abs() < 0.5 * (x - 1.0).powi(2) + 1e-6);
        }
        assert_eq!(taylor_inverse_sqrt(1.0), 1.0);
    }

    #[test]
    fn test_orthonormality_error() {
        let identity = Matrix3::<f32>::identity();
        assert_eq!(identity.orthonormality_error(), 0.0);

        let skewed = Matrix3::new(1.0, 0.01, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let err = skewed.orthonormality_error();
        assert!(err > 0.009 && err < 0.011);
    }

    #[test]
    fn test_row_vector() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(m.row_vector(1), Vector3::new(4.0, 5.0, 6.0));
    }
}
