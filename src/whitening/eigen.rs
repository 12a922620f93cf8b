//! Symmetric eigen-decomposition on top of `nalgebra`'s implicit QR solver.

use crate::error::{PrepError, Result};
use log::{debug, warn};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::prelude::*;

const STEP: &str = "eigen-decomposition";

/// Eigenvalues sorted in descending order, eigenvectors as the matching columns.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub eigenvalues: Array1<f64>,
    pub eigenvectors: Array2<f64>,
}

/// Knobs for the QR iterations.
#[derive(Debug, Clone, Copy)]
pub struct EigenSettings {
    /// Iteration budget per matrix dimension; a `d x d` matrix gets `d` times this.
    pub iterations_per_dim: usize,
    /// Relative size below which an off-diagonal entry counts as zero.
    pub tolerance: f64,
    /// Accepted asymmetry relative to `||A||_F` before giving up.
    pub symmetry_tolerance: f64,
}

impl Default for EigenSettings {
    fn default() -> Self {
        EigenSettings {
            iterations_per_dim: 30,
            tolerance: f64::EPSILON,
            symmetry_tolerance: 1e-9,
        }
    }
}

impl EigenDecomposition {
    /// Factorizes a symmetric positive semi-definite matrix.
    ///
    /// Eigenvalues below zero are rounding noise for a PSD input and are clamped
    /// to zero, matching what an SVD of the same matrix reports.
    pub fn from_symmetric(matrix: &Array2<f64>, settings: EigenSettings) -> Result<Self> {
        let (n, m) = matrix.dim();
        if n != m {
            return Err(PrepError::DimensionMismatch {
                step: STEP,
                left: (n, m),
                right: (m, n),
            });
        }
        if n == 0 {
            return Err(PrepError::shape("cannot factorize an empty matrix"));
        }
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(PrepError::FactorizationFailed {
                step: STEP,
                reason: "matrix contains non-finite entries".to_string(),
            });
        }

        let scale = frobenius_norm(matrix);
        let asymmetry = max_asymmetry(matrix);
        if asymmetry > settings.symmetry_tolerance * scale.max(1.0) {
            return Err(PrepError::FactorizationFailed {
                step: STEP,
                reason: format!("matrix is not symmetric (max |a_ij - a_ji| = {asymmetry:e})"),
            });
        }

        // nalgebra treats a zero budget as unbounded
        let budget = settings.iterations_per_dim.saturating_mul(n).max(1);
        let dm = DMatrix::from_fn(n, n, |i, j| matrix[(i, j)]);
        let Some(eigen) = SymmetricEigen::try_new(dm, settings.tolerance, budget) else {
            warn!("symmetric eigen-decomposition of a {n}x{n} matrix did not converge");
            return Err(PrepError::FactorizationFailed {
                step: STEP,
                reason: format!("no convergence within {budget} iterations"),
            });
        };

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        let mut clamped = 0;
        let eigenvalues: Array1<f64> = order
            .iter()
            .map(|&i| {
                let lambda = eigen.eigenvalues[i];
                if lambda < 0.0 {
                    clamped += 1;
                    0.0
                } else {
                    lambda
                }
            })
            .collect();
        if clamped > 0 {
            debug!("clamped {clamped} negative eigenvalues to zero");
        }

        let vectors = &eigen.eigenvectors;
        let eigenvectors = Array2::from_shape_fn((n, n), |(r, c)| vectors[(r, order[c])]);

        Ok(EigenDecomposition {
            eigenvalues,
            eigenvectors,
        })
    }
}

fn frobenius_norm(a: &Array2<f64>) -> f64 {
    a.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn max_asymmetry(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut worst: f64 = 0.0;
    for i in 0..n {
        for j in i + 1..n {
            worst = worst.max((a[(i, j)] - a[(j, i)]).abs());
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn reconstruct(e: &EigenDecomposition) -> Array2<f64> {
        let d = Array2::from_diag(&e.eigenvalues);
        e.eigenvectors.dot(&d).dot(&e.eigenvectors.t())
    }

    #[test]
    fn two_by_two_known_spectrum() {
        let m = array![[4.0, 2.0], [2.0, 3.0]];
        let e = EigenDecomposition::from_symmetric(&m, EigenSettings::default()).unwrap();

        let disc = 17f64.sqrt();
        assert!((e.eigenvalues[0] - (7.0 + disc) / 2.0).abs() < 1e-10);
        assert!((e.eigenvalues[1] - (7.0 - disc) / 2.0).abs() < 1e-10);
        assert!((reconstruct(&e) - &m).iter().all(|x| x.abs() < 1e-10));
    }

    #[test]
    fn eigenvectors_are_orthonormal() {
        let m = array![
            [2.0, -1.0, 0.0, 0.5],
            [-1.0, 2.0, -1.0, 0.0],
            [0.0, -1.0, 2.0, 0.3],
            [0.5, 0.0, 0.3, 1.0]
        ];
        let e = EigenDecomposition::from_symmetric(&m, EigenSettings::default()).unwrap();
        let gram = e.eigenvectors.t().dot(&e.eigenvectors);
        let eye = Array2::<f64>::eye(4);
        assert!((gram - eye).iter().all(|x| x.abs() < 1e-10));
        assert!((reconstruct(&e) - &m).iter().all(|x| x.abs() < 1e-10));
    }

    #[test]
    fn eigenvalues_come_out_descending() {
        let m = Array2::from_diag(&array![1.0, 5.0, 3.0]);
        let e = EigenDecomposition::from_symmetric(&m, EigenSettings::default()).unwrap();
        let expected = array![5.0, 3.0, 1.0];
        assert!((&e.eigenvalues - &expected).iter().all(|x| x.abs() < 1e-12));
        // eigenvectors are only defined up to sign
        let lead = e.eigenvectors.column(0).mapv(f64::abs);
        assert!((lead - array![0.0, 1.0, 0.0]).iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn zero_matrix_is_already_diagonal() {
        let m = Array2::<f64>::zeros((3, 3));
        let e = EigenDecomposition::from_symmetric(&m, EigenSettings::default()).unwrap();
        assert!(e.eigenvalues.iter().all(|x| x.abs() < 1e-15));
    }

    #[test]
    fn asymmetric_input_fails() {
        let m = array![[1.0, 2.0], [0.0, 1.0]];
        let err = EigenDecomposition::from_symmetric(&m, EigenSettings::default()).unwrap_err();
        assert!(matches!(err, PrepError::FactorizationFailed { .. }));
    }

    #[test]
    fn non_finite_input_fails() {
        let m = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        assert!(matches!(
            EigenDecomposition::from_symmetric(&m, EigenSettings::default()),
            Err(PrepError::FactorizationFailed { .. })
        ));
    }

    #[test]
    fn iteration_budget_exhaustion_fails() {
        let m = array![
            [4.0, 1.0, 0.5, 0.2],
            [1.0, 3.0, 1.0, 0.4],
            [0.5, 1.0, 2.0, 0.7],
            [0.2, 0.4, 0.7, 1.0]
        ];
        let settings = EigenSettings {
            iterations_per_dim: 0,
            ..EigenSettings::default()
        };
        assert!(matches!(
            EigenDecomposition::from_symmetric(&m, settings),
            Err(PrepError::FactorizationFailed { .. })
        ));
    }

    #[test]
    fn rank_deficient_covariance_factorizes() {
        // fewer samples than features, like a small MNIST subset
        let x = Array2::from_shape_fn((40, 196), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 97.0);
        let sigma = x.t().dot(&x) / 196.0;
        let e = EigenDecomposition::from_symmetric(&sigma, EigenSettings::default()).unwrap();
        assert_eq!(e.eigenvalues.len(), 196);
        assert!(e.eigenvalues.windows(2).into_iter().all(|w| w[0] >= w[1]));
        assert!(e.eigenvalues[60] < 1e-8 * e.eigenvalues[0]);
        let gram = e.eigenvectors.t().dot(&e.eigenvectors);
        assert!((gram - Array2::<f64>::eye(196)).iter().all(|x| x.abs() < 1e-8));
    }

    #[test]
    fn non_square_input_is_a_dimension_mismatch() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            EigenDecomposition::from_symmetric(&m, EigenSettings::default()),
            Err(PrepError::DimensionMismatch { .. })
        ));
    }
}
