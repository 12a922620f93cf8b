//! ZCA whitening.
//!
//! `whiten` centers a working copy of the data, builds its covariance,
//! factorizes it and returns `X · W` where `W = U · diag(1/sqrt(s + eps)) · Uᵀ`.
//! Every intermediate lives only for the duration of one call.

pub mod eigen;

pub use eigen::{EigenDecomposition, EigenSettings};

use crate::error::{PrepError, Result};
use crate::numeric::mean;
use crate::FeatureMatrix;
use log::{debug, info};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EPSILON: f64 = 0.08;

/// How the working copy is centered before the covariance is taken.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Centering {
    /// Subtract each row's mean, then each column's mean of the result.
    #[default]
    RowThenColumn,
    /// Subtract each column's mean only.
    Column,
}

/// What the raw scatter matrix `Xcᵀ·Xc` is divided by.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CovarianceDivisor {
    /// Number of features (columns).
    #[default]
    Features,
    /// Number of samples minus one, the unbiased estimator.
    SamplesMinusOne,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WhiteningConfig {
    pub epsilon: f64,
    pub centering: Centering,
    pub divisor: CovarianceDivisor,
}

impl Default for WhiteningConfig {
    fn default() -> Self {
        WhiteningConfig {
            epsilon: DEFAULT_EPSILON,
            centering: Centering::default(),
            divisor: CovarianceDivisor::default(),
        }
    }
}

/// Stateless ZCA engine: it only carries configuration, never a fitted matrix.
#[derive(Debug, Clone, Default)]
pub struct ZcaWhitening {
    pub config: WhiteningConfig,
    pub eigen: EigenSettings,
}

/// Whitens `x` with the default configuration (epsilon 0.08, row-then-column
/// centering, covariance divided by the feature count).
pub fn whiten(x: &FeatureMatrix) -> Result<FeatureMatrix> {
    ZcaWhitening::default().whiten(x)
}

impl ZcaWhitening {
    pub fn new(config: WhiteningConfig) -> ZcaWhitening {
        ZcaWhitening {
            config,
            eigen: EigenSettings::default(),
        }
    }

    /// Returns `x · W`, computed from the original uncentered `x`.
    /// `x` itself is never modified.
    pub fn whiten(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.whiten_with_spectrum(x).map(|(out, _)| out)
    }

    /// Like [`ZcaWhitening::whiten`], also handing back the covariance
    /// eigenvalues (descending) the transform was built from.
    pub fn whiten_with_spectrum(
        &self,
        x: &FeatureMatrix,
    ) -> Result<(FeatureMatrix, Array1<f64>)> {
        let (w, eigen) = self.whitening_matrix(x)?;
        let out = checked_dot(x, &w, "apply whitening matrix")?;
        info!(
            "whitened {} samples x {} features (epsilon {})",
            out.nrows(),
            out.ncols(),
            self.config.epsilon
        );
        Ok((out, eigen.eigenvalues))
    }

    /// Builds `W` together with the spectrum it came from.
    pub fn whitening_matrix(
        &self,
        x: &FeatureMatrix,
    ) -> Result<(Array2<f64>, EigenDecomposition)> {
        let sigma = self.covariance(x)?;
        let eigen = EigenDecomposition::from_symmetric(&sigma, self.eigen)?;
        debug!(
            "leading eigenvalue {:e}, trailing {:e}",
            eigen.eigenvalues[0],
            eigen.eigenvalues[eigen.eigenvalues.len() - 1]
        );

        let eps = self.config.epsilon;
        let inv_sqrt = eigen.eigenvalues.mapv(|s| 1.0 / (s + eps).sqrt());
        let diag = Array2::from_diag(&inv_sqrt);

        let u = &eigen.eigenvectors;
        let ut = u.t().to_owned();
        let tmp = checked_dot(u, &diag, "scale eigenvectors")?;
        let w = checked_dot(&tmp, &ut, "rotate back")?;
        // symmetric up to rounding, transposed explicitly all the same
        let w = w.t().to_owned();

        Ok((w, eigen))
    }

    /// Covariance of the centered working copy, `Xcᵀ·Xc / divisor`.
    pub fn covariance(&self, x: &FeatureMatrix) -> Result<Array2<f64>> {
        let (rows, cols) = x.dim();
        if rows == 0 || cols == 0 {
            return Err(PrepError::shape(format!(
                "cannot whiten a {rows}x{cols} matrix"
            )));
        }

        let mut centered = x.clone();
        center(&mut centered, self.config.centering)?;
        debug!("centered {rows}x{cols} working copy");

        let divisor = match self.config.divisor {
            CovarianceDivisor::Features => cols as f64,
            CovarianceDivisor::SamplesMinusOne => {
                if rows < 2 {
                    return Err(PrepError::shape(
                        "an unbiased covariance needs at least two samples",
                    ));
                }
                (rows - 1) as f64
            }
        };

        let centered_t = centered.t();
        let sigma = checked_dot(&centered_t, &centered, "covariance")?;
        Ok(sigma / divisor)
    }
}

/// Centers `m` in place.
pub fn center(m: &mut Array2<f64>, centering: Centering) -> Result<()> {
    if centering == Centering::RowThenColumn {
        for mut row in m.rows_mut() {
            let row_mean = mean(row.iter()).ok_or_else(|| PrepError::shape("empty row"))?;
            row -= row_mean;
        }
    }
    let col_means = m
        .mean_axis(Axis(0))
        .ok_or_else(|| PrepError::shape("cannot center a matrix without rows"))?;
    *m -= &col_means;
    Ok(())
}

/// Matrix product that reports incompatible operands instead of panicking.
fn checked_dot<A, B>(
    a: &ArrayBase<A, Ix2>,
    b: &ArrayBase<B, Ix2>,
    step: &'static str,
) -> Result<Array2<f64>>
where
    A: ndarray::Data<Elem = f64>,
    B: ndarray::Data<Elem = f64>,
{
    if a.ncols() != b.nrows() {
        return Err(PrepError::DimensionMismatch {
            step,
            left: a.dim(),
            right: b.dim(),
        });
    }
    Ok(a.dot(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![
            [0.1, 0.5, 0.9, 0.3],
            [0.8, 0.2, 0.4, 0.6],
            [0.3, 0.3, 0.7, 0.1],
            [0.5, 0.9, 0.2, 0.4],
            [0.6, 0.1, 0.5, 0.8]
        ]
    }

    #[test]
    fn double_centering_zeroes_row_and_column_means() {
        let mut m = sample();
        center(&mut m, Centering::RowThenColumn).unwrap();
        for col in m.columns() {
            assert!(mean(col.iter()).unwrap().abs() < 1e-12);
        }
        for row in m.rows() {
            // column centering subtracts a vector that itself sums to zero
            assert!(mean(row.iter()).unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn column_centering_leaves_row_means() {
        let mut m = array![[1.0, 3.0], [3.0, 5.0]];
        center(&mut m, Centering::Column).unwrap();
        assert_eq!(m, array![[-1.0, -1.0], [1.0, 1.0]]);
    }

    #[test]
    fn covariance_divides_by_feature_count() {
        let x = array![[1.0, 3.0], [3.0, 5.0]];
        let engine = ZcaWhitening::new(WhiteningConfig {
            centering: Centering::Column,
            ..WhiteningConfig::default()
        });
        // centered = [[-1,-1],[1,1]], Xcᵀ·Xc = [[2,2],[2,2]], / 2 features
        assert_eq!(engine.covariance(&x).unwrap(), array![[1.0, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn covariance_unbiased_divisor() {
        let x = array![[1.0, 3.0], [3.0, 5.0], [2.0, 4.0]];
        let engine = ZcaWhitening::new(WhiteningConfig {
            centering: Centering::Column,
            divisor: CovarianceDivisor::SamplesMinusOne,
            ..WhiteningConfig::default()
        });
        let sigma = engine.covariance(&x).unwrap();
        assert!((sigma[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((sigma[(0, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unbiased_divisor_needs_two_samples() {
        let engine = ZcaWhitening::new(WhiteningConfig {
            divisor: CovarianceDivisor::SamplesMinusOne,
            ..WhiteningConfig::default()
        });
        assert!(matches!(
            engine.covariance(&array![[0.2, 0.4]]),
            Err(PrepError::InvalidShape(_))
        ));
    }

    #[test]
    fn whiten_preserves_shape_and_input() {
        let x = sample();
        let before = x.clone();
        let out = whiten(&x).unwrap();
        assert_eq!(out.dim(), x.dim());
        assert_eq!(x, before);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn spectrum_is_descending_and_matches_whiten() {
        let x = sample();
        let (out, spectrum) = ZcaWhitening::default().whiten_with_spectrum(&x).unwrap();
        assert_eq!(out, whiten(&x).unwrap());
        assert_eq!(spectrum.len(), 4);
        assert!(spectrum.windows(2).into_iter().all(|w| w[0] >= w[1]));
        assert!(spectrum.iter().all(|&s| s >= 0.0));
    }

    #[test]
    fn whiten_is_deterministic() {
        let x = sample();
        assert_eq!(whiten(&x).unwrap(), whiten(&x).unwrap());
    }

    #[test]
    fn whitening_matrix_is_symmetric() {
        let (w, _) = ZcaWhitening::default().whitening_matrix(&sample()).unwrap();
        assert!((&w - &w.t()).iter().all(|d| d.abs() < 1e-10));
    }

    #[test]
    fn whitening_matrix_matches_definition() {
        let engine = ZcaWhitening::default();
        let (w, eigen) = engine.whitening_matrix(&sample()).unwrap();
        let d = Array2::from_diag(&eigen.eigenvalues.mapv(|s| 1.0 / (s + DEFAULT_EPSILON).sqrt()));
        let expected = eigen.eigenvectors.dot(&d).dot(&eigen.eigenvectors.t());
        assert!((&w - &expected).iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn whitening_equalizes_variance_with_tiny_epsilon() {
        let engine = ZcaWhitening::new(WhiteningConfig {
            epsilon: 1e-12,
            centering: Centering::Column,
            divisor: CovarianceDivisor::SamplesMinusOne,
        });
        let x = array![[2.0, 0.1], [-1.0, 0.3], [0.5, -0.2], [-1.5, -0.2]];
        let mut centered = x.clone();
        center(&mut centered, Centering::Column).unwrap();
        let white = engine.whiten(&centered).unwrap();
        let cov = white.t().dot(&white) / 3.0;
        let eye = Array2::<f64>::eye(2);
        assert!((cov - eye).iter().all(|d| d.abs() < 1e-6));
    }

    #[test]
    fn empty_input_is_invalid() {
        let x = Array2::<f64>::zeros((0, 4));
        assert!(matches!(whiten(&x), Err(PrepError::InvalidShape(_))));
        let x = Array2::<f64>::zeros((3, 0));
        assert!(matches!(whiten(&x), Err(PrepError::InvalidShape(_))));
    }

    #[test]
    fn non_finite_input_fails_factorization() {
        let mut x = sample();
        x[(1, 1)] = f64::INFINITY;
        assert!(matches!(
            whiten(&x),
            Err(PrepError::FactorizationFailed { .. })
        ));
    }

    #[test]
    fn checked_dot_reports_step() {
        let a = Array2::<f64>::zeros((2, 3));
        let b = Array2::<f64>::zeros((2, 3));
        match checked_dot(&a, &b, "covariance") {
            Err(PrepError::DimensionMismatch { step, left, right }) => {
                assert_eq!(step, "covariance");
                assert_eq!(left, (2, 3));
                assert_eq!(right, (2, 3));
            }
            other => panic!("expected a dimension mismatch, got {other:?}"),
        }
    }
}
