use nalgebra::{DMatrix, DVector, RealField};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MvnError {
    #[error("covariance is not positive definite")]
    CovarianceNotPositiveDefinite,
    #[error("covariance is {rows}x{cols} but the mean has {dim} entries")]
    DimensionMismatch { dim: usize, rows: usize, cols: usize },
}

#[derive(Debug, Clone)]
pub struct MultiVariateNormal<T: RealField> {
    mean: DVector<T>,
    precision: DMatrix<T>,
    lower: DMatrix<T>,
    factor: T,
}

impl<T: RealField + Copy> MultiVariateNormal<T> {
    pub fn new(mean: &DVector<T>, covariance: &DMatrix<T>) -> Result<Self, MvnError> {
        let dim = mean.nrows();
        if covariance.nrows() != dim || covariance.ncols() != dim {
            return Err(MvnError::DimensionMismatch {
                dim,
                rows: covariance.nrows(),
                cols: covariance.ncols(),
            });
        }
        let Some(covariance_cholesky) = covariance.clone().cholesky() else {
            return Err(MvnError::CovarianceNotPositiveDefinite);
        };
        let det = covariance_cholesky.determinant();
        let precision = covariance_cholesky.inverse();
        let factor = T::one() / (T::two_pi().powi(dim as i32) * det).sqrt();
        Ok(MultiVariateNormal {
            mean: mean.clone(),
            precision,
            lower: covariance_cholesky.l(),
            factor,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.nrows()
    }

    /// Squared Mahalanobis distance of `x` from the mean.
    pub fn mahalanobis_squared(&self, x: &DVector<T>) -> T {
        let dx = &self.mean - x;
        (dx.transpose() * &self.precision * &dx)[(0, 0)]
    }

    /// Probability density function
    pub fn pdf(&self, x: &DVector<T>) -> T {
        let neg_half = nalgebra::convert::<f64, T>(-0.5);
        self.factor * T::exp(neg_half * self.mahalanobis_squared(x))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T>
    where
        StandardNormal: Distribution<T>,
    {
        let z = DVector::from_fn(self.dim(), |_, _| StandardNormal.sample(rng));
        &self.mean + &self.lower * z
    }
}

/// Square root `S` of a symmetric positive semi-definite matrix, `S * S^T = m`.
///
/// Negative eigenvalues coming from round-off are clamped to zero, so a zero or
/// rank deficient process noise is accepted.
pub fn covariance_sqrt<T: RealField + Copy>(m: &DMatrix<T>) -> DMatrix<T> {
    assert!(m.is_square(), "covariance must be square");
    let eigen = m.clone().symmetric_eigen();
    let sqrt_values = eigen.eigenvalues.map(|v| v.max(T::zero()).sqrt());
    eigen.eigenvectors * DMatrix::from_diagonal(&sqrt_values)
}
