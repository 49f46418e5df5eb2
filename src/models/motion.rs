use nalgebra::{DMatrix, DVector, RealField};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use crate::utils::mvn::covariance_sqrt;

/// Transition law of the hidden state.
///
/// `propagate` is the deterministic part of the dynamics, `motion` draws a new
/// state from the stochastic transition. The random engine belongs to the
/// model, so repeated `motion` calls on the same input are not idempotent and
/// a model instance must not be shared between predictors.
pub trait StateModel<T: RealField> {
    fn propagate(&self, x: &DVector<T>) -> DVector<T>;
    fn motion(&mut self, x: &DVector<T>) -> DVector<T>;
    fn output_size(&self) -> usize;
}

pub trait LinearStateModel<T: RealField>: StateModel<T> {
    /// F
    fn state_transition_matrix(&self) -> DMatrix<T>;
    /// Q
    fn noise_covariance_matrix(&self) -> DMatrix<T>;
}

/// x_{k+1} = F x_k + w_k, w_k ~ N(0, Q)
pub struct LinearModel<T: RealField> {
    f: DMatrix<T>,
    q: DMatrix<T>,
    sqrt_q: DMatrix<T>,
    rng: StdRng,
}

impl<T: RealField + Copy> LinearModel<T> {
    pub fn new(f: DMatrix<T>, q: DMatrix<T>, seed: u64) -> LinearModel<T> {
        assert!(f.is_square(), "state transition matrix must be square");
        assert_eq!(f.shape(), q.shape(), "noise covariance does not match F");
        let sqrt_q = covariance_sqrt(&q);
        LinearModel {
            f,
            q,
            sqrt_q,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Constant velocity model driven by white noise acceleration.
    ///
    /// The state is laid out as `[p_1, v_1, p_2, v_2, ...]` with one position
    /// and velocity pair per axis.
    ///
    /// F_axis = [[1, T], [0, 1]]
    ///
    /// Q_axis = q * [[T^3 / 3, T^2 / 2], [T^2 / 2, T]]
    pub fn white_noise_acceleration(
        axes: usize,
        period: T,
        power_spectral_density: T,
        seed: u64,
    ) -> LinearModel<T> {
        assert!(axes > 0, "at least one axis is needed");
        let n = 2 * axes;
        let two = nalgebra::convert::<f64, T>(2.0);
        let three = nalgebra::convert::<f64, T>(3.0);
        let q_tilde = power_spectral_density;

        let mut f = DMatrix::identity(n, n);
        let mut q = DMatrix::zeros(n, n);
        for axis in 0..axes {
            let p = 2 * axis;
            let v = p + 1;
            f[(p, v)] = period;
            q[(p, p)] = q_tilde * period.powi(3) / three;
            q[(p, v)] = q_tilde * period.powi(2) / two;
            q[(v, p)] = q[(p, v)];
            q[(v, v)] = q_tilde * period;
        }
        LinearModel::new(f, q, seed)
    }

    /// Restarts the noise stream.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl<T: RealField + Copy> StateModel<T> for LinearModel<T>
where
    StandardNormal: Distribution<T>,
{
    fn propagate(&self, x: &DVector<T>) -> DVector<T> {
        &self.f * x
    }

    fn motion(&mut self, x: &DVector<T>) -> DVector<T> {
        let rng = &mut self.rng;
        let noise = DVector::from_fn(self.sqrt_q.ncols(), |_, _| StandardNormal.sample(rng));
        &self.f * x + &self.sqrt_q * noise
    }

    fn output_size(&self) -> usize {
        self.f.nrows()
    }
}

impl<T: RealField + Copy> LinearStateModel<T> for LinearModel<T>
where
    StandardNormal: Distribution<T>,
{
    fn state_transition_matrix(&self) -> DMatrix<T> {
        self.f.clone()
    }

    fn noise_covariance_matrix(&self) -> DMatrix<T> {
        self.q.clone()
    }
}
