use nalgebra::{DMatrix, DVector, RealField};

use crate::models::measurement::MeasurementModel;
use crate::utils::mvn::MultiVariateNormal;

/// Per particle likelihood of the current observation.
///
/// Returns one (possibly unnormalised) value per column of `pred_states`, or
/// `None` when no likelihood can be computed for this step. A `None` carries no
/// partial result.
pub trait LikelihoodModel<T: RealField> {
    fn likelihood(
        &self,
        measurement_model: &dyn MeasurementModel<T>,
        pred_states: &DMatrix<T>,
    ) -> Option<DVector<T>>;
}

/// l_i = scale * N(z - h(x_i); 0, R)
pub struct GaussianLikelihood<T: RealField> {
    scale: T,
}

impl<T: RealField + Copy> GaussianLikelihood<T> {
    pub fn new(scale: T) -> GaussianLikelihood<T> {
        GaussianLikelihood { scale }
    }
}

impl<T: RealField + Copy> Default for GaussianLikelihood<T> {
    fn default() -> Self {
        GaussianLikelihood::new(T::one())
    }
}

impl<T: RealField + Copy> LikelihoodModel<T> for GaussianLikelihood<T> {
    fn likelihood(
        &self,
        measurement_model: &dyn MeasurementModel<T>,
        pred_states: &DMatrix<T>,
    ) -> Option<DVector<T>> {
        let Some(z) = measurement_model.measure() else {
            log::debug!("no valid measurement, likelihood unavailable");
            return None;
        };
        let Some(z_pred) = measurement_model.predicted_measure(pred_states) else {
            log::debug!("predicted measurement unavailable");
            return None;
        };
        let size = measurement_model.measurement_size();
        let r = measurement_model.noise_covariance_matrix();
        if z.nrows() != size || z_pred.nrows() != size || r.nrows() != size {
            log::debug!(
                "measurement sizes disagree: z {}, predicted {}, R {}, expected {size}",
                z.nrows(),
                z_pred.nrows(),
                r.nrows()
            );
            return None;
        }
        let innovation = measurement_model.innovation(&z_pred, &z);

        let zero = DVector::zeros(size);
        let mvn = match MultiVariateNormal::new(&zero, &r) {
            Ok(mvn) => mvn,
            Err(e) => {
                log::debug!("likelihood unavailable: {e}");
                return None;
            }
        };

        let likelihood = DVector::from_iterator(
            innovation.ncols(),
            innovation
                .column_iter()
                .map(|nu| self.scale * mvn.pdf(&nu.into_owned())),
        );
        if likelihood.iter().any(|l| !l.is_finite()) {
            log::debug!("non finite likelihood");
            return None;
        }
        Some(likelihood)
    }
}
