use nalgebra::RealField;

use crate::localization::prediction::Prediction;
use crate::utils::state::{Gaussian, GaussianMixture};

/// Predictors of Gaussian mixtures also accept a single Gaussian.
pub trait GaussianPrediction<T: RealField>: Prediction<GaussianMixture<T>> {
    fn predict_gaussian(&mut self, prev: Gaussian<T>) -> Gaussian<T>;
}

impl<T, P> GaussianPrediction<T> for P
where
    T: RealField + Copy,
    P: Prediction<GaussianMixture<T>> + ?Sized,
{
    fn predict_gaussian(&mut self, prev: Gaussian<T>) -> Gaussian<T> {
        self.predict(GaussianMixture::from(prev)).component(0)
    }
}
