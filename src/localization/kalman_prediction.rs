use nalgebra::{DMatrix, RealField};

use crate::localization::prediction::{Prediction, SkipFlags};
use crate::models::exogenous::ExogenousModel;
use crate::models::motion::LinearStateModel;
use crate::utils::state::GaussianMixture;

/// Linear Gaussian prediction of every component of a mixture.
///
/// x_{k+1} = F x_k
///
/// P_{k+1} = F P_k F^T + Q
///
/// optionally followed by the exogenous propagation of the means.
pub struct KalmanPrediction<T: RealField> {
    state_model: Box<dyn LinearStateModel<T>>,
    exogenous_model: Option<Box<dyn ExogenousModel<T>>>,
    skip: SkipFlags,
}

impl<T: RealField + Copy> KalmanPrediction<T> {
    pub fn new(state_model: Box<dyn LinearStateModel<T>>) -> KalmanPrediction<T> {
        KalmanPrediction {
            state_model,
            exogenous_model: None,
            skip: SkipFlags::default(),
        }
    }

    pub fn with_exogenous(
        state_model: Box<dyn LinearStateModel<T>>,
        exogenous_model: Box<dyn ExogenousModel<T>>,
    ) -> KalmanPrediction<T> {
        KalmanPrediction {
            state_model,
            exogenous_model: Some(exogenous_model),
            skip: SkipFlags::default(),
        }
    }

    pub fn state_model(&self) -> &dyn LinearStateModel<T> {
        &*self.state_model
    }

    pub fn set_state_model(&mut self, state_model: Box<dyn LinearStateModel<T>>) {
        self.state_model = state_model;
    }

    pub fn exogenous_model(&self) -> Option<&dyn ExogenousModel<T>> {
        self.exogenous_model.as_deref()
    }

    pub fn set_exogenous_model(&mut self, exogenous_model: Box<dyn ExogenousModel<T>>) {
        self.exogenous_model = Some(exogenous_model);
    }

    pub fn clear_exogenous_model(&mut self) {
        self.exogenous_model = None;
    }
}

impl<T: RealField + Copy> Prediction<GaussianMixture<T>> for KalmanPrediction<T> {
    fn skip_flags(&self) -> &SkipFlags {
        &self.skip
    }

    fn skip_flags_mut(&mut self) -> &mut SkipFlags {
        &mut self.skip
    }

    fn predict_step(&mut self, prev: &GaussianMixture<T>, pred: &mut GaussianMixture<T>) {
        assert_eq!(
            prev.components(),
            pred.components(),
            "predicted mixture must have as many components as the previous one"
        );
        assert_eq!(prev.dim(), pred.dim(), "predicted mixture state size");

        let skip_state = self.skip_state();
        let exogenous = if self.skip_exogenous() {
            None
        } else {
            self.exogenous_model.as_deref()
        };

        if skip_state && exogenous.is_none() {
            log::trace!("state and exogenous skipped, belief copied");
            pred.clone_from(prev);
            return;
        }

        pred.weights_mut().clone_from(prev.weights());

        if !skip_state {
            let f = self.state_model.state_transition_matrix();
            let q = self.state_model.noise_covariance_matrix();
            assert_eq!(f.ncols(), prev.dim(), "state transition matrix does not match the state");

            *pred.means_mut() = &f * prev.means();
            let f_t = f.transpose();
            for i in 0..prev.components() {
                *pred.covariance_mut(i) = &f * prev.covariance(i) * &f_t + &q;
            }
        } else {
            // With the dynamics skipped their noise is not injected either.
            for i in 0..prev.components() {
                pred.covariance_mut(i).clone_from(prev.covariance(i));
            }
        }

        if let Some(exogenous) = exogenous {
            if skip_state {
                log::trace!("state skipped, exogenous propagation only");
                exogenous.propagate(prev.means(), pred.means_mut());
            } else {
                log::trace!("state and exogenous propagation");
                let mut propagated = DMatrix::zeros(pred.dim(), pred.components());
                exogenous.propagate(pred.means(), &mut propagated);
                *pred.means_mut() = propagated;
            }
        } else {
            log::trace!("state propagation only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::gaussian_prediction::GaussianPrediction;
    use crate::models::exogenous::ControlInput;
    use crate::models::motion::LinearModel;
    use crate::utils::state::Gaussian;
    use nalgebra::{dmatrix, dvector, DVector};

    fn constant_velocity() -> Box<dyn LinearStateModel<f64>> {
        Box::new(LinearModel::new(
            dmatrix![1.0, 1.0; 0.0, 1.0],
            DMatrix::identity(2, 2) * 0.01,
            0,
        ))
    }

    fn push(dx: f64, dv: f64) -> Box<dyn ExogenousModel<f64>> {
        let mut control = ControlInput::new(DMatrix::identity(2, 2));
        control.set_control(dvector![dx, dv]);
        Box::new(control)
    }

    fn mixture() -> GaussianMixture<f64> {
        GaussianMixture::from_components(
            vec![
                Gaussian::new(dvector![1.0, 2.0], dmatrix![2.0, 0.5; 0.5, 1.0]),
                Gaussian::new(dvector![-3.0, 0.5], dmatrix![1.0, 0.0; 0.0, 3.0]),
            ],
            dvector![0.4, 0.6],
        )
    }

    #[test]
    fn constant_velocity_scenario() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        let prior = Gaussian::new(dvector![0.0, 0.0], DMatrix::identity(2, 2));

        let predicted = kf.predict_gaussian(prior);

        assert_eq!(predicted.mean, dvector![0.0, 0.0]);
        // F F^T = [[2, 1], [1, 1]]
        approx::assert_abs_diff_eq!(
            predicted.covariance,
            dmatrix![2.01, 1.0; 1.0, 1.01],
            epsilon = 1e-12
        );
    }

    #[test]
    fn fresh_buffer_receives_previous_weights() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(1.0, 0.0));
        let prev = mixture();
        let mut pred = GaussianMixture::new(2, 2);
        assert_eq!(pred.weights(), &dvector![0.5, 0.5]);

        kf.predict_into(&prev, &mut pred);

        assert_eq!(pred.weights(), &dvector![0.4, 0.6]);
        assert_eq!(pred.weights(), prev.weights());
    }

    #[test]
    fn master_skip_returns_belief_untouched() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(1.0, 1.0));
        assert!(kf.skip("prediction", true));

        let prev = mixture();
        let once = kf.predict(prev.clone());
        assert_eq!(once, prev);
        assert_eq!(kf.predict(once), prev);
    }

    #[test]
    fn every_component_gets_dynamics_and_noise() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        let prev = mixture();
        let pred = kf.predict(prev.clone());

        let f = dmatrix![1.0, 1.0; 0.0, 1.0];
        let q = DMatrix::identity(2, 2) * 0.01;
        approx::assert_abs_diff_eq!(*pred.means(), &f * prev.means(), epsilon = 1e-12);
        for i in 0..prev.components() {
            let expected = &f * prev.covariance(i) * f.transpose() + &q;
            approx::assert_abs_diff_eq!(*pred.covariance(i), expected, epsilon = 1e-12);
        }
        assert_eq!(pred.weights(), prev.weights());
    }

    #[test]
    fn noise_is_not_accumulated_across_calls() {
        let mut kf = KalmanPrediction::<f64>::new(Box::new(LinearModel::new(
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2) * 0.5,
            0,
        )));
        let prior = GaussianMixture::from(Gaussian::new(dvector![0.0, 0.0], DMatrix::identity(2, 2)));
        let first = kf.predict(prior.clone());
        let second = kf.predict(prior);
        assert_eq!(first, second);
        approx::assert_abs_diff_eq!(
            *first.covariance(0),
            DMatrix::identity(2, 2) * 1.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn state_and_exogenous_skipped_copies() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(1.0, 1.0));
        assert!(kf.skip("state", true));
        assert!(kf.skip("exogenous", true));

        let prev = mixture();
        assert_eq!(kf.predict(prev.clone()), prev);
    }

    #[test]
    fn state_skipped_without_exogenous_model_copies() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        assert!(kf.skip("state", true));

        let prev = mixture();
        let mut pred = GaussianMixture::new(2, 2);
        kf.predict_into(&prev, &mut pred);
        assert_eq!(pred, prev);
    }

    #[test]
    fn state_skipped_keeps_covariance_without_noise() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(1.0, -1.0));
        assert!(kf.skip("state", true));

        let prev = mixture();
        let pred = kf.predict(prev.clone());

        approx::assert_abs_diff_eq!(*pred.means(), dmatrix![2.0, -2.0; 1.0, -0.5], epsilon = 1e-12);
        for i in 0..prev.components() {
            assert_eq!(pred.covariance(i), prev.covariance(i));
        }
    }

    #[test]
    fn exogenous_applied_after_dynamics() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(1.0, -1.0));
        let prev = mixture();
        let pred = kf.predict(prev.clone());

        // F * means = [[3, -2.5], [2, 0.5]]
        approx::assert_abs_diff_eq!(*pred.means(), dmatrix![4.0, -1.5; 1.0, -0.5], epsilon = 1e-12);
        let f = dmatrix![1.0, 1.0; 0.0, 1.0];
        let expected = &f * prev.covariance(1) * f.transpose() + DMatrix::identity(2, 2) * 0.01;
        approx::assert_abs_diff_eq!(*pred.covariance(1), expected, epsilon = 1e-12);
    }

    #[test]
    fn exogenous_skip_flag_ignores_model() {
        let mut kf = KalmanPrediction::with_exogenous(constant_velocity(), push(5.0, 5.0));
        assert!(kf.skip("exogenous", true));
        let mut plain = KalmanPrediction::new(constant_velocity());

        let prev = mixture();
        assert_eq!(kf.predict(prev.clone()), plain.predict(prev));
    }

    #[test]
    fn exogenous_model_can_be_swapped() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        assert!(kf.exogenous_model().is_none());

        kf.set_exogenous_model(push(1.0, 0.0));
        assert!(kf.exogenous_model().is_some());
        let prior = Gaussian::new(dvector![0.0, 0.0], DMatrix::identity(2, 2));
        assert_eq!(kf.predict_gaussian(prior.clone()).mean, dvector![1.0, 0.0]);

        kf.clear_exogenous_model();
        assert_eq!(kf.predict_gaussian(prior).mean, DVector::zeros(2));
    }

    #[test]
    fn state_model_can_be_swapped() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        kf.set_state_model(Box::new(LinearModel::new(
            DMatrix::identity(2, 2) * 2.0,
            DMatrix::zeros(2, 2),
            0,
        )));
        assert_eq!(kf.state_model().state_transition_matrix(), DMatrix::identity(2, 2) * 2.0);

        let prior = Gaussian::new(dvector![1.0, 1.0], DMatrix::identity(2, 2));
        let pred = kf.predict_gaussian(prior);
        assert_eq!(pred.mean, dvector![2.0, 2.0]);
        assert_eq!(pred.covariance, DMatrix::identity(2, 2) * 4.0);
    }

    #[test]
    #[should_panic]
    fn component_count_mismatch_panics() {
        let mut kf = KalmanPrediction::new(constant_velocity());
        let mut pred = GaussianMixture::new(3, 2);
        kf.predict_into(&mixture(), &mut pred);
    }
}
