use nalgebra::{DMatrix, RealField};

use crate::localization::prediction::{Prediction, SkipFlags};
use crate::models::exogenous::ExogenousModel;
use crate::models::motion::StateModel;
use crate::utils::state::ParticleSet;

pub trait ParticlePrediction<T: RealField>: Prediction<ParticleSet<T>> {
    fn state_model(&self) -> &dyn StateModel<T>;

    fn state_model_mut(&mut self) -> &mut dyn StateModel<T>;

    /// Takes ownership of `state_model`, dropping the previous one.
    fn set_state_model(&mut self, state_model: Box<dyn StateModel<T>>);
}

/// Moves every particle by drawing from the state model's transition law.
///
/// Particles are drawn in index order, so a seeded state model gives the same
/// predicted set for the same previous set. Weights are never touched.
pub struct DrawParticles<T: RealField> {
    state_model: Box<dyn StateModel<T>>,
    exogenous_model: Option<Box<dyn ExogenousModel<T>>>,
    skip: SkipFlags,
}

impl<T: RealField + Copy> DrawParticles<T> {
    pub fn new(state_model: Box<dyn StateModel<T>>) -> DrawParticles<T> {
        DrawParticles {
            state_model,
            exogenous_model: None,
            skip: SkipFlags::default(),
        }
    }

    pub fn with_exogenous(
        state_model: Box<dyn StateModel<T>>,
        exogenous_model: Box<dyn ExogenousModel<T>>,
    ) -> DrawParticles<T> {
        DrawParticles {
            state_model,
            exogenous_model: Some(exogenous_model),
            skip: SkipFlags::default(),
        }
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

impl<T: RealField + Copy> Prediction<ParticleSet<T>> for DrawParticles<T> {
    fn skip_flags(&self) -> &SkipFlags {
        &self.skip
    }

    fn skip_flags_mut(&mut self) -> &mut SkipFlags {
        &mut self.skip
    }

    fn predict_step(&mut self, prev: &ParticleSet<T>, pred: &mut ParticleSet<T>) {
        assert_eq!(
            prev.components(),
            pred.components(),
            "predicted set must have as many particles as the previous one"
        );

        let skip_state = self.skip.state();
        let skip_exogenous = self.skip.exogenous() || self.exogenous_model.is_none();

        if skip_state && skip_exogenous {
            log::trace!("state and exogenous skipped, particles copied");
            pred.clone_from(prev);
            return;
        }

        pred.weights_mut().clone_from(prev.weights());

        if !skip_state {
            log::trace!("drawing {} particles", prev.components());
            let mut drawn = DMatrix::zeros(self.state_model.output_size(), prev.components());
            for i in 0..prev.components() {
                let x = prev.state(i).into_owned();
                drawn.set_column(i, &self.state_model.motion(&x));
            }
            *pred.states_mut() = drawn;
        } else {
            pred.states_mut().clone_from(prev.states());
        }

        let exogenous = match &self.exogenous_model {
            Some(model) if !skip_exogenous => model,
            _ => return,
        };
        log::trace!("exogenous propagation of {} particles", pred.components());
        let mut propagated = DMatrix::zeros(pred.dim(), pred.components());
        exogenous.propagate(pred.states(), &mut propagated);
        *pred.states_mut() = propagated;
    }
}

impl<T: RealField + Copy> ParticlePrediction<T> for DrawParticles<T> {
    fn state_model(&self) -> &dyn StateModel<T> {
        &*self.state_model
    }

    fn state_model_mut(&mut self) -> &mut dyn StateModel<T> {
        &mut *self.state_model
    }

    fn set_state_model(&mut self, state_model: Box<dyn StateModel<T>>) {
        self.state_model = state_model;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exogenous::ControlInput;
    use crate::models::motion::LinearModel;
    use crate::utils::state::Gaussian;
    use nalgebra::{dmatrix, dvector, DVector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn noisy_constant_velocity(seed: u64) -> Box<dyn StateModel<f64>> {
        Box::new(LinearModel::white_noise_acceleration(1, 0.1, 1.0, seed))
    }

    fn particles() -> ParticleSet<f64> {
        let mut rng = StdRng::seed_from_u64(1);
        let prior = Gaussian::new(dvector![0.0, 1.0], DMatrix::identity(2, 2) * 0.1);
        let mut particles = ParticleSet::sample_from(&prior, 100, &mut rng).unwrap();
        for (i, w) in particles.weights_mut().iter_mut().enumerate() {
            *w = i as f64;
        }
        particles
    }

    #[test]
    fn preserves_count_and_weights() {
        let mut pf = DrawParticles::new(noisy_constant_velocity(5));
        let prev = particles();
        let pred = pf.predict(prev.clone());

        assert_eq!(pred.components(), prev.components());
        assert_eq!(pred.weights(), prev.weights());
        assert_ne!(pred.states(), prev.states());
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let prev = particles();
        let a = DrawParticles::new(noisy_constant_velocity(9)).predict(prev.clone());
        let b = DrawParticles::new(noisy_constant_velocity(9)).predict(prev.clone());
        let c = DrawParticles::new(noisy_constant_velocity(10)).predict(prev);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn repeated_calls_draw_new_noise() {
        let mut pf = DrawParticles::new(noisy_constant_velocity(3));
        let prev = particles();
        let first = pf.predict(prev.clone());
        let second = pf.predict(prev);
        assert_ne!(first.states(), second.states());
    }

    #[test]
    fn noiseless_motion_follows_dynamics() {
        let f = dmatrix![1.0, 0.5; 0.0, 1.0];
        let mut pf = DrawParticles::<f64>::new(Box::new(LinearModel::new(f.clone(), DMatrix::zeros(2, 2), 0)));
        let prev = particles();
        let pred = pf.predict(prev.clone());
        approx::assert_abs_diff_eq!(*pred.states(), &f * prev.states(), epsilon = 1e-12);
    }

    #[test]
    fn master_skip_is_identity() {
        let mut pf = DrawParticles::new(noisy_constant_velocity(0));
        assert!(pf.skip("prediction", true));
        let prev = particles();
        assert_eq!(pf.predict(prev.clone()), prev);
    }

    #[test]
    fn state_skip_without_exogenous_copies() {
        let mut pf = DrawParticles::new(noisy_constant_velocity(0));
        assert!(pf.skip("state", true));
        let prev = particles();
        let mut pred = ParticleSet::new(prev.components(), 2);
        pf.predict_into(&prev, &mut pred);
        assert_eq!(pred, prev);
    }

    #[test]
    fn state_skip_applies_exogenous_only() {
        let mut control = ControlInput::new(DMatrix::identity(2, 2));
        control.set_control(dvector![1.0, 0.0]);
        let mut pf = DrawParticles::with_exogenous(noisy_constant_velocity(0), Box::new(control));
        assert!(pf.skip("state", true));

        let prev = particles();
        let pred = pf.predict(prev.clone());
        for i in 0..prev.components() {
            let expected = prev.state(i) + dvector![1.0, 0.0];
            assert_eq!(pred.state(i).into_owned(), expected);
        }
        assert_eq!(pred.weights(), prev.weights());
    }

    #[test]
    fn exogenous_applied_after_motion() {
        let mut control = ControlInput::new(DMatrix::identity(2, 2));
        control.set_control(dvector![0.0, 2.0]);
        let mut with = DrawParticles::with_exogenous(noisy_constant_velocity(4), Box::new(control));
        let mut without = DrawParticles::new(noisy_constant_velocity(4));

        let prev = particles();
        let shifted = with.predict(prev.clone());
        let plain = without.predict(prev);
        let offset = shifted.states() - plain.states();
        for column in offset.column_iter() {
            approx::assert_abs_diff_eq!(column.into_owned(), dvector![0.0, 2.0], epsilon = 1e-12);
        }
    }

    #[test]
    fn exogenous_skip_matches_plain_motion() {
        let mut control = ControlInput::new(DMatrix::identity(2, 2));
        control.set_control(dvector![3.0, 3.0]);
        let mut pf = DrawParticles::with_exogenous(noisy_constant_velocity(8), Box::new(control));
        assert!(pf.skip("exogenous", true));
        let mut plain = DrawParticles::new(noisy_constant_velocity(8));

        let prev = particles();
        assert_eq!(pf.predict(prev.clone()), plain.predict(prev));
    }

    #[test]
    fn state_model_replaced() {
        let mut pf = DrawParticles::new(noisy_constant_velocity(0));
        assert_eq!(pf.state_model().output_size(), 2);

        pf.set_state_model(Box::new(LinearModel::new(
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 2),
            0,
        )));
        let x = dvector![4.0, 2.0];
        assert_eq!(pf.state_model_mut().motion(&x), x);
        assert_eq!(pf.state_model().propagate(&x), DVector::from_vec(vec![4.0, 2.0]));
    }
}
