// Constant velocity tracking without measurements: the Kalman predictor grows
// the uncertainty of a two component mixture while a particle cloud drawn from
// the same prior spreads out the same way.

extern crate nalgebra;
use nalgebra::{dmatrix, dvector};
use rand::rngs::StdRng;
use rand::SeedableRng;

extern crate bayes_prediction;
use bayes_prediction::config::SkipConfig;
use bayes_prediction::localization::{DrawParticles, KalmanPrediction, Prediction};
use bayes_prediction::models::exogenous::ControlInput;
use bayes_prediction::models::motion::LinearModel;
use bayes_prediction::utils::state::{Gaussian, GaussianMixture, ParticleSet};

fn main() {
    let period = 0.1;
    let steps = 20;

    let mut control = ControlInput::new(dmatrix![0.0; period]);
    control.set_control(dvector![0.5]);
    let mut kf = KalmanPrediction::<f64>::with_exogenous(
        Box::new(LinearModel::<f64>::white_noise_acceleration(1, period, 0.2, 0)),
        Box::new(control),
    );
    let mut pf = DrawParticles::<f64>::new(Box::new(LinearModel::<f64>::white_noise_acceleration(
        1, period, 0.2, 1,
    )));

    let left = Gaussian::new(dvector![-1.0, 1.0], dmatrix![0.1, 0.0; 0.0, 0.05]);
    let right = Gaussian::new(dvector![1.0, -1.0], dmatrix![0.1, 0.0; 0.0, 0.05]);
    let mut mixture = GaussianMixture::from_components(vec![left.clone(), right], dvector![0.5, 0.5]);

    let mut rng = StdRng::seed_from_u64(2);
    let mut particles = match ParticleSet::sample_from(&left, 500, &mut rng) {
        Ok(particles) => particles,
        Err(e) => {
            eprintln!("unable to draw the particle prior: {e}");
            return;
        }
    };

    println!("step | kf mean (left) | kf var p | pf mean        | pf var p");
    for step in 0..steps {
        // coast the last quarter without the control input
        if step == 3 * steps / 4 {
            SkipConfig {
                exogenous: true,
                ..SkipConfig::default()
            }
            .apply(&mut kf);
        }
        mixture = kf.predict(mixture);
        particles = pf.predict(particles);

        let estimate = particles.gaussian_estimate();
        println!(
            "{step:4} | {:6.3} {:6.3} | {:8.4} | {:6.3} {:6.3} | {:8.4}",
            mixture.means()[(0, 0)],
            mixture.means()[(1, 0)],
            mixture.covariance(0)[(0, 0)],
            estimate.mean[0],
            estimate.mean[1],
            estimate.covariance[(0, 0)],
        );
    }
}
