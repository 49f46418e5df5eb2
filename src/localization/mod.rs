mod gaussian_prediction;
mod kalman_prediction;
mod likelihood;
mod particle_prediction;
mod prediction;

pub use gaussian_prediction::GaussianPrediction;
pub use kalman_prediction::KalmanPrediction;
pub use likelihood::{GaussianLikelihood, LikelihoodModel};
pub use particle_prediction::{DrawParticles, ParticlePrediction};
pub use prediction::{Prediction, PredictionStep, SkipFlags, UnknownStep};
