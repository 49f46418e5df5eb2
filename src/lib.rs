//! Prediction stage of recursive Bayesian filters.
//!
//! Beliefs ([`utils::state::Gaussian`], [`utils::state::GaussianMixture`],
//! [`utils::state::ParticleSet`]) are pushed forward one step by a predictor
//! implementing [`localization::Prediction`]. Dynamics, exogenous inputs and
//! observations come from the collaborator traits in [`models`].

pub mod config;
pub mod localization;
pub mod models;
pub mod utils;
