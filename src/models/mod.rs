pub mod exogenous;
pub mod measurement;
pub mod motion;
