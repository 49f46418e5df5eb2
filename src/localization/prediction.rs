use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of a prediction that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionStep {
    /// The whole prediction, `predict` becomes the identity.
    Prediction,
    /// The state dynamics term.
    State,
    /// The exogenous propagation term.
    Exogenous,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown prediction step '{0}'")]
pub struct UnknownStep(pub String);

impl FromStr for PredictionStep {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prediction" => Ok(PredictionStep::Prediction),
            "state" => Ok(PredictionStep::State),
            "exogenous" => Ok(PredictionStep::Exogenous),
            _ => Err(UnknownStep(s.to_owned())),
        }
    }
}

impl fmt::Display for PredictionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredictionStep::Prediction => "prediction",
            PredictionStep::State => "state",
            PredictionStep::Exogenous => "exogenous",
        };
        f.write_str(name)
    }
}

/// Which stages of a prediction are currently skipped. Nothing is skipped by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipFlags {
    prediction: bool,
    state: bool,
    exogenous: bool,
}

impl SkipFlags {
    /// Sets the flag of `what_step`. Returns `false`, leaving every flag
    /// untouched, when the step name is not recognised.
    pub fn skip(&mut self, what_step: &str, status: bool) -> bool {
        match what_step.parse::<PredictionStep>() {
            Ok(step) => {
                self.skip_step(step, status);
                true
            }
            Err(e) => {
                log::warn!("{e}, skip request ignored");
                false
            }
        }
    }

    pub fn skip_step(&mut self, step: PredictionStep, status: bool) {
        match step {
            PredictionStep::Prediction => self.prediction = status,
            PredictionStep::State => self.state = status,
            PredictionStep::Exogenous => self.exogenous = status,
        }
    }

    pub fn prediction(&self) -> bool {
        self.prediction
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn exogenous(&self) -> bool {
        self.exogenous
    }
}

/// Advances a belief of type `B` one step forward in time.
///
/// Implementors provide `predict_step` and storage for their [`SkipFlags`];
/// the master `prediction` flag is handled here and never reaches
/// `predict_step`.
pub trait Prediction<B: Clone> {
    fn skip_flags(&self) -> &SkipFlags;

    fn skip_flags_mut(&mut self) -> &mut SkipFlags;

    /// Writes the prediction of `prev` into `pred`, which has the shape of `prev`.
    fn predict_step(&mut self, prev: &B, pred: &mut B);

    fn skip(&mut self, what_step: &str, status: bool) -> bool {
        self.skip_flags_mut().skip(what_step, status)
    }

    fn skip_state(&self) -> bool {
        self.skip_flags().state()
    }

    fn skip_exogenous(&self) -> bool {
        self.skip_flags().exogenous()
    }

    /// Predicted belief. With the master flag set, `prev` is handed back as is.
    fn predict(&mut self, prev: B) -> B {
        if self.skip_flags().prediction() {
            log::trace!("prediction skipped");
            return prev;
        }
        let mut pred = prev.clone();
        self.predict_step(&prev, &mut pred);
        pred
    }

    /// Same as [`Prediction::predict`] but writes into a buffer owned by the caller.
    fn predict_into(&mut self, prev: &B, pred: &mut B) {
        if self.skip_flags().prediction() {
            log::trace!("prediction skipped");
            pred.clone_from(prev);
            return;
        }
        self.predict_step(prev, pred);
    }
}
