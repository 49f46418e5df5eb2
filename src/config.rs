//! Skip configuration of a predictor, read from JSON.
//!
//! ```json
//! { "state": true }
//! ```
//!
//! Missing fields default to `false`, unknown fields are rejected.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::localization::{Prediction, PredictionStep, SkipFlags};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid skip configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkipConfig {
    pub prediction: bool,
    pub state: bool,
    pub exogenous: bool,
}

impl SkipConfig {
    pub fn from_json(json: &str) -> Result<SkipConfig, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SkipConfig, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        SkipConfig::from_json(&json)
    }

    /// Sets every skip flag of `predictor` to the configured value.
    pub fn apply<B: Clone, P: Prediction<B> + ?Sized>(&self, predictor: &mut P) {
        let steps = [
            (PredictionStep::Prediction, self.prediction),
            (PredictionStep::State, self.state),
            (PredictionStep::Exogenous, self.exogenous),
        ];
        for (step, status) in steps {
            let known = predictor.skip(&step.to_string(), status);
            debug_assert!(known, "{step} must be a known step");
        }
        log::debug!("skip configuration applied: {self:?}");
    }
}

impl From<&SkipFlags> for SkipConfig {
    fn from(flags: &SkipFlags) -> Self {
        SkipConfig {
            prediction: flags.prediction(),
            state: flags.state(),
            exogenous: flags.exogenous(),
        }
    }
}
