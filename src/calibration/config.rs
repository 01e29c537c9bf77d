//! Calibrator Configuration
//!
//! Conformal methods pairing a nonconformity score with its prediction set
//! constructor, and the serializable configuration used to build calibrators.
use crate::calibration::base::BaseCalibrator;
use crate::errors::ConformalError;
use crate::nonconformity::Score;
use crate::prediction_sets::SetConstructor;
use crate::utils::validate_raps_parameters;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Conformal methods, each binding a score to the matching prediction set.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub enum ConformalMethod {
    /// Absolute residuals and constant width intervals.
    #[default]
    Mad,
    /// Residuals scaled by a predicted dispersion, and scaled intervals.
    ScaledMad,
    /// Conformalized Quantile Regression.
    Cqr,
    /// Regularized Adaptive Prediction Sets for classification.
    Raps { lambd: f64, k_reg: usize },
}

impl ConformalMethod {
    /// The nonconformity score of the method.
    pub fn score(&self) -> Score {
        match *self {
            ConformalMethod::Mad => Score::Mad,
            ConformalMethod::ScaledMad => Score::ScaledMad,
            ConformalMethod::Cqr => Score::Cqr,
            ConformalMethod::Raps { lambd, k_reg } => Score::Raps { lambd, k_reg },
        }
    }

    /// The prediction set constructor of the method.
    pub fn set_constructor(&self) -> SetConstructor {
        match *self {
            ConformalMethod::Mad => SetConstructor::ConstantInterval,
            ConformalMethod::ScaledMad => SetConstructor::ScaledInterval,
            ConformalMethod::Cqr => SetConstructor::CqrInterval,
            ConformalMethod::Raps { lambd, k_reg } => SetConstructor::RapsSet { lambd, k_reg },
        }
    }

    pub fn validate(&self) -> Result<(), ConformalError> {
        match *self {
            ConformalMethod::Raps { lambd, k_reg } => validate_raps_parameters(lambd, k_reg),
            _ => Ok(()),
        }
    }
}

fn default_seed() -> u64 {
    0
}

/// Configuration for a [`BaseCalibrator`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct CalibratorConfig {
    /// Score and prediction set pair.
    #[serde(default)]
    pub method: ConformalMethod,
    /// Seed for the random draws of randomized methods.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        CalibratorConfig {
            method: ConformalMethod::Mad,
            seed: 0,
        }
    }
}

impl CalibratorConfig {
    /// Set the conformal method.
    /// * `method` - Score and prediction set pair to calibrate with.
    pub fn set_method(mut self, method: ConformalMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the seed.
    /// * `seed` - Seed of the random generator handed out by `build`.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build an unfitted calibrator along with a generator seeded from the configuration.
    pub fn build(&self) -> Result<(BaseCalibrator, StdRng), ConformalError> {
        self.method.validate()?;
        Ok((
            BaseCalibrator::from_method(&self.method),
            StdRng::seed_from_u64(self.seed),
        ))
    }
}

/// IO
pub trait ConfigIO: Serialize + DeserializeOwned + Sized {
    /// Save a configuration as a json object to a file.
    ///
    /// * `path` - Path to save the configuration.
    fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConformalError> {
        fs::write(path, self.json_dump()?).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Dump a configuration as a json object
    fn json_dump(&self) -> Result<String, ConformalError> {
        serde_json::to_string(self).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Load a configuration from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, ConformalError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| ConformalError::UnableToRead(e.to_string()))
    }

    /// Load a configuration from a path to a json object.
    ///
    /// * `path` - Path to load the configuration from.
    fn load_config<P: AsRef<Path>>(path: P) -> Result<Self, ConformalError> {
        let json_str = fs::read_to_string(path).map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConfigIO for CalibratorConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_calibrator_config_default() {
        let config = CalibratorConfig::default();
        assert_eq!(config.method, ConformalMethod::Mad);
        assert_eq!(config.seed, 0);
    }

    #[test]
    fn test_config_io_json() {
        let config = CalibratorConfig::default()
            .set_method(ConformalMethod::Raps { lambd: 0.01, k_reg: 3 })
            .set_seed(42);
        let json = config.json_dump().unwrap();
        let config2 = CalibratorConfig::from_json(&json).unwrap();
        assert_eq!(config, config2);
    }

    #[test]
    fn test_config_io_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("calibrator.json");
        let config = CalibratorConfig::default().set_method(ConformalMethod::Cqr);
        config.save_config(&file_path).unwrap();
        let config2 = CalibratorConfig::load_config(&file_path).unwrap();
        assert_eq!(config, config2);
        assert!(CalibratorConfig::load_config(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config = CalibratorConfig::from_json(r#"{"method": "ScaledMad"}"#).unwrap();
        assert_eq!(config.method, ConformalMethod::ScaledMad);
        assert_eq!(config.seed, 0);
        assert!(CalibratorConfig::from_json("{").is_err());
    }

    #[test]
    fn test_build_validates_raps_parameters() {
        let config = CalibratorConfig::default().set_method(ConformalMethod::Raps { lambd: 0.1, k_reg: 0 });
        assert!(config.build().is_err());
        let (calibrator, _rng) = CalibratorConfig::default().build().unwrap();
        assert!(!calibrator.is_fitted());
    }

    #[test]
    fn test_method_pairs() {
        assert!(matches!(ConformalMethod::Cqr.set_constructor(), SetConstructor::CqrInterval));
        assert!(matches!(
            ConformalMethod::Raps { lambd: 0.2, k_reg: 2 }.score(),
            Score::Raps { k_reg: 2, .. }
        ));
    }
}
