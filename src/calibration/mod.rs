//! Calibration Module
//!
//! Turns calibration residuals into prediction sets with finite-sample
//! coverage guarantees.
//!
//! # Submodules
//!
//! * `base`: Split conformal calibrator, optionally weighted.
//! * `cv_plus`: Cross-validation+ aggregation of fold calibrators.
//! * `config`: Conformal methods and serializable calibrator configuration.

pub mod base;
pub mod config;
pub mod cv_plus;

pub use base::BaseCalibrator;
pub use config::{CalibratorConfig, ConfigIO, ConformalMethod};
pub use cv_plus::CvPlusCalibrator;
