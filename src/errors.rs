//! Errors
//!
//! Custom error types used throughout the `perpetual-conformal` crate.
use thiserror::Error;

/// Errors that can occur while scoring, calibrating or aggregating.
#[derive(Debug, Error)]
pub enum ConformalError {
    /// Prediction and ground truth use different array layouts.
    #[error("Unsupported combination of array layouts: prediction is {0} but ground truth is {1}.")]
    TypeMismatch(String, String),
    /// First value is what was checked, second is expected, third is what was passed.
    #[error("Shape mismatch for {0}, expected {1} but {2} provided.")]
    ShapeMismatch(String, String, String),
    /// The operation is not available for this array layout.
    #[error("{0} is not implemented for {1} arrays.")]
    NotImplemented(String, String),
    /// A calibrator was used before `fit` computed its residuals.
    #[error("Run `fit` method before calling `{0}`.")]
    NotFitted(String),
    /// No fold calibrators were provided to the CV+ aggregator.
    #[error("Calibrators not defined.")]
    NoCalibrators,
    /// A fold was mapped to an absent calibrator.
    #[error("Fold {0} calibrator is not defined.")]
    MissingCalibrator(usize),
    /// A fold calibrator has no residuals yet.
    #[error("Fold {0} calibrator should have priorly estimated its residuals.")]
    FoldNotFitted(usize),
    /// A fold predictor returned no output.
    #[error("No point prediction available for fold {0}.")]
    MissingPrediction(usize),
    /// Alpha is too small for the number of calibration residuals.
    #[error("Alpha is too small: (alpha={alpha}, n={n}) {alpha} < {bound}. Increase alpha or the calibration set.")]
    AlphaTooSmall { alpha: f64, n: usize, bound: f64 },
    /// A nonconformity score was NaN or infinite.
    #[error("Nonconformity score {1} at index {0} is not finite.")]
    NonFiniteScore(usize, f64),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// The underlying predictor failed.
    #[error("Predictor failed: {0}")]
    Predictor(String),
    /// Unable to write configuration to file.
    #[error("Unable to write configuration to file: {0}")]
    UnableToWrite(String),
    /// Unable to read configuration from file.
    #[error("Unable to read configuration from a file {0}")]
    UnableToRead(String),
    /// Internal invariant was broken.
    #[error("Fatal error: {0}")]
    Internal(String),
}
