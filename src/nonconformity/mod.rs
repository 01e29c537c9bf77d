//! Nonconformity Scores
//!
//! Functions mapping (prediction, ground truth) pairs to one score per example.
//! Larger scores mean the prediction fits the observation worse.
//!
//! # Submodules
//!
//! * `regression`: Absolute deviation, scaled absolute deviation and CQR scores.
//! * `classification`: Regularized Adaptive Prediction Sets (RAPS) score.

pub mod classification;
pub mod regression;

pub use classification::RapsScore;
pub use regression::{CqrScore, MadScore, ScaledMadScore};

use crate::data::NumericArray;
use crate::errors::ConformalError;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A nonconformity score function.
///
/// Implementations are pure apart from the random draws they take from `rng`.
pub trait NonConformityScore: Send + Sync {
    /// Compute one score per example.
    ///
    /// * `y_pred` - Predictions, one row per example.
    /// * `y_true` - Ground truth, one row per example.
    /// * `rng` - Source of randomness for randomized scores.
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError>;
}

/// Built-in nonconformity scores, plus user supplied ones.
#[derive(Serialize, Deserialize, Clone)]
pub enum Score {
    /// Absolute deviation `|y_pred - y_true|`.
    Mad,
    /// Absolute deviation divided by a predicted dispersion.
    ScaledMad,
    /// Conformalized Quantile Regression score.
    Cqr,
    /// Regularized Adaptive Prediction Sets score.
    Raps { lambd: f64, k_reg: usize },
    #[serde(skip)]
    Custom(Arc<dyn NonConformityScore>),
}

impl Score {
    pub fn new_custom<T>(score: T) -> Self
    where
        T: NonConformityScore + 'static,
    {
        Score::Custom(Arc::new(score))
    }
}

impl NonConformityScore for Score {
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError> {
        match self {
            Score::Mad => MadScore.score(y_pred, y_true, rng),
            Score::ScaledMad => ScaledMadScore.score(y_pred, y_true, rng),
            Score::Cqr => CqrScore.score(y_pred, y_true, rng),
            Score::Raps { lambd, k_reg } => RapsScore::new(*lambd, *k_reg)?.score(y_pred, y_true, rng),
            Score::Custom(arc) => arc.score(y_pred, y_true, rng),
        }
    }
}

/// Check that prediction and ground truth share a layout and an example count.
pub fn check_supported_types(y_pred: &dyn NumericArray, y_true: &dyn NumericArray) -> Result<(), ConformalError> {
    if y_pred.layout() != y_true.layout() {
        return Err(ConformalError::TypeMismatch(
            y_pred.layout().to_string(),
            y_true.layout().to_string(),
        ));
    }
    if y_pred.rows() != y_true.rows() {
        return Err(ConformalError::ShapeMismatch(
            "number of examples".to_string(),
            y_pred.rows().to_string(),
            y_true.rows().to_string(),
        ));
    }
    Ok(())
}

/// Check that the ground truth holds a single observation per example.
pub(crate) fn check_point_observations(y_true: &dyn NumericArray) -> Result<(), ConformalError> {
    if y_true.ndim() != 1 {
        return Err(ConformalError::ShapeMismatch(
            "ground truth".to_string(),
            "one point observation per example".to_string(),
            format!("{} dimensions", y_true.ndim()),
        ));
    }
    Ok(())
}

/// Check that the prediction is a two column array, e.g. (point, dispersion).
pub(crate) fn check_pair_prediction(y_pred: &dyn NumericArray, what: &str) -> Result<(), ConformalError> {
    if y_pred.ndim() != 2 || y_pred.cols() != 2 {
        return Err(ConformalError::ShapeMismatch(
            "prediction".to_string(),
            format!("two columns holding {}", what),
            format!("{} columns", y_pred.cols()),
        ));
    }
    Ok(())
}
