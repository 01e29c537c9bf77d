//! Prediction Sets
//!
//! Functions turning new predictions and calibrated score quantiles into
//! prediction intervals (regression) or sets of classes (classification).
//! Each constructor pairs with one nonconformity score.
//!
//! # Submodules
//!
//! * `regression`: Constant, scaled and CQR intervals.
//! * `classification`: RAPS prediction sets.

pub mod classification;
pub mod regression;

pub use classification::RapsSet;
pub use regression::{ConstantInterval, CqrInterval, ScaledInterval};

use crate::data::NumericArray;
use crate::errors::ConformalError;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lower and upper bounds, one pair per test example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Calibrated output of a prediction set constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredictionSet {
    /// Regression intervals.
    Interval(PredictionInterval),
    /// Classification sets, the classes of each test example ordered by decreasing probability.
    Classes(Vec<Vec<usize>>),
}

impl PredictionSet {
    pub fn into_interval(self) -> Result<PredictionInterval, ConformalError> {
        match self {
            PredictionSet::Interval(interval) => Ok(interval),
            PredictionSet::Classes(_) => Err(ConformalError::ShapeMismatch(
                "prediction set".to_string(),
                "an interval".to_string(),
                "class sets".to_string(),
            )),
        }
    }

    pub fn into_classes(self) -> Result<Vec<Vec<usize>>, ConformalError> {
        match self {
            PredictionSet::Classes(classes) => Ok(classes),
            PredictionSet::Interval(_) => Err(ConformalError::ShapeMismatch(
                "prediction set".to_string(),
                "class sets".to_string(),
                "an interval".to_string(),
            )),
        }
    }
}

/// A prediction set constructor.
pub trait PredictionSetFunction: Send + Sync {
    /// Build the prediction set of every example of `y_pred`.
    ///
    /// * `y_pred` - Predictions for the new examples.
    /// * `thresholds` - Calibrated score quantiles, either a single value shared
    ///   by every example or one value per example.
    /// * `rng` - Source of randomness for randomized sets.
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError>;
}

/// Built-in prediction set constructors, plus user supplied ones.
#[derive(Serialize, Deserialize, Clone)]
pub enum SetConstructor {
    /// `(y_pred - tau, y_pred + tau)`.
    ConstantInterval,
    /// `(point - tau * dispersion, point + tau * dispersion)`.
    ScaledInterval,
    /// `(q_lo - tau, q_hi + tau)`.
    CqrInterval,
    /// Regularized Adaptive Prediction Sets.
    RapsSet { lambd: f64, k_reg: usize },
    #[serde(skip)]
    Custom(Arc<dyn PredictionSetFunction>),
}

impl SetConstructor {
    pub fn new_custom<T>(constructor: T) -> Self
    where
        T: PredictionSetFunction + 'static,
    {
        SetConstructor::Custom(Arc::new(constructor))
    }
}

impl PredictionSetFunction for SetConstructor {
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        match self {
            SetConstructor::ConstantInterval => ConstantInterval.predict_set(y_pred, thresholds, rng),
            SetConstructor::ScaledInterval => ScaledInterval.predict_set(y_pred, thresholds, rng),
            SetConstructor::CqrInterval => CqrInterval.predict_set(y_pred, thresholds, rng),
            SetConstructor::RapsSet { lambd, k_reg } => {
                RapsSet::new(*lambd, *k_reg)?.predict_set(y_pred, thresholds, rng)
            }
            SetConstructor::Custom(arc) => arc.predict_set(y_pred, thresholds, rng),
        }
    }
}

/// Spread `thresholds` over `n` examples.
///
/// A single threshold is shared by every example, otherwise there must be one per example.
pub(crate) fn broadcast_thresholds(thresholds: &[f64], n: usize) -> Result<Vec<f64>, ConformalError> {
    match thresholds.len() {
        1 => Ok(vec![thresholds[0]; n]),
        len if len == n => Ok(thresholds.to_vec()),
        len => Err(ConformalError::ShapeMismatch(
            "score quantiles".to_string(),
            format!("1 or {} values", n),
            len.to_string(),
        )),
    }
}
