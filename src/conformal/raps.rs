use crate::calibration::ConformalMethod;
use crate::conformal::ConformalPredictor;
use crate::errors::ConformalError;
use crate::predictor::Predictor;

/// Regularized Adaptive Prediction Sets for classifiers returning one
/// probability per class.
///
/// Calibration targets are class indices stored as floats.
pub struct Raps;

impl Raps {
    /// * `predictor` - Classifier predicting class probabilities.
    /// * `train` - If false the classifier is used as is.
    /// * `lambd` - Rank penalty weight, `0` gives plain APS.
    /// * `k_reg` - Number of top ranked classes exempt from the penalty.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<P: Predictor>(
        predictor: P,
        train: bool,
        lambd: f64,
        k_reg: usize,
    ) -> Result<ConformalPredictor<P>, ConformalError> {
        ConformalPredictor::from_method(predictor, &ConformalMethod::Raps { lambd, k_reg }, train)
    }
}
