//! Conformal Prediction
//!
//! Split conformal wrappers tying a [`Predictor`] to a calibrator: the
//! predictor is (optionally) trained on a fit set, its residuals on a disjoint
//! calibration set are stored, and new predictions come with prediction sets
//! covering the truth with probability at least `1 - alpha`.
//!
//! # Submodules
//!
//! * `cqr`: Conformalized Quantile Regression.
//! * `raps`: Regularized Adaptive Prediction Sets.

pub mod cqr;
pub mod raps;

pub use cqr::Cqr;
pub use raps::Raps;

use crate::calibration::{BaseCalibrator, ConformalMethod};
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::ConformalError;
use crate::predictor::Predictor;
use crate::prediction_sets::PredictionSet;
use log::info;
use rand::rngs::StdRng;

/// Split conformal predictor.
pub struct ConformalPredictor<P: Predictor> {
    predictor: P,
    calibrator: BaseCalibrator,
    train: bool,
}

impl<P: Predictor> ConformalPredictor<P> {
    /// Wrap a predictor and a calibrator.
    ///
    /// * `predictor` - Underlying model.
    /// * `calibrator` - Unfitted calibrator whose score matches the predictor output.
    /// * `train` - If false the predictor is used as is and never trained.
    pub fn new(predictor: P, calibrator: BaseCalibrator, train: bool) -> Self {
        ConformalPredictor {
            predictor,
            calibrator,
            train,
        }
    }

    /// Wrap a predictor with the calibrator of a conformal method.
    pub fn from_method(predictor: P, method: &ConformalMethod, train: bool) -> Result<Self, ConformalError> {
        method.validate()?;
        Ok(ConformalPredictor::new(predictor, BaseCalibrator::from_method(method), train))
    }

    /// Train the predictor on the fit set and store its calibration residuals.
    ///
    /// * `x_fit` - Features of the fit set, ignored when `train` is false.
    /// * `y_fit` - Targets of the fit set, ignored when `train` is false.
    /// * `x_calib` - Features of the calibration set.
    /// * `y_calib` - Targets of the calibration set.
    /// * `rng` - Source of randomness for randomized scores.
    pub fn fit(
        &mut self,
        x_fit: &Matrix<f64>,
        y_fit: &[f64],
        x_calib: &Matrix<f64>,
        y_calib: &[f64],
        rng: &mut StdRng,
    ) -> Result<(), ConformalError> {
        if self.train {
            self.predictor.fit(x_fit, y_fit)?;
            info!("Trained predictor on {} examples.", x_fit.rows);
        }
        let y_pred = self.predict_raw(x_calib)?;
        self.calibrator.fit(&y_calib, &y_pred, rng)
    }

    /// Predictions and prediction sets for new examples.
    ///
    /// * `x_test` - Features of the new examples.
    /// * `alpha` - Target miscoverage.
    /// * `rng` - Source of randomness for randomized sets.
    pub fn predict(
        &self,
        x_test: &Matrix<f64>,
        alpha: f64,
        rng: &mut StdRng,
    ) -> Result<(RowMajorMatrix<f64>, PredictionSet), ConformalError> {
        if !self.calibrator.is_fitted() {
            return Err(ConformalError::NotFitted("predict".to_string()));
        }
        let y_pred = self.predict_raw(x_test)?;
        let set = self.calibrator.calibrate(alpha, &y_pred, None, rng)?;
        Ok((y_pred, set))
    }

    fn predict_raw(&self, x: &Matrix<f64>) -> Result<RowMajorMatrix<f64>, ConformalError> {
        let y_pred = self
            .predictor
            .predict(x)
            .ok_or_else(|| ConformalError::Predictor("no prediction returned".to_string()))?;
        y_pred.check_shape("prediction")?;
        if y_pred.rows != x.rows {
            return Err(ConformalError::ShapeMismatch(
                "prediction".to_string(),
                format!("{} rows", x.rows),
                y_pred.rows.to_string(),
            ));
        }
        Ok(y_pred)
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub fn calibrator(&self) -> &BaseCalibrator {
        &self.calibrator
    }
}
