use crate::calibration::base::BaseCalibrator;
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::ConformalError;
use crate::predictor::Predictor;
use crate::prediction_sets::{ConstantInterval, PredictionInterval};
use crate::quantile::{check_alpha_calib, quantile};
use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;

/// Lower and upper candidate bounds of one fold, one row per test example.
type CandidateBounds = (RowMajorMatrix<f64>, RowMajorMatrix<f64>);

/// Cross-validation+ aggregation of fold calibrators.
///
/// Each fold holds a calibrator fitted on the out-of-fold residuals of the
/// predictor trained without that fold. Intervals combine every fold
/// prediction with every residual of the matching fold, see
/// <https://arxiv.org/abs/1905.02928>.
///
/// Candidate bounds are always constant width around each fold's point
/// prediction, whichever score the fold calibrators were fitted with. Only
/// absolute deviation residuals give the CV+ guarantee.
pub struct CvPlusCalibrator {
    kfold_calibrators: HashMap<usize, BaseCalibrator>,
}

impl CvPlusCalibrator {
    /// Create the aggregator from the fold calibrators.
    ///
    /// * `kfold_calibrators` - Calibrator of each fold, keyed by fold index.
    pub fn new(kfold_calibrators: HashMap<usize, Option<BaseCalibrator>>) -> Result<Self, ConformalError> {
        if kfold_calibrators.is_empty() {
            return Err(ConformalError::NoCalibrators);
        }
        let mut calibrators = HashMap::with_capacity(kfold_calibrators.len());
        for (fold, calibrator) in kfold_calibrators {
            let calibrator = calibrator.ok_or(ConformalError::MissingCalibrator(fold))?;
            calibrators.insert(fold, calibrator);
        }
        Ok(CvPlusCalibrator {
            kfold_calibrators: calibrators,
        })
    }

    /// Check that every fold calibrator already holds its residuals.
    ///
    /// Fold residuals are computed by the fold calibrators themselves.
    pub fn fit(&self) -> Result<(), ConformalError> {
        let mut folds: Vec<&usize> = self.kfold_calibrators.keys().collect();
        folds.sort_unstable();
        match folds.into_iter().find(|fold| !self.kfold_calibrators[*fold].is_fitted()) {
            Some(fold) => Err(ConformalError::FoldNotFitted(*fold)),
            None => Ok(()),
        }
    }

    pub fn calibrators(&self) -> &HashMap<usize, BaseCalibrator> {
        &self.kfold_calibrators
    }

    /// CV+ prediction intervals for the examples of `x`.
    ///
    /// * `x` - Test features.
    /// * `kfold_predictors` - Predictor trained without each fold, keyed like the calibrators.
    /// * `alpha` - Target miscoverage, at least `1/(n+1)` for `n` pooled residuals.
    pub fn calibrate<P: Predictor>(
        &self,
        x: &Matrix<f64>,
        kfold_predictors: &HashMap<usize, P>,
        alpha: f64,
    ) -> Result<PredictionInterval, ConformalError> {
        let mut folds: Vec<usize> = kfold_predictors.keys().copied().collect();
        folds.sort_unstable();
        if folds.is_empty() {
            return Err(ConformalError::Internal("no fold predictors to aggregate".to_string()));
        }

        let fold_residuals = folds
            .iter()
            .map(|fold| {
                let calibrator = self
                    .kfold_calibrators
                    .get(fold)
                    .ok_or(ConformalError::MissingCalibrator(*fold))?;
                calibrator.residuals().ok_or(ConformalError::FoldNotFitted(*fold))
            })
            .collect::<Result<Vec<&[f64]>, ConformalError>>()?;
        let n_calib: usize = fold_residuals.iter().map(|r| r.len()).sum();
        check_alpha_calib(alpha, n_calib)?;

        let blocks = folds
            .par_iter()
            .zip(fold_residuals.par_iter())
            .map(|(fold, residuals)| -> Result<CandidateBounds, ConformalError> {
                let y_pred = kfold_predictors[fold]
                    .predict(x)
                    .ok_or(ConformalError::MissingPrediction(*fold))?;
                y_pred.check_shape(&format!("fold {} prediction", fold))?;
                if y_pred.cols != 1 || y_pred.rows != x.rows {
                    return Err(ConformalError::ShapeMismatch(
                        format!("fold {} prediction", fold),
                        format!("{} rows of a single point prediction", x.rows),
                        format!("{} rows of {} columns", y_pred.rows, y_pred.cols),
                    ));
                }
                Ok(ConstantInterval::outer(&y_pred.data, residuals))
            })
            .collect::<Result<Vec<_>, ConformalError>>()?;
        let (lower_blocks, upper_blocks): (Vec<_>, Vec<_>) = blocks.into_iter().unzip();
        let lower_candidates = RowMajorMatrix::hstack(&lower_blocks)?;
        let upper_candidates = RowMajorMatrix::hstack(&upper_blocks)?;

        let bounds = (0..x.rows)
            .into_par_iter()
            .map(|i| -> Result<(f64, f64), ConformalError> {
                let neg_lower: Vec<f64> = lower_candidates.get_row(i).iter().map(|v| -v).collect();
                let lower = -quantile(&neg_lower, 1.0 - alpha, None)?;
                let upper = quantile(upper_candidates.get_row(i), 1.0 - alpha, None)?;
                Ok((lower, upper))
            })
            .collect::<Result<Vec<(f64, f64)>, ConformalError>>()?;
        let (lower, upper): (Vec<f64>, Vec<f64>) = bounds.into_iter().unzip();

        info!(
            "CV+ aggregated {} folds with {} calibration residuals for {} examples.",
            folds.len(),
            n_calib,
            x.rows
        );
        Ok(PredictionInterval { lower, upper })
    }
}
