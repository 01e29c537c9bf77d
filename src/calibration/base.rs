use crate::calibration::config::ConformalMethod;
use crate::constants::EPSILON;
use crate::data::{NumericArray, RowMajorMatrix};
use crate::errors::ConformalError;
use crate::nonconformity::{NonConformityScore, Score};
use crate::prediction_sets::{PredictionSet, PredictionSetFunction, SetConstructor};
use crate::quantile::{check_alpha_calib, lemma_quantile};
use log::{info, warn};
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Split conformal calibrator.
///
/// Pairs a nonconformity score with the prediction set constructor that
/// inverts it. `fit` stores the calibration residuals, `calibrate` turns
/// their (optionally weighted) `1 - alpha` quantile into prediction sets.
#[derive(Clone)]
pub struct BaseCalibrator {
    score: Score,
    set_constructor: SetConstructor,
    residuals: Option<Vec<f64>>,
}

impl BaseCalibrator {
    /// Create an unfitted calibrator.
    ///
    /// * `score` - Nonconformity score computed on the calibration set.
    /// * `set_constructor` - Prediction set built from the calibrated threshold.
    pub fn new(score: Score, set_constructor: SetConstructor) -> Self {
        BaseCalibrator {
            score,
            set_constructor,
            residuals: None,
        }
    }

    /// Create an unfitted calibrator with the score and set of a conformal method.
    pub fn from_method(method: &ConformalMethod) -> Self {
        BaseCalibrator::new(method.score(), method.set_constructor())
    }

    /// Normalized weights of the Jackknife+ style weighted calibration.
    ///
    /// Every row holds the calibration weights divided by `sum + 1`, followed
    /// by the mass `1 / (sum + 1)` of the test point, so each row sums to one.
    ///
    /// * `x` - Test examples, one output row per example.
    /// * `weights_calib` - Non-negative weight of each calibration example.
    pub fn barber_weights(x: &dyn NumericArray, weights_calib: &[f64]) -> Result<RowMajorMatrix<f64>, ConformalError> {
        if let Some(w) = weights_calib.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ConformalError::InvalidParameter(
                "weights_calib".to_string(),
                "finite non-negative values".to_string(),
                w.to_string(),
            ));
        }
        let sum_weights: f64 = weights_calib.iter().sum();
        let calib_size = weights_calib.len();

        let mut row = Vec::with_capacity(calib_size + 1);
        row.extend(weights_calib.iter().map(|w| w / (sum_weights + 1.0)));
        row.push(1.0 / (sum_weights + 1.0));

        let mut w_norm = RowMajorMatrix::new(Vec::with_capacity(x.rows() * (calib_size + 1)), 0, calib_size + 1);
        for _ in 0..x.rows() {
            w_norm.append_row(row.clone())?;
        }
        Ok(w_norm)
    }

    /// Compute and store the nonconformity scores of the calibration set.
    ///
    /// Refitting replaces the previous residuals.
    pub fn fit(
        &mut self,
        y_true: &dyn NumericArray,
        y_pred: &dyn NumericArray,
        rng: &mut StdRng,
    ) -> Result<(), ConformalError> {
        let residuals = self.score.score(y_pred, y_true, rng)?;
        if let Some((idx, r)) = residuals.iter().enumerate().find(|(_, r)| !r.is_finite()) {
            return Err(ConformalError::NonFiniteScore(idx, *r));
        }
        info!("Computed {} nonconformity scores on the calibration set.", residuals.len());
        self.residuals = Some(residuals);
        Ok(())
    }

    /// Build prediction sets for new predictions at miscoverage level `alpha`.
    ///
    /// * `alpha` - Target miscoverage, at least `1/(n+1)` for `n` residuals.
    /// * `y_pred` - Predictions for the new examples.
    /// * `weights` - Optional normalized weights, one row of `n + 1` values
    ///   either shared by every example or given per example.
    /// * `rng` - Source of randomness for randomized sets.
    pub fn calibrate(
        &self,
        alpha: f64,
        y_pred: &dyn NumericArray,
        weights: Option<&RowMajorMatrix<f64>>,
        rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        let residuals = self
            .residuals
            .as_deref()
            .ok_or_else(|| ConformalError::NotFitted("calibrate".to_string()))?;
        check_alpha_calib(alpha, residuals.len())?;

        let thresholds = match weights {
            None => vec![lemma_quantile(residuals, 1.0 - alpha, None)?],
            Some(w_norm) => {
                if w_norm.cols != residuals.len() + 1 {
                    return Err(ConformalError::ShapeMismatch(
                        "calibration weights".to_string(),
                        format!("{} columns", residuals.len() + 1),
                        w_norm.cols.to_string(),
                    ));
                }
                let unnormalized = (0..w_norm.rows)
                    .filter(|i| (w_norm.get_row(*i).iter().sum::<f64>() - 1.0).abs() > EPSILON.sqrt())
                    .count();
                if unnormalized > 0 {
                    warn!(
                        "{} weight rows do not sum to one, they will be normalized before computing quantiles.",
                        unnormalized
                    );
                }
                (0..w_norm.rows)
                    .into_par_iter()
                    .map(|i| lemma_quantile(residuals, 1.0 - alpha, Some(w_norm.get_row(i))))
                    .collect::<Result<Vec<f64>, ConformalError>>()?
            }
        };

        self.set_constructor.predict_set(y_pred, &thresholds, rng)
    }

    /// Calibration residuals, once fitted.
    pub fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    /// Number of calibration residuals, zero before fitting.
    pub fn len_calib(&self) -> usize {
        self.residuals.as_ref().map_or(0, |r| r.len())
    }

    pub fn is_fitted(&self) -> bool {
        self.residuals.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Matrix;
    use crate::prediction_sets::{PredictionInterval, RapsSet};
    use rand::{Rng, SeedableRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    fn mad_calibrator(residuals: &[f64]) -> BaseCalibrator {
        let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
        let y_true: Vec<f64> = residuals.to_vec();
        let y_pred = vec![0.0; residuals.len()];
        calibrator.fit(&y_true, &y_pred, &mut rng()).unwrap();
        calibrator
    }

    #[test]
    fn test_fit_stores_residuals() {
        let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
        assert!(!calibrator.is_fitted());
        assert_eq!(calibrator.len_calib(), 0);
        calibrator
            .fit(&vec![1.0, 2.0, 3.0], &vec![2.0, 2.0, 1.0], &mut rng())
            .unwrap();
        assert_eq!(calibrator.residuals().unwrap(), &[1.0, 0.0, 2.0]);
        assert_eq!(calibrator.len_calib(), 3);

        // Refitting replaces.
        calibrator.fit(&vec![5.0], &vec![1.0], &mut rng()).unwrap();
        assert_eq!(calibrator.residuals().unwrap(), &[4.0]);
    }

    #[test]
    fn test_fit_rejects_non_finite_scores() {
        let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
        let err = calibrator
            .fit(&vec![1.0, f64::NAN], &vec![0.0, 0.0], &mut rng())
            .unwrap_err();
        assert!(matches!(err, ConformalError::NonFiniteScore(1, _)));
        assert!(!calibrator.is_fitted());
    }

    #[test]
    fn test_split_conformal_interval() {
        let calibrator = mad_calibrator(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = calibrator
            .calibrate(0.2, &vec![10.0], None, &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        assert_eq!(
            out,
            PredictionInterval {
                lower: vec![5.0],
                upper: vec![15.0]
            }
        );
    }

    #[test]
    fn test_calibrate_before_fit() {
        let calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
        let err = calibrator.calibrate(0.1, &vec![1.0], None, &mut rng()).unwrap_err();
        assert!(matches!(err, ConformalError::NotFitted(_)));
    }

    #[test]
    fn test_calibrate_alpha_bounds() {
        let calibrator = mad_calibrator(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            calibrator.calibrate(0.2, &vec![1.0], None, &mut rng()).unwrap_err(),
            ConformalError::AlphaTooSmall { n: 3, .. }
        ));
        assert!(calibrator.calibrate(0.25, &vec![1.0], None, &mut rng()).is_ok());
        assert!(calibrator.calibrate(1.0, &vec![1.0], None, &mut rng()).is_err());
        assert!(calibrator.calibrate(f64::NAN, &vec![1.0], None, &mut rng()).is_err());
    }

    #[test]
    fn test_barber_weights() {
        let x = vec![0.0, 0.0];
        let w = BaseCalibrator::barber_weights(&x, &[1.0, 1.0, 2.0]).unwrap();
        assert_eq!((w.rows, w.cols), (2, 4));
        for i in 0..2 {
            let row = w.get_row(i);
            assert_eq!(row, &[0.2, 0.2, 0.4, 0.2]);
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        assert!(BaseCalibrator::barber_weights(&x, &[1.0, -1.0]).is_err());

        // All-zero weights put the whole mass on the test point.
        let w = BaseCalibrator::barber_weights(&x, &[0.0, 0.0]).unwrap();
        assert_eq!(w.get_row(1), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_uniform_weights_match_unweighted() {
        let calibrator = mad_calibrator(&[0.5, 3.0, 1.5, 2.0, 1.0, 4.0, 2.5]);
        let y_pred = vec![0.0, 1.0, -2.0];
        let w = BaseCalibrator::barber_weights(&y_pred, &[1.0; 7]).unwrap();
        for alpha in [0.15, 0.3, 0.5, 0.8] {
            let weighted = calibrator.calibrate(alpha, &y_pred, Some(&w), &mut rng()).unwrap();
            let plain = calibrator.calibrate(alpha, &y_pred, None, &mut rng()).unwrap();
            assert_eq!(weighted, plain);
        }
    }

    #[test]
    fn test_per_example_weights() {
        let calibrator = mad_calibrator(&[1.0, 2.0, 3.0]);
        // First example trusts the small residual, second the large one.
        let w = RowMajorMatrix::from_rows(&[vec![0.7, 0.1, 0.1, 0.1], vec![0.1, 0.1, 0.7, 0.1]]).unwrap();
        let out = calibrator
            .calibrate(0.5, &vec![0.0, 0.0], Some(&w), &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        assert_eq!(out.upper, vec![1.0, 3.0]);

        let bad = RowMajorMatrix::from_rows(&[vec![0.5, 0.5]]).unwrap();
        assert!(calibrator.calibrate(0.5, &vec![0.0], Some(&bad), &mut rng()).is_err());
        // Three weight rows for two examples.
        let three = RowMajorMatrix::from_rows(&[vec![0.25; 4], vec![0.25; 4], vec![0.25; 4]]).unwrap();
        assert!(calibrator.calibrate(0.5, &vec![0.0, 0.0], Some(&three), &mut rng()).is_err());
    }

    #[test]
    fn test_scaled_mad_calibration() {
        let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::ScaledMad);
        // Points all zero, dispersion 2, so residuals are |y| / 2.
        let calib = vec![0.0, 0.0, 0.0, 2.0, 2.0, 2.0];
        let y_pred = Matrix::new(&calib, 3, 2);
        calibrator.fit(&vec![2.0, 4.0, 6.0], &y_pred, &mut rng()).unwrap();
        let test = vec![10.0, 3.0];
        let out = calibrator
            .calibrate(0.25, &Matrix::new(&test, 1, 2), None, &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        let tau = 6.0 / (2.0 + EPSILON);
        assert!((out.upper[0] - (10.0 + 3.0 * tau)).abs() < 1e-9);
        assert!((out.lower[0] - (10.0 - 3.0 * tau)).abs() < 1e-9);
    }

    #[test]
    fn test_raps_calibration() {
        let method = ConformalMethod::Raps { lambd: 0.0, k_reg: 1 };
        let mut calibrator = BaseCalibrator::from_method(&method);
        let proba = RowMajorMatrix::from_rows(&[
            vec![0.7, 0.2, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.3, 0.3, 0.4],
            vec![0.6, 0.3, 0.1],
        ])
        .unwrap();
        calibrator
            .fit(&vec![0.0, 1.0, 2.0, 1.0], &proba, &mut rng())
            .unwrap();
        let test = RowMajorMatrix::from_rows(&[vec![0.5, 0.4, 0.1]]).unwrap();
        let sets = calibrator
            .calibrate(0.2, &test, None, &mut rng())
            .unwrap()
            .into_classes()
            .unwrap();
        assert_eq!(sets.len(), 1);

        // With n = 4 and alpha = 0.2 the threshold is the largest residual.
        let tau = calibrator.residuals().unwrap().iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let u: f64 = rng().gen();
        let expected = RapsSet::new(0.0, 1).unwrap().calc_set(test.get_row(0), tau, u);
        assert_eq!(sets[0], expected);
    }
}
