use crate::constants::EPSILON;
use crate::data::{Layout, NumericArray};
use crate::errors::ConformalError;
use crate::nonconformity::{check_pair_prediction, check_point_observations, check_supported_types, NonConformityScore};
use rand::rngs::StdRng;

/// Mean absolute deviation score, `|y_pred - y_true|`.
#[derive(Default, Clone, Copy)]
pub struct MadScore;

impl MadScore {
    pub fn calc_score(y_pred: &[f64], y_true: &[f64]) -> Vec<f64> {
        y_pred.iter().zip(y_true).map(|(p, t)| (p - t).abs()).collect()
    }
}

impl NonConformityScore for MadScore {
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        _rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError> {
        check_supported_types(y_pred, y_true)?;
        if y_pred.cols() != 1 || y_true.cols() != 1 {
            return Err(ConformalError::ShapeMismatch(
                "absolute deviation inputs".to_string(),
                "a single column".to_string(),
                format!("{} and {} columns", y_pred.cols(), y_true.cols()),
            ));
        }
        Ok(MadScore::calc_score(&y_pred.column(0), &y_true.column(0)))
    }
}

/// Scaled mean absolute deviation score.
///
/// Predictions hold a point estimate in the first column and a dispersion
/// estimate in the second; the score is `|point - y_true| / (dispersion + eps)`.
#[derive(Default, Clone, Copy)]
pub struct ScaledMadScore;

impl NonConformityScore for ScaledMadScore {
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        _rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError> {
        check_supported_types(y_pred, y_true)?;
        check_pair_prediction(y_pred, "a point prediction and a dispersion estimation")?;
        check_point_observations(y_true)?;
        let point = y_pred.column(0);
        let dispersion = y_pred.column(1);
        let mad = MadScore::calc_score(&point, &y_true.column(0));
        Ok(mad.iter().zip(dispersion.iter()).map(|(m, d)| m / (d + EPSILON)).collect())
    }
}

/// Conformalized Quantile Regression score, `max(q_lo - y_true, y_true - q_hi)`.
///
/// Negative when the observation falls strictly inside the predicted band.
#[derive(Default, Clone, Copy)]
pub struct CqrScore;

impl NonConformityScore for CqrScore {
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        _rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError> {
        check_supported_types(y_pred, y_true)?;
        check_pair_prediction(y_pred, "lower and higher quantile estimations")?;
        check_point_observations(y_true)?;
        if y_pred.layout() == Layout::Columnar {
            return Err(ConformalError::NotImplemented(
                "CQR score".to_string(),
                Layout::Columnar.to_string(),
            ));
        }
        let q_lo = y_pred.column(0);
        let q_hi = y_pred.column(1);
        let y = y_true.column(0);
        Ok((0..y.len()).map(|i| f64::max(q_lo[i] - y[i], y[i] - q_hi[i])).collect())
    }
}
