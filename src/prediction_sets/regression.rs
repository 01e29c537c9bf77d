use crate::data::{NumericArray, RowMajorMatrix};
use crate::errors::ConformalError;
use crate::nonconformity::check_pair_prediction;
use crate::prediction_sets::{broadcast_thresholds, PredictionInterval, PredictionSet, PredictionSetFunction};
use rand::rngs::StdRng;

/// Interval of constant half-width `tau` around a point prediction.
#[derive(Default, Clone, Copy)]
pub struct ConstantInterval;

impl ConstantInterval {
    /// Candidate bounds of every point against every half-width.
    ///
    /// Row `i`, column `j` of the returned matrices holds `point[i] -/+ half_widths[j]`.
    pub fn outer(point: &[f64], half_widths: &[f64]) -> (RowMajorMatrix<f64>, RowMajorMatrix<f64>) {
        let mut lower = Vec::with_capacity(point.len() * half_widths.len());
        let mut upper = Vec::with_capacity(point.len() * half_widths.len());
        for p in point {
            lower.extend(half_widths.iter().map(|r| p - r));
            upper.extend(half_widths.iter().map(|r| p + r));
        }
        (
            RowMajorMatrix::new(lower, point.len(), half_widths.len()),
            RowMajorMatrix::new(upper, point.len(), half_widths.len()),
        )
    }
}

impl PredictionSetFunction for ConstantInterval {
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        _rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        if y_pred.cols() != 1 {
            return Err(ConformalError::ShapeMismatch(
                "prediction".to_string(),
                "a single point prediction per example".to_string(),
                format!("{} columns", y_pred.cols()),
            ));
        }
        let tau = broadcast_thresholds(thresholds, y_pred.rows())?;
        let point = y_pred.column(0);
        Ok(PredictionSet::Interval(PredictionInterval {
            lower: point.iter().zip(&tau).map(|(p, t)| p - t).collect(),
            upper: point.iter().zip(&tau).map(|(p, t)| p + t).collect(),
        }))
    }
}

/// Interval scaled by a predicted dispersion, `point -/+ tau * dispersion`.
#[derive(Default, Clone, Copy)]
pub struct ScaledInterval;

impl PredictionSetFunction for ScaledInterval {
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        _rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        check_pair_prediction(y_pred, "a point prediction and a dispersion estimation")?;
        let tau = broadcast_thresholds(thresholds, y_pred.rows())?;
        let point = y_pred.column(0);
        let dispersion = y_pred.column(1);
        let mut lower = Vec::with_capacity(point.len());
        let mut upper = Vec::with_capacity(point.len());
        for i in 0..point.len() {
            lower.push(point[i] - tau[i] * dispersion[i]);
            upper.push(point[i] + tau[i] * dispersion[i]);
        }
        Ok(PredictionSet::Interval(PredictionInterval { lower, upper }))
    }
}

/// Conformalized quantile band, `(q_lo - tau, q_hi + tau)`.
#[derive(Default, Clone, Copy)]
pub struct CqrInterval;

impl PredictionSetFunction for CqrInterval {
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        _rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        check_pair_prediction(y_pred, "lower and higher quantile predictions")?;
        let tau = broadcast_thresholds(thresholds, y_pred.rows())?;
        let q_lo = y_pred.column(0);
        let q_hi = y_pred.column(1);
        Ok(PredictionSet::Interval(PredictionInterval {
            lower: q_lo.iter().zip(&tau).map(|(q, t)| q - t).collect(),
            upper: q_hi.iter().zip(&tau).map(|(q, t)| q + t).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Matrix;
    use crate::nonconformity::{CqrScore, NonConformityScore};
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    #[test]
    fn test_constant_interval_width() {
        let y_pred = vec![-3.0, 0.0, 10.0, 1e6];
        for tau in [0.0, 0.5, 5.0, 1234.25] {
            let out = ConstantInterval
                .predict_set(&y_pred, &[tau], &mut rng())
                .unwrap()
                .into_interval()
                .unwrap();
            for i in 0..y_pred.len() {
                assert!(out.lower[i] <= y_pred[i] && y_pred[i] <= out.upper[i]);
                assert_eq!(out.upper[i] - out.lower[i], 2.0 * tau);
            }
        }
    }

    #[test]
    fn test_constant_interval_per_example_thresholds() {
        let out = ConstantInterval
            .predict_set(&vec![1.0, 2.0], &[0.5, f64::INFINITY], &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        assert_eq!(out.lower, vec![0.5, f64::NEG_INFINITY]);
        assert_eq!(out.upper, vec![1.5, f64::INFINITY]);
    }

    #[test]
    fn test_constant_interval_outer() {
        let (lo, hi) = ConstantInterval::outer(&[10.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!((lo.rows, lo.cols), (2, 3));
        assert_eq!(lo.get_row(0), &[9.0, 8.0, 7.0]);
        assert_eq!(hi.get_row(1), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_scaled_interval() {
        // Points [1, 2], dispersions [0.5, 2].
        let data = vec![1.0, 2.0, 0.5, 2.0];
        let y_pred = Matrix::new(&data, 2, 2);
        let out = ScaledInterval
            .predict_set(&y_pred, &[2.0], &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        assert_eq!(out.lower, vec![0.0, -2.0]);
        assert_eq!(out.upper, vec![2.0, 6.0]);
        assert!(ScaledInterval.predict_set(&vec![1.0], &[1.0], &mut rng()).is_err());
    }

    #[test]
    fn test_cqr_interval_consistent_with_score() {
        let data = vec![0.0, 1.0, 2.0, 4.0];
        let y_pred = Matrix::new(&data, 2, 2);
        let out = CqrInterval
            .predict_set(&y_pred, &[0.5], &mut rng())
            .unwrap()
            .into_interval()
            .unwrap();
        assert_eq!(out.lower, vec![-0.5, 0.5]);
        assert_eq!(out.upper, vec![2.5, 4.5]);

        // A truth on the widened bound scores exactly tau.
        let s = CqrScore.score(&y_pred, &out.upper, &mut rng()).unwrap();
        assert_eq!(s, vec![0.5, 0.5]);
        assert!(CqrInterval.predict_set(&vec![1.0], &[1.0], &mut rng()).is_err());
    }
}
