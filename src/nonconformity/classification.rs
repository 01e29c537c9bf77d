use crate::data::{Layout, NumericArray};
use crate::errors::ConformalError;
use crate::nonconformity::{check_point_observations, check_supported_types, NonConformityScore};
use crate::utils::{argsort_desc, cumsum, rank_penalty, validate_raps_parameters};
use log::warn;
use rand::rngs::StdRng;
use rand::Rng;

const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Regularized Adaptive Prediction Sets score.
///
/// Classes are ranked by descending probability. With `L` the zero-based rank
/// of the true class, the score is the probability mass ranked above it, plus a
/// uniform fraction `u` of its own probability, plus the rank penalty
/// `lambd * max(L + 1 - k_reg, 0)`.
///
/// Refer to <https://arxiv.org/abs/2009.14193> for details.
#[derive(Clone, Copy, Debug)]
pub struct RapsScore {
    pub lambd: f64,
    pub k_reg: usize,
}

impl RapsScore {
    pub fn new(lambd: f64, k_reg: usize) -> Result<Self, ConformalError> {
        validate_raps_parameters(lambd, k_reg)?;
        Ok(RapsScore { lambd, k_reg })
    }

    /// Score of a single example given the draw `u` in `[0, 1)`.
    ///
    /// * `proba` - Class probabilities of the example.
    /// * `label` - Index of the true class.
    pub fn calc_score(&self, proba: &[f64], label: usize, u: f64) -> f64 {
        let ranking = argsort_desc(proba);
        let sorted_proba: Vec<f64> = ranking.iter().map(|c| proba[*c]).collect();
        let sorted_cum_mass = cumsum(&sorted_proba);
        // `ranking` is a permutation of the classes, so the label is always found.
        let l = ranking.iter().position(|c| *c == label).unwrap_or(ranking.len() - 1);
        sorted_cum_mass[l] + (u - 1.0) * sorted_proba[l] + rank_penalty(l + 1, self.lambd, self.k_reg)
    }
}

/// Warn once if some rows of `y_pred` are not probability vectors.
pub(crate) fn warn_unnormalized(y_pred: &dyn NumericArray) {
    let unnormalized = (0..y_pred.rows())
        .filter(|i| (y_pred.row(*i).iter().sum::<f64>() - 1.0).abs() > NORMALIZATION_TOLERANCE)
        .count();
    if unnormalized > 0 {
        warn!(
            "{} of {} prediction rows do not sum to one, RAPS expects class probabilities.",
            unnormalized,
            y_pred.rows()
        );
    }
}

/// Convert a class label stored as a float into an index below `n_classes`.
pub(crate) fn class_index(value: f64, n_classes: usize, row: usize) -> Result<usize, ConformalError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value as usize >= n_classes {
        return Err(ConformalError::ShapeMismatch(
            format!("class label of example {}", row),
            format!("an integer class index below {}", n_classes),
            value.to_string(),
        ));
    }
    Ok(value as usize)
}

impl NonConformityScore for RapsScore {
    fn score(
        &self,
        y_pred: &dyn NumericArray,
        y_true: &dyn NumericArray,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>, ConformalError> {
        check_supported_types(y_pred, y_true)?;
        if y_pred.layout() != Layout::Dense {
            return Err(ConformalError::NotImplemented(
                "RAPS nonconformity score".to_string(),
                y_pred.layout().to_string(),
            ));
        }
        check_point_observations(y_true)?;
        warn_unnormalized(y_pred);
        let n_classes = y_pred.cols();
        if y_pred.ndim() != 2 || n_classes == 0 {
            return Err(ConformalError::ShapeMismatch(
                "prediction".to_string(),
                "one probability per class".to_string(),
                format!("{} dimensions", y_pred.ndim()),
            ));
        }
        let labels = y_true.column(0);
        let mut scores = Vec::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            let label = class_index(*label, n_classes, i)?;
            let u: f64 = rng.gen();
            scores.push(self.calc_score(&y_pred.row(i), label, u));
        }
        Ok(scores)
    }
}
