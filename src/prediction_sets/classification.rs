use crate::data::{Layout, NumericArray};
use crate::errors::ConformalError;
use crate::nonconformity::classification::warn_unnormalized;
use crate::prediction_sets::{broadcast_thresholds, PredictionSet, PredictionSetFunction};
use crate::utils::{argsort_desc, cumsum, rank_penalty, validate_raps_parameters};
use rand::rngs::StdRng;
use rand::Rng;

/// Regularized Adaptive Prediction Sets.
///
/// Classes are added by decreasing probability until the penalized cumulative
/// mass passes the calibrated threshold. Whether the class that crosses the
/// threshold is kept is decided by a uniform draw, the same randomization the
/// RAPS score applies, so that set coverage matches the calibrated level.
#[derive(Clone, Copy, Debug)]
pub struct RapsSet {
    pub lambd: f64,
    pub k_reg: usize,
}

/// Where the prediction set of one example is cut.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RapsCutoff {
    /// One-based rank of the first class whose penalized cumulative mass exceeds the threshold.
    pub rank: usize,
    /// The boundary class is kept when the uniform draw falls below this fraction.
    pub v: f64,
}

impl RapsSet {
    pub fn new(lambd: f64, k_reg: usize) -> Result<Self, ConformalError> {
        validate_raps_parameters(lambd, k_reg)?;
        Ok(RapsSet { lambd, k_reg })
    }

    /// Locate the boundary class of `sorted_proba` for threshold `tau`.
    ///
    /// * `sorted_proba` - Class probabilities in decreasing order.
    /// * `tau` - Calibrated score quantile.
    pub fn cutoff(&self, sorted_proba: &[f64], tau: f64) -> RapsCutoff {
        let sorted_cum_mass = cumsum(sorted_proba);
        let below = sorted_cum_mass
            .iter()
            .enumerate()
            .filter(|(j, m)| *m + rank_penalty(j + 1, self.lambd, self.k_reg) <= tau)
            .count();
        let rank = below + 1;
        if rank > sorted_proba.len() {
            return RapsCutoff {
                rank,
                v: f64::INFINITY,
            };
        }
        let p = sorted_proba[rank - 1];
        let mass_above = if rank > 1 { sorted_cum_mass[rank - 2] } else { 0.0 };
        // Share of the boundary class needed to reach `tau`. A penalty step at
        // the boundary rank can push it below zero, the class is then dropped.
        let proba_excess = tau - mass_above - rank_penalty(rank, self.lambd, self.k_reg);
        let v = if p > 0.0 { (proba_excess / p).clamp(0.0, 1.0) } else { 0.0 };
        RapsCutoff { rank, v }
    }

    /// Prediction set of a single example given the draw `u` in `[0, 1)`.
    pub fn calc_set(&self, proba: &[f64], tau: f64, u: f64) -> Vec<usize> {
        let ranking = argsort_desc(proba);
        let sorted_proba: Vec<f64> = ranking.iter().map(|c| proba[*c]).collect();
        let RapsCutoff { rank, v } = self.cutoff(&sorted_proba, tau);
        let cut = if v <= u { rank - 1 } else { rank };
        ranking[..cut.min(ranking.len())].to_vec()
    }
}

impl PredictionSetFunction for RapsSet {
    fn predict_set(
        &self,
        y_pred: &dyn NumericArray,
        thresholds: &[f64],
        rng: &mut StdRng,
    ) -> Result<PredictionSet, ConformalError> {
        if y_pred.layout() != Layout::Dense {
            return Err(ConformalError::NotImplemented(
                "RAPS prediction set".to_string(),
                y_pred.layout().to_string(),
            ));
        }
        if y_pred.ndim() != 2 || y_pred.cols() == 0 {
            return Err(ConformalError::ShapeMismatch(
                "prediction".to_string(),
                "one probability per class".to_string(),
                format!("{} dimensions", y_pred.ndim()),
            ));
        }
        warn_unnormalized(y_pred);
        let tau = broadcast_thresholds(thresholds, y_pred.rows())?;
        let mut sets = Vec::with_capacity(y_pred.rows());
        for (i, t) in tau.iter().enumerate() {
            let u: f64 = rng.gen();
            sets.push(self.calc_set(&y_pred.row(i), *t, u));
        }
        Ok(PredictionSet::Classes(sets))
    }
}
