//! Weighted Quantile
//!
//! Empirical quantiles with inverted-CDF selection, and the `+inf` augmented
//! variant used to turn calibration residuals into a conformal threshold.
use crate::constants::QUANTILE_TOLERANCE;
use crate::errors::ConformalError;
use crate::utils::{validate_float_parameter, validate_weights};

/// Check that `alpha` is reachable with `n` calibration residuals.
///
/// With `n` residuals the finest achievable miscoverage is `1/(n+1)`, so any
/// smaller `alpha` would always select the appended `+inf`.
pub fn check_alpha_calib(alpha: f64, n: usize) -> Result<(), ConformalError> {
    if !alpha.is_finite() || alpha <= 0.0 || alpha >= 1.0 {
        return Err(ConformalError::InvalidParameter(
            "alpha".to_string(),
            "real value within the open interval (0, 1)".to_string(),
            alpha.to_string(),
        ));
    }
    let bound = 1.0 / (n as f64 + 1.0);
    if alpha < bound {
        return Err(ConformalError::AlphaTooSmall { alpha, n, bound });
    }
    Ok(())
}

/// Empirical quantile of `v` at level `q`, inverted-CDF style.
///
/// Returns the smallest value whose cumulative (optionally weighted) mass is
/// at least `q`. Without weights this is the `ceil(q * n)`-th order statistic.
///
/// * `v` - Sample to find the quantile of. `+inf` is allowed.
/// * `q` - Level within `[0, 1]`.
/// * `sample_weight` - Optional weights, one per value.
pub fn quantile(v: &[f64], q: f64, sample_weight: Option<&[f64]>) -> Result<f64, ConformalError> {
    if v.is_empty() {
        return Err(ConformalError::ShapeMismatch(
            "quantile sample".to_string(),
            "at least one value".to_string(),
            "0".to_string(),
        ));
    }
    validate_float_parameter(q, 0.0, 1.0, "q")?;
    if let Some(idx) = v.iter().position(|x| x.is_nan()) {
        return Err(ConformalError::NonFiniteScore(idx, v[idx]));
    }

    let mut idx: Vec<usize> = (0..v.len()).collect();
    idx.sort_by(|a, b| v[*a].total_cmp(&v[*b]));

    match sample_weight {
        None => {
            let k = ((q * v.len() as f64) - QUANTILE_TOLERANCE).ceil().max(1.0) as usize;
            Ok(v[idx[k.min(v.len()) - 1]])
        }
        Some(w) => {
            validate_weights(w, v.len())?;
            let total: f64 = w.iter().sum();
            let mut cuml_pct = 0.0;
            for i in idx.iter() {
                cuml_pct += w[*i] / total;
                if cuml_pct >= q - QUANTILE_TOLERANCE {
                    return Ok(v[*i]);
                }
            }
            // Rounding left the cumulative mass just short of `q`.
            Ok(v[idx[idx.len() - 1]])
        }
    }
}

/// Quantile of the residuals augmented with one `+inf` score.
///
/// The extra score stands for the unseen test point, making the effective
/// sample size `n + 1`. When weights are given they must cover the augmented
/// sample, the last entry being the mass of the test point.
pub fn lemma_quantile(residuals: &[f64], q: f64, sample_weight: Option<&[f64]>) -> Result<f64, ConformalError> {
    let mut lemma_residuals = Vec::with_capacity(residuals.len() + 1);
    lemma_residuals.extend_from_slice(residuals);
    lemma_residuals.push(f64::INFINITY);
    quantile(&lemma_residuals, q, sample_weight)
}
