use crate::errors::ConformalError;
use std::cmp::Ordering;

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), ConformalError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(ConformalError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Check a weight vector against the sample it weighs.
///
/// Weights must be finite, non-negative, have a positive total and one entry per value.
pub fn validate_weights(weights: &[f64], expected_len: usize) -> Result<(), ConformalError> {
    if weights.len() != expected_len {
        return Err(ConformalError::ShapeMismatch(
            "weights".to_string(),
            format!("{} weights", expected_len),
            weights.len().to_string(),
        ));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ConformalError::InvalidParameter(
            "weights".to_string(),
            "finite non-negative values".to_string(),
            w.to_string(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(ConformalError::InvalidParameter(
            "weights".to_string(),
            "a positive total".to_string(),
            total.to_string(),
        ));
    }
    Ok(())
}

/// Check the RAPS regularization parameters.
///
/// * `lambd` - Penalty per rank beyond `k_reg`, finite and non-negative.
/// * `k_reg` - Number of top ranks left unpenalized, at least 1.
pub fn validate_raps_parameters(lambd: f64, k_reg: usize) -> Result<(), ConformalError> {
    validate_float_parameter(lambd, 0.0, f64::MAX, "lambd")?;
    if k_reg < 1 {
        return Err(ConformalError::InvalidParameter(
            "k_reg".to_string(),
            "integer greater or equal to 1".to_string(),
            k_reg.to_string(),
        ));
    }
    Ok(())
}

/// RAPS penalty for the class at one-based `rank`: `lambd * max(rank - k_reg, 0)`.
#[inline]
pub fn rank_penalty(rank: usize, lambd: f64, k_reg: usize) -> f64 {
    lambd * rank.saturating_sub(k_reg) as f64
}

/// Rank positions by descending value, ties keep their original order.
///
/// * `v` - Values to rank, for example class probabilities.
pub fn argsort_desc(v: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..v.len()).collect();
    idx.sort_by(|a, b| v[*b].partial_cmp(&v[*a]).unwrap_or(Ordering::Equal));
    idx
}

/// Cumulative sum of a slice.
pub fn cumsum(v: &[f64]) -> Vec<f64> {
    v.iter()
        .scan(0.0, |acc, x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}
