/// Added to dispersion estimates before dividing by them.
pub const EPSILON: f64 = 1e-12;
/// Slack when comparing cumulative mass against a quantile level.
pub const QUANTILE_TOLERANCE: f64 = 1e-10;
