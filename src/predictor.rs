//! Predictor
//!
//! The contract an underlying point predictor has to satisfy. Training and
//! model selection happen outside of this crate.
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::ConformalError;

/// A model exposing fit and predict over feature matrices.
pub trait Predictor: Send + Sync {
    /// Train the model.
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), ConformalError>;

    /// Predict one row per example of `x`.
    ///
    /// Depending on the conformal method the row holds a point prediction,
    /// a (point, dispersion) pair, a (lower, upper) quantile pair or one
    /// probability per class. `None` means no prediction is available.
    fn predict(&self, x: &Matrix<f64>) -> Option<RowMajorMatrix<f64>>;
}

impl<P: Predictor + ?Sized> Predictor for Box<P> {
    fn fit(&mut self, x: &Matrix<f64>, y: &[f64]) -> Result<(), ConformalError> {
        (**self).fit(x, y)
    }

    fn predict(&self, x: &Matrix<f64>) -> Option<RowMajorMatrix<f64>> {
        (**self).predict(x)
    }
}
