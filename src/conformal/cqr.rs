use crate::calibration::ConformalMethod;
use crate::conformal::ConformalPredictor;
use crate::errors::ConformalError;
use crate::predictor::Predictor;

/// Conformalized Quantile Regression.
///
/// The predictor returns a lower and a higher quantile estimate per example,
/// and the band is widened (or narrowed) by the calibrated CQR score quantile.
/// Refer to <https://arxiv.org/abs/1905.03222> for details.
pub struct Cqr;

impl Cqr {
    /// * `predictor` - Model predicting (lower, higher) quantile pairs.
    /// * `train` - If false the model is used as is.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<P: Predictor>(predictor: P, train: bool) -> Result<ConformalPredictor<P>, ConformalError> {
        ConformalPredictor::from_method(predictor, &ConformalMethod::Cqr, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Matrix, RowMajorMatrix};
    use crate::quantile::quantile;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Empirical quantiles of the training targets, independent of the features.
    struct EmpiricalBand {
        quantiles: (f64, f64),
        band: Option<(f64, f64)>,
    }

    impl Predictor for EmpiricalBand {
        fn fit(&mut self, _x: &Matrix<f64>, y: &[f64]) -> Result<(), ConformalError> {
            let lo = quantile(y, self.quantiles.0, None)?;
            let hi = quantile(y, self.quantiles.1, None)?;
            self.band = Some((lo, hi));
            Ok(())
        }

        fn predict(&self, x: &Matrix<f64>) -> Option<RowMajorMatrix<f64>> {
            let (lo, hi) = self.band?;
            let data = (0..x.rows).flat_map(|_| [lo, hi]).collect();
            Some(RowMajorMatrix::new(data, x.rows, 2))
        }
    }

    #[test]
    fn test_cqr_wrapper_coverage() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut draw = |n: usize| -> Vec<f64> { (0..n).map(|_| rng.gen::<f64>() * 10.0).collect() };
        let y_fit = draw(200);
        let y_calib = draw(500);
        let y_test = draw(2000);
        let features = vec![0.0; 2000];

        let predictor = EmpiricalBand {
            quantiles: (0.3, 0.7),
            band: None,
        };
        let mut cqr = Cqr::new(predictor, true).unwrap();
        let mut rng = StdRng::seed_from_u64(22);
        cqr.fit(
            &Matrix::new(&features[..200], 200, 1),
            &y_fit,
            &Matrix::new(&features[..500], 500, 1),
            &y_calib,
            &mut rng,
        )
        .unwrap();

        let alpha = 0.1;
        let (band, set) = cqr
            .predict(&Matrix::new(&features, 2000, 1), alpha, &mut rng)
            .unwrap();
        let interval = set.into_interval().unwrap();
        // The raw band only covers about 40%, calibration widens it.
        assert!(interval.upper[0] - interval.lower[0] > band.get(0, 1) - band.get(0, 0));
        let covered = y_test
            .iter()
            .enumerate()
            .filter(|(i, y)| interval.lower[*i] <= **y && **y <= interval.upper[*i])
            .count();
        let coverage = covered as f64 / y_test.len() as f64;
        assert!((coverage - (1.0 - alpha)).abs() < 0.05, "coverage {}", coverage);
    }

    #[test]
    fn test_cqr_wrapper_untrained_predictor() {
        let predictor = EmpiricalBand {
            quantiles: (0.1, 0.9),
            band: None,
        };
        let mut cqr = Cqr::new(predictor, false).unwrap();
        let features = vec![0.0; 3];
        let x = Matrix::new(&features, 3, 1);
        let err = cqr
            .fit(&x, &[1.0, 2.0, 3.0], &x, &[1.0, 2.0, 3.0], &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, ConformalError::Predictor(_)));
    }
}
