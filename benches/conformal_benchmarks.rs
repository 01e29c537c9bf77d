use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hashbrown::HashMap;
use perpetual_conformal::calibration::{BaseCalibrator, ConformalMethod, CvPlusCalibrator};
use perpetual_conformal::data::{Matrix, RowMajorMatrix};
use perpetual_conformal::errors::ConformalError;
use perpetual_conformal::predictor::Predictor;
use perpetual_conformal::quantile::{lemma_quantile, quantile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

struct ShiftPredictor(f64);

impl Predictor for ShiftPredictor {
    fn fit(&mut self, _x: &Matrix<f64>, _y: &[f64]) -> Result<(), ConformalError> {
        Ok(())
    }

    fn predict(&self, x: &Matrix<f64>) -> Option<RowMajorMatrix<f64>> {
        Some(RowMajorMatrix::new(
            x.get_col(0).iter().map(|v| v + self.0).collect(),
            x.rows,
            1,
        ))
    }
}

fn random_proba(n: usize, n_classes: usize, rng: &mut StdRng) -> (RowMajorMatrix<f64>, Vec<f64>) {
    let mut rows = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let raw: Vec<f64> = (0..n_classes).map(|_| rng.gen::<f64>()).collect();
        let total: f64 = raw.iter().sum();
        rows.push(raw.iter().map(|p| p / total).collect());
        labels.push(rng.gen_range(0..n_classes) as f64);
    }
    (RowMajorMatrix::from_rows(&rows).unwrap(), labels)
}

pub fn conformal_benchmarks(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let residuals: Vec<f64> = (0..100_000).map(|_| rng.gen::<f64>()).collect();
    let weights: Vec<f64> = (0..100_001).map(|_| rng.gen::<f64>()).collect();

    c.bench_function("quantile", |b| b.iter(|| quantile(black_box(&residuals), black_box(0.9), None)));
    c.bench_function("weighted lemma quantile", |b| {
        b.iter(|| lemma_quantile(black_box(&residuals), black_box(0.9), black_box(Some(&weights))))
    });

    let y_pred = vec![0.0; residuals.len()];
    let x_test: Vec<f64> = (0..1_000).map(|_| rng.gen::<f64>()).collect();
    let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
    calibrator.fit(&residuals, &y_pred, &mut rng).unwrap();
    c.bench_function("split calibrate", |b| {
        b.iter(|| calibrator.calibrate(black_box(0.1), black_box(&x_test), None, &mut rng))
    });

    let calib_weights: Vec<f64> = (0..1_000).map(|_| rng.gen::<f64>()).collect();
    let mut small = BaseCalibrator::from_method(&ConformalMethod::Mad);
    small.fit(&calib_weights, &vec![0.0; 1_000], &mut rng).unwrap();
    let w_norm = BaseCalibrator::barber_weights(&x_test, &calib_weights).unwrap();
    c.bench_function("weighted calibrate", |b| {
        b.iter(|| small.calibrate(black_box(0.1), black_box(&x_test), Some(&w_norm), &mut rng))
    });

    let (proba_cal, y_cal) = random_proba(5_000, 10, &mut rng);
    let (proba_test, _) = random_proba(1_000, 10, &mut rng);
    let mut raps = BaseCalibrator::from_method(&ConformalMethod::Raps { lambd: 0.01, k_reg: 2 });
    raps.fit(&y_cal, &proba_cal, &mut rng).unwrap();
    c.bench_function("raps calibrate", |b| {
        b.iter(|| raps.calibrate(black_box(0.1), black_box(&proba_test), None, &mut rng))
    });

    let mut cv_group = c.benchmark_group("cv_plus");
    cv_group.sample_size(10);
    cv_group.measurement_time(Duration::from_secs(10));
    let n_folds = 5;
    let mut calibrators = HashMap::new();
    let mut predictors = HashMap::new();
    for fold in 0..n_folds {
        let fold_residuals: Vec<f64> = (0..2_000).map(|_| rng.gen::<f64>()).collect();
        let mut calibrator = BaseCalibrator::from_method(&ConformalMethod::Mad);
        calibrator.fit(&fold_residuals, &vec![0.0; 2_000], &mut rng).unwrap();
        calibrators.insert(fold, Some(calibrator));
        predictors.insert(fold, ShiftPredictor(fold as f64 * 0.01));
    }
    let cv = CvPlusCalibrator::new(calibrators).unwrap();
    let x = Matrix::new(&x_test, x_test.len(), 1);
    cv_group.bench_function("cv_plus calibrate", |b| {
        b.iter(|| cv.calibrate(black_box(&x), black_box(&predictors), black_box(0.1)))
    });
    cv_group.finish();
}

criterion_group!(benches, conformal_benchmarks);
criterion_main!(benches);
