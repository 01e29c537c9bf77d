// Modules
pub mod calibration;
pub mod conformal;
pub mod constants;
pub mod data;
pub mod errors;
pub mod nonconformity;
pub mod prediction_sets;
pub mod predictor;
pub mod quantile;
pub mod utils;

// Individual classes, and functions
pub use calibration::{BaseCalibrator, CalibratorConfig, ConfigIO, ConformalMethod, CvPlusCalibrator};
pub use conformal::{ConformalPredictor, Cqr, Raps};
pub use data::{ColumnarMatrix, Layout, Matrix, NumericArray, RowMajorMatrix};
pub use errors::ConformalError;
pub use nonconformity::{NonConformityScore, Score};
pub use prediction_sets::{PredictionInterval, PredictionSet, PredictionSetFunction, SetConstructor};
pub use predictor::Predictor;
pub use quantile::{check_alpha_calib, lemma_quantile, quantile};
