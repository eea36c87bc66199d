//! Pod regression models and the two-model predictor.
//!
//! Models are consumed only through [`PodModel::predict`], so anything that maps
//! feature rows to numbers (persisted forests, the linear baseline, test stubs)
//! can back the predictor.

pub mod model;
pub mod predictor;

pub use model::*;
pub use predictor::*;
