//! Frontend + backend inference over a shared feature matrix.

use std::sync::Arc;

use tracing::info;

use crate::domain::ForecastConfig;
use crate::error::{AppError, EXIT_MODEL};
use crate::features::FeatureVector;
use crate::io::model_file::read_model_artifact;
use crate::models::model::{PodModel, PodTarget};

/// Raw (unrounded) estimates, one entry per feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPredictions {
    pub frontend: Vec<f64>,
    pub backend: Vec<f64>,
}

/// Holds both models behind shared, read-only handles.
///
/// Cloning is cheap; every clone points at the same loaded models.
#[derive(Clone)]
pub struct PodPredictor {
    frontend: Arc<dyn PodModel>,
    backend: Arc<dyn PodModel>,
}

impl PodPredictor {
    pub fn new(frontend: Arc<dyn PodModel>, backend: Arc<dyn PodModel>) -> Self {
        Self { frontend, backend }
    }

    /// Load both artifacts named in the config, checking schema and targets.
    pub fn load(config: &ForecastConfig) -> Result<Self, AppError> {
        let frontend = read_model_artifact(&config.fe_model)?;
        let backend = read_model_artifact(&config.be_model)?;

        for (artifact, expected, path) in [
            (&frontend, PodTarget::Frontend, &config.fe_model),
            (&backend, PodTarget::Backend, &config.be_model),
        ] {
            if artifact.target != expected {
                return Err(AppError::new(
                    EXIT_MODEL,
                    format!(
                        "Model '{}' predicts `{}`, expected `{}`.",
                        path.display(),
                        artifact.target.column(),
                        expected.column()
                    ),
                ));
            }
        }

        info!(
            fe_model = %config.fe_model.display(),
            be_model = %config.be_model.display(),
            "models loaded"
        );
        Ok(Self::new(Arc::new(frontend), Arc::new(backend)))
    }

    /// Run both models over the same rows.
    ///
    /// The two calls are independent and run in parallel. Any length mismatch
    /// or non-finite output fails the whole prediction.
    pub fn predict(&self, features: &[FeatureVector]) -> Result<RawPredictions, AppError> {
        let (frontend, backend) = rayon::join(
            || self.frontend.predict(features),
            || self.backend.predict(features),
        );
        let frontend = check_output(frontend?, features.len(), PodTarget::Frontend)?;
        let backend = check_output(backend?, features.len(), PodTarget::Backend)?;
        Ok(RawPredictions { frontend, backend })
    }
}

fn check_output(values: Vec<f64>, expected: usize, target: PodTarget) -> Result<Vec<f64>, AppError> {
    if values.len() != expected {
        return Err(AppError::new(
            EXIT_MODEL,
            format!(
                "`{}` model returned {} predictions for {expected} rows.",
                target.column(),
                values.len()
            ),
        ));
    }
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(AppError::new(
            EXIT_MODEL,
            format!("`{}` model returned a non-finite prediction at row {idx}.", target.column()),
        ));
    }
    Ok(values)
}
