//! Pod model trainer.
//!
//! Given history rows, we:
//! - lay them out on an observed-only timeline
//! - compute features through the shared feature builder
//! - keep the rows that carry both pod counts as training examples
//! - fit one model per target (forest or linear), both targets in parallel
//!
//! The result is a pair of artifacts that the predictor loads like any other
//! model file.

use tracing::info;

use crate::domain::{MetricRow, ModelKind};
use crate::error::{AppError, EXIT_MODEL, EXIT_NO_DATA};
use crate::features::{FEATURE_COUNT, FeatureVector, build_features};
use crate::fit::forest::{ForestParams, fit_forest};
use crate::math::fit_linear;
use crate::models::{LinearModel, ModelArtifact, PodTarget, RegressionModel};
use crate::timeline::merge_timeline;

/// Minimum number of rows with pod counts needed to fit.
pub const MIN_TRAINING_ROWS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub kind: ModelKind,
    /// Used only for `ModelKind::Forest`.
    pub forest: ForestParams,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            kind: ModelKind::Forest,
            forest: ForestParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub kind: ModelKind,
    pub frontend: ModelArtifact,
    pub backend: ModelArtifact,
    pub training_rows: usize,
    /// In-sample RMSE per target, in pods.
    pub frontend_rmse: f64,
    pub backend_rmse: f64,
}

/// Fit frontend and backend models from history rows.
pub fn train_models(rows: &[MetricRow], options: &TrainOptions) -> Result<TrainedModels, AppError> {
    let timeline = merge_timeline(rows.to_vec(), Vec::new());
    let features = build_features(&timeline);

    let mut x: Vec<FeatureVector> = Vec::new();
    let mut fe: Vec<f64> = Vec::new();
    let mut be: Vec<f64> = Vec::new();
    for (row, f) in timeline.rows.iter().zip(features) {
        if let (Some(fe_pods), Some(be_pods)) = (row.row.fe_pods, row.row.be_pods) {
            x.push(f);
            fe.push(f64::from(fe_pods));
            be.push(f64::from(be_pods));
        }
    }

    if x.len() < MIN_TRAINING_ROWS {
        return Err(AppError::new(
            EXIT_NO_DATA,
            format!(
                "Need at least {MIN_TRAINING_ROWS} rows with both pod counts to train, found {}.",
                x.len()
            ),
        ));
    }

    let design: Vec<[f64; FEATURE_COUNT]> = x.iter().map(FeatureVector::to_array).collect();
    let (frontend, backend) = rayon::join(
        || fit_target(PodTarget::Frontend, &design, &fe, options),
        || fit_target(PodTarget::Backend, &design, &be, options),
    );
    let frontend = frontend?;
    let backend = backend?;

    let frontend_rmse = rmse(&frontend, &x, &fe);
    let backend_rmse = rmse(&backend, &x, &be);
    info!(
        kind = ?options.kind,
        training_rows = x.len(),
        frontend_rmse,
        backend_rmse,
        "pod models fitted"
    );

    Ok(TrainedModels {
        kind: options.kind,
        frontend,
        backend,
        training_rows: x.len(),
        frontend_rmse,
        backend_rmse,
    })
}

fn fit_target(
    target: PodTarget,
    design: &[[f64; FEATURE_COUNT]],
    y: &[f64],
    options: &TrainOptions,
) -> Result<ModelArtifact, AppError> {
    let model = match options.kind {
        ModelKind::Forest => RegressionModel::Forest(fit_forest(design, y, &options.forest)),
        ModelKind::Linear => {
            let rows: Vec<Vec<f64>> = design.iter().map(|r| r.to_vec()).collect();
            let fit = fit_linear(&rows, y).ok_or_else(|| {
                AppError::new(
                    EXIT_MODEL,
                    format!("Least squares failed for `{}`.", target.column()),
                )
            })?;
            RegressionModel::Linear(LinearModel {
                intercept: fit.intercept,
                coefficients: fit.coefficients,
            })
        }
    };
    let artifact = ModelArtifact::new(target, model);
    artifact.check_schema()?;
    Ok(artifact)
}

fn rmse(artifact: &ModelArtifact, x: &[FeatureVector], y: &[f64]) -> f64 {
    let pred = artifact.model.predict_rows(x);
    let sse: f64 = pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum();
    (sse / y.len() as f64).sqrt()
}
