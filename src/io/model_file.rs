//! Read/write model artifact JSON files.
//!
//! An artifact is the portable representation of a trained model:
//! - feature schema version + column names it was trained on
//! - which pod count it predicts
//! - the model itself (forest or linear)
//!
//! The schema is defined by `models::ModelArtifact`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{AppError, EXIT_MODEL, EXIT_UPSTREAM};
use crate::models::ModelArtifact;

/// Write a model artifact.
pub fn write_model_artifact(path: &Path, artifact: &ModelArtifact) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_UPSTREAM,
            format!("Failed to create model file '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, artifact)
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to write model file: {e}")))?;
    Ok(())
}

/// Read a model artifact and check it against the current feature schema.
pub fn read_model_artifact(path: &Path) -> Result<ModelArtifact, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_MODEL,
            format!("Failed to open model file '{}': {e}", path.display()),
        )
    })?;
    let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        AppError::new(
            EXIT_MODEL,
            format!("Invalid model file '{}': {e}", path.display()),
        )
    })?;
    artifact.check_schema()?;
    Ok(artifact)
}
