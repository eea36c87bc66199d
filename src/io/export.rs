//! Export cleaned metrics and forecasts to CSV.
//!
//! Both tables are meant to be easy to consume in spreadsheets or downstream
//! scripts. Dates are ISO `YYYY-MM-DD`; missing pod counts are empty cells.

use std::path::Path;

use serde::Serialize;

use crate::domain::{MetricRow, PodForecast};
use crate::error::{AppError, EXIT_UPSTREAM};

/// Write the cleaned metrics table (`date,gmv,users,marketing_cost,fe_pods,be_pods`).
pub fn write_metric_csv(path: &Path, rows: &[MetricRow]) -> Result<(), AppError> {
    write_rows(path, rows)
}

/// Write forecast rows (`date,gmv,users,marketing_cost,fe_pods,be_pods`).
pub fn write_forecast_csv(path: &Path, forecasts: &[PodForecast]) -> Result<(), AppError> {
    write_rows(path, forecasts)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(
            EXIT_UPSTREAM,
            format!("Failed to create CSV '{}': {e}", path.display()),
        )
    })?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}
