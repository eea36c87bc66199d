//! Shared forecast pipeline used by the batch CLI and the HTTP server.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! normalize -> complete window -> merge with history -> features -> predict -> post-process
//!
//! The entry points differ only in where rows come from and how empty input
//! is treated; everything after window completion is identical.

use tracing::{debug, info, warn};

use crate::domain::{ForecastWindow, MetricRow, PodForecast, RawMetricRow};
use crate::error::{AppError, EXIT_INPUT, EXIT_NO_DATA};
use crate::features::build_features;
use crate::io::ingest::normalize_rows;
use crate::models::PodPredictor;
use crate::postprocess::{PerturbationSource, finalize_forecast};
use crate::timeline::{complete_window, history_before, merge_timeline};

/// Forecast the budget rows against the given history.
///
/// `budget` must already cover the window (see `complete_window`) and
/// `history` must end before the window starts.
pub fn forecast_window(
    history: Vec<MetricRow>,
    budget: Vec<MetricRow>,
    predictor: &PodPredictor,
    source: &mut dyn PerturbationSource,
) -> Result<Vec<PodForecast>, AppError> {
    let timeline = merge_timeline(history, budget);
    let features = build_features(&timeline);
    debug!(
        timeline_rows = timeline.len(),
        budget_rows = timeline.budget_len(),
        "features built"
    );
    let raw = predictor.predict(&features)?;
    finalize_forecast(&timeline, &raw, source)
}

/// Online path: a caller-submitted plan reconciled against full history.
///
/// An empty submission, or one where no row survives normalization, is a
/// client error. History rows without both pod counts are not used.
pub fn run_online(
    submitted: Vec<(usize, RawMetricRow)>,
    history: Vec<MetricRow>,
    window: &ForecastWindow,
    predictor: &PodPredictor,
    source: &mut dyn PerturbationSource,
) -> Result<Vec<PodForecast>, AppError> {
    if submitted.is_empty() {
        return Err(AppError::new(EXIT_INPUT, "provide rows as list of objects"));
    }

    let ingest = normalize_rows(submitted);
    if ingest.rows.is_empty() {
        return Err(AppError::new(
            EXIT_NO_DATA,
            format!(
                "none of the {} submitted rows has a valid date, gmv, users and marketing_cost",
                ingest.rows_read
            ),
        ));
    }

    let budget = complete_window(&ingest.rows, window);
    let history = history_before(history, window.start, true);
    info!(
        submitted = ingest.rows_read,
        dropped = ingest.rows_dropped(),
        history_rows = history.len(),
        window_days = budget.len(),
        "online forecast"
    );
    forecast_window(history, budget, predictor, source)
}

/// Batch path: both history and plan come from one cleaned table.
///
/// Rows inside the window form the plan, rows before it the history. A table
/// with no rows in the window still forecasts the zero-filled window.
pub fn run_batch(
    cleaned: Vec<MetricRow>,
    window: &ForecastWindow,
    predictor: &PodPredictor,
    source: &mut dyn PerturbationSource,
) -> Result<Vec<PodForecast>, AppError> {
    let plan: Vec<MetricRow> = cleaned.iter().filter(|r| window.contains(r.date)).cloned().collect();
    if plan.is_empty() {
        warn!(
            start = %window.start,
            end = %window.end,
            "no budget rows in the table; forecasting a zero-filled window"
        );
    }

    let budget = complete_window(&plan, window);
    let history = history_before(cleaned, window.start, false);
    info!(
        plan_rows = plan.len(),
        history_rows = history.len(),
        window_days = budget.len(),
        "batch forecast"
    );
    forecast_window(history, budget, predictor, source)
}
