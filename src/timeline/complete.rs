//! Budget-window completion.
//!
//! Callers submit a partial plan: some days of the window, not necessarily in
//! order. The model needs exactly one row per calendar day, so we lay the
//! submission over the full calendar and carry values forward.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{ForecastWindow, MetricRow};

/// Produce exactly one row per day of `window` from a sparse submission.
///
/// - rows outside the window are ignored
/// - when a date is submitted twice, the later submission wins
/// - each metric carries forward from the nearest earlier submitted day
/// - days before the first submission are zero-filled
///
/// Pod fields are always absent on the output.
pub fn complete_window(submitted: &[MetricRow], window: &ForecastWindow) -> Vec<MetricRow> {
    let mut by_date = BTreeMap::new();
    let mut ignored = 0usize;
    for row in submitted {
        if window.contains(row.date) {
            by_date.insert(row.date, row);
        } else {
            ignored += 1;
        }
    }
    if ignored > 0 {
        debug!(ignored, "submitted rows outside the forecast window");
    }

    let mut carried = (0.0, 0.0, 0.0);
    window
        .dates()
        .map(|date| {
            if let Some(row) = by_date.get(&date) {
                carried = (row.gmv, row.users, row.marketing_cost);
            }
            let (gmv, users, marketing_cost) = carried;
            MetricRow::new(date, gmv, users, marketing_cost)
        })
        .collect()
}
