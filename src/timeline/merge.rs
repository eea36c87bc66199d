//! History + budget merge.

use chrono::NaiveDate;

use crate::domain::{MetricRow, Origin, Timeline, TimelineRow};

/// Concatenate history and budget rows and sort them by date.
///
/// The sort is stable and nothing is deduplicated: the caller is responsible
/// for keeping the two date ranges disjoint (see [`history_before`]).
pub fn merge_timeline(history: Vec<MetricRow>, budget: Vec<MetricRow>) -> Timeline {
    let mut rows: Vec<TimelineRow> = history
        .into_iter()
        .map(|row| TimelineRow {
            row,
            origin: Origin::Observed,
        })
        .chain(budget.into_iter().map(|row| TimelineRow {
            row,
            origin: Origin::Budget,
        }))
        .collect();
    rows.sort_by_key(|r| r.row.date);
    Timeline { rows }
}

/// Keep history rows dated strictly before `start`.
///
/// With `require_pods`, rows missing either pod count are dropped as well (the
/// online path only trusts days with recorded or imputed capacity).
pub fn history_before(rows: Vec<MetricRow>, start: NaiveDate, require_pods: bool) -> Vec<MetricRow> {
    rows.into_iter()
        .filter(|r| r.date < start)
        .filter(|r| !require_pods || r.has_pods())
        .collect()
}
