//! Reporting utilities: data-quality summaries and formatted terminal output.

pub mod format;

pub use format::*;

use chrono::NaiveDate;

use crate::domain::{MetricRow, RawMetricRow};
use crate::io::ingest::{IngestedRows, normalize_rows, parse_date, parse_number};

/// Number of trailing rows shown in the inspection preview.
pub const PREVIEW_ROWS: usize = 5;

/// Missing or unparseable cell counts for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGaps {
    pub name: &'static str,
    pub missing: usize,
}

/// Data-quality summary of a raw sheet.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub rows_read: usize,
    pub rows_usable: usize,
    pub bad_dates: usize,
    pub gaps: Vec<ColumnGaps>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub duplicate_dates: usize,
    pub tail: Vec<MetricRow>,
    pub ingest: IngestedRows,
}

/// Summarize raw records before and after normalization.
pub fn inspect_rows(records: Vec<(usize, RawMetricRow)>) -> Inspection {
    let bad_dates = records
        .iter()
        .filter(|(_, r)| r.date.as_deref().is_none_or(|d| parse_date(d).is_err()))
        .count();

    let columns: [(&'static str, fn(&RawMetricRow) -> Option<&str>); 5] = [
        ("gmv", |r| r.gmv.as_deref()),
        ("users", |r| r.users.as_deref()),
        ("marketing_cost", |r| r.marketing_cost.as_deref()),
        ("fe_pods", |r| r.fe_pods.as_deref()),
        ("be_pods", |r| r.be_pods.as_deref()),
    ];
    let gaps = columns
        .iter()
        .map(|(name, get)| ColumnGaps {
            name: *name,
            missing: records
                .iter()
                .filter(|(_, r)| get(r).and_then(parse_number).is_none())
                .count(),
        })
        .collect();

    let ingest = normalize_rows(records);
    let mut dates: Vec<NaiveDate> = ingest.rows.iter().map(|r| r.date).collect();
    dates.sort();
    let unique = {
        let mut d = dates.clone();
        d.dedup();
        d.len()
    };

    let mut sorted = ingest.rows.clone();
    sorted.sort_by_key(|r| r.date);
    let tail = sorted[sorted.len().saturating_sub(PREVIEW_ROWS)..].to_vec();

    Inspection {
        rows_read: ingest.rows_read,
        rows_usable: ingest.rows.len(),
        bad_dates,
        gaps,
        first_date: dates.first().copied(),
        last_date: dates.last().copied(),
        duplicate_dates: dates.len() - unique,
        tail,
        ingest,
    }
}
