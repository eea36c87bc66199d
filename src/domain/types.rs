//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - built from CSV cells or JSON payloads
//! - carried through the timeline/feature pipeline
//! - exported to CSV tables and HTTP responses

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, EXIT_INPUT};

/// Which side of the forecast boundary a timeline row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Recorded (or imputed) history before the budget window.
    Observed,
    /// Planned values inside the budget window.
    Budget,
}

/// A raw metrics record before normalization.
///
/// Every field is the untouched cell text (CSV) or the rendered JSON value.
/// `None` means the column/key was absent altogether.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetricRow {
    pub date: Option<String>,
    pub gmv: Option<String>,
    pub users: Option<String>,
    pub marketing_cost: Option<String>,
    pub fe_pods: Option<String>,
    pub be_pods: Option<String>,
}

/// One calendar day of business activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub gmv: f64,
    pub users: f64,
    pub marketing_cost: f64,
    /// Frontend pods actually running that day (history only).
    pub fe_pods: Option<u32>,
    /// Backend pods actually running that day (history only).
    pub be_pods: Option<u32>,
}

impl MetricRow {
    pub fn new(date: NaiveDate, gmv: f64, users: f64, marketing_cost: f64) -> Self {
        Self {
            date,
            gmv,
            users,
            marketing_cost,
            fe_pods: None,
            be_pods: None,
        }
    }

    pub fn has_pods(&self) -> bool {
        self.fe_pods.is_some() && self.be_pods.is_some()
    }
}

impl From<&MetricRow> for RawMetricRow {
    fn from(row: &MetricRow) -> Self {
        Self {
            date: Some(row.date.format("%Y-%m-%d").to_string()),
            gmv: Some(row.gmv.to_string()),
            users: Some(row.users.to_string()),
            marketing_cost: Some(row.marketing_cost.to_string()),
            fe_pods: row.fe_pods.map(|v| v.to_string()),
            be_pods: row.be_pods.map(|v| v.to_string()),
        }
    }
}

/// Which model family `pods train` fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Bootstrap-aggregated regression trees.
    Forest,
    /// Least squares on standardized features.
    Linear,
}

/// A metrics row placed on the merged timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub row: MetricRow,
    pub origin: Origin,
}

/// Chronologically ordered history + budget rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub rows: Vec<TimelineRow>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn budget_len(&self) -> usize {
        self.rows.iter().filter(|r| r.origin == Origin::Budget).count()
    }
}

/// Final per-day capacity forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodForecast {
    pub date: NaiveDate,
    pub gmv: f64,
    pub users: f64,
    pub marketing_cost: f64,
    pub fe_pods: u32,
    pub be_pods: u32,
}

/// Inclusive calendar range the forecast is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ForecastWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AppError> {
        if end < start {
            return Err(AppError::new(
                EXIT_INPUT,
                format!("Invalid forecast window: end {end} is before start {start}."),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days in the window (both ends included).
    pub fn day_count(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// Every calendar day of the window, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.day_count() as u64).filter_map(move |offset| self.start.checked_add_days(Days::new(offset)))
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, `.env` and environment overrides.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub window: ForecastWindow,
    /// Rows dated strictly before this day get pod counts imputed when missing.
    pub history_cutoff: NaiveDate,
    pub sheet_url: String,
    pub fe_model: PathBuf,
    pub be_model: PathBuf,
    /// Seed for the backend perturbation draw (random when absent).
    pub seed: Option<u64>,
}
