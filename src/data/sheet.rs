//! Published metrics sheet integration.
//!
//! The business metrics live in a spreadsheet published as CSV. Each fetch
//! downloads the whole sheet, normalizes it, and imputes pod counts for the
//! rows that predate pod tracking.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::data::impute::impute_history;
use crate::domain::{MetricRow, RawMetricRow};
use crate::error::{AppError, EXIT_UPSTREAM};
use crate::io::ingest::{IngestedRows, normalize_rows, read_raw_rows};

pub const DEFAULT_SHEET_CSV_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vSKsxrQBqPOQdF_KOsD3ub81wynRnXX6Pw0BxRsDikzXZgEQOoEsTS0ILD7xnNNeBTOKd7xFCFmtsqM/pub?output=csv";

/// Anything that can hand the pipeline its historical rows.
///
/// The server calls this once per request; implementations must be safe to
/// share across worker threads.
pub trait HistorySource: Send + Sync {
    fn load_history(&self) -> Result<Vec<MetricRow>, AppError>;
}

pub struct SheetClient {
    url: String,
    cutoff: NaiveDate,
}

impl SheetClient {
    pub fn new(url: impl Into<String>, cutoff: NaiveDate) -> Self {
        Self {
            url: url.into(),
            cutoff,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the sheet and return its raw `(line, record)` pairs.
    pub fn fetch_raw(&self) -> Result<Vec<(usize, RawMetricRow)>, AppError> {
        let resp = Client::new()
            .get(&self.url)
            .send()
            .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Sheet request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                EXIT_UPSTREAM,
                format!("Sheet request failed with status {}.", resp.status()),
            ));
        }

        let body = resp
            .text()
            .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to read sheet body: {e}")))?;

        let records = parse_sheet_body(&body)?;
        debug!(url = %self.url, records = records.len(), "sheet fetched");
        Ok(records)
    }

    /// Download, normalize and impute the sheet.
    pub fn fetch_cleaned(&self) -> Result<IngestedRows, AppError> {
        let mut ingest = normalize_rows(self.fetch_raw()?);
        let filled = impute_history(&mut ingest.rows, self.cutoff);
        info!(
            rows_read = ingest.rows_read,
            rows_used = ingest.rows.len(),
            pods_imputed = filled,
            "sheet cleaned"
        );
        Ok(ingest)
    }
}

/// Read a downloaded sheet body.
///
/// A body without the metrics header (login page, renamed column) is the
/// sheet's fault, not the caller's, so it surfaces as an upstream error.
pub fn parse_sheet_body(body: &str) -> Result<Vec<(usize, RawMetricRow)>, AppError> {
    read_raw_rows(body.as_bytes()).map_err(|e| {
        AppError::new(
            EXIT_UPSTREAM,
            format!("Sheet is not a metrics table: {}", e.message()),
        )
    })
}

impl HistorySource for SheetClient {
    fn load_history(&self) -> Result<Vec<MetricRow>, AppError> {
        Ok(self.fetch_cleaned()?.rows)
    }
}

/// History served from rows already in memory (e.g. a cleaned CSV on disk).
pub struct StaticHistory {
    rows: Vec<MetricRow>,
}

impl StaticHistory {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }
}

impl HistorySource for StaticHistory {
    fn load_history(&self) -> Result<Vec<MetricRow>, AppError> {
        Ok(self.rows.clone())
    }
}
