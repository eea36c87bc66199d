//! Metric row ingest and normalization.
//!
//! This module is responsible for turning loosely typed metric records (sheet
//! CSV cells, cleaned CSV tables, JSON request rows) into clean `MetricRow`s.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**: a clean row normalizes to itself
//! - **Separation of concerns**: no imputation or feature logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::debug;

use crate::domain::{MetricRow, RawMetricRow};
use crate::error::{AppError, EXIT_INPUT};

const REQUIRED_COLUMNS: [&str; 4] = ["date", "gmv", "users", "marketing_cost"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based source line (CSV) or 1-based position (JSON rows).
    pub line: usize,
    pub message: String,
}

/// Ingest output: normalized rows + row errors.
#[derive(Debug, Clone, Default)]
pub struct IngestedRows {
    pub rows: Vec<MetricRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedRows {
    pub fn rows_dropped(&self) -> usize {
        self.rows_read - self.rows.len()
    }
}

/// Normalize a single raw record.
///
/// Fails when the date or any of `gmv`, `users`, `marketing_cost` cannot be
/// resolved. Unparseable pod counts are treated as missing.
pub fn normalize_row(raw: &RawMetricRow) -> Result<MetricRow, String> {
    let date_text = raw.date.as_deref().ok_or_else(|| "Missing `date` value.".to_string())?;
    let date = parse_date(date_text)?;

    let gmv = required_number(raw.gmv.as_deref(), "gmv")?;
    let users = required_number(raw.users.as_deref(), "users")?;
    let marketing_cost = required_number(raw.marketing_cost.as_deref(), "marketing_cost")?;

    Ok(MetricRow {
        date,
        gmv,
        users,
        marketing_cost,
        fe_pods: raw.fe_pods.as_deref().and_then(parse_pods),
        be_pods: raw.be_pods.as_deref().and_then(parse_pods),
    })
}

/// Normalize a batch of `(line, raw)` records, dropping (and recording) bad rows.
pub fn normalize_rows<I>(records: I) -> IngestedRows
where
    I: IntoIterator<Item = (usize, RawMetricRow)>,
{
    let mut out = IngestedRows::default();
    for (line, raw) in records {
        out.rows_read += 1;
        match normalize_row(&raw) {
            Ok(row) => out.rows.push(row),
            Err(message) => {
                debug!(line, %message, "dropping metric row");
                out.row_errors.push(RowError { line, message });
            }
        }
    }
    out
}

/// Load and normalize a metrics CSV from disk.
pub fn load_metric_csv(path: &Path) -> Result<IngestedRows, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to open CSV '{}': {e}", path.display()),
        )
    })?;
    let records = read_raw_rows(file)?;
    Ok(normalize_rows(records))
}

/// Read raw `(line, record)` pairs from CSV text.
///
/// Only the header is validated here; cell contents are left untouched for
/// `normalize_row`. Records the CSV reader cannot decode are skipped.
pub fn read_raw_rows<R: Read>(source: R) -> Result<Vec<(usize, RawMetricRow)>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for name in REQUIRED_COLUMNS {
        if !header_map.contains_key(name) {
            return Err(AppError::new(
                EXIT_INPUT,
                format!("Missing required column: `{name}`"),
            ));
        }
    }

    let mut out = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Records start on the line after the header.
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(line, error = %e, "skipping undecodable CSV record");
                continue;
            }
        };
        out.push((
            line,
            RawMetricRow {
                date: get_cell(&record, &header_map, "date"),
                gmv: get_cell(&record, &header_map, "gmv"),
                users: get_cell(&record, &header_map, "users"),
                marketing_cost: get_cell(&record, &header_map, "marketing_cost"),
                fe_pods: get_cell(&record, &header_map, "fe_pods"),
                be_pods: get_cell(&record, &header_map, "be_pods"),
            },
        ));
    }
    Ok(out)
}

/// Convert one JSON request row into a raw record.
///
/// Strings are taken verbatim, numbers are rendered to text, `null` counts as
/// absent. Returns `None` when the value is not an object.
pub fn raw_row_from_json(value: &serde_json::Value) -> Option<RawMetricRow> {
    let object = value.as_object()?;
    let field = |name: &str| -> Option<String> {
        match object.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    };
    Some(RawMetricRow {
        date: field("date"),
        gmv: field("gmv"),
        users: field("users"),
        marketing_cost: field("marketing_cost"),
        fe_pods: field("fe_pods"),
        be_pods: field("be_pods"),
    })
}

/// Parse a calendar date, preferring day-before-month for ambiguous input.
///
/// Accepted shapes (after trimming whitespace and quotes):
/// - `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD` (an optional time part, after a
///   space or `T`, is ignored)
/// - `DD/MM/YYYY`, `DD-MM-YYYY`, `DD.MM.YYYY` and the same with a 2-digit year
/// - `DD Mon YYYY` / `DD Month YYYY`
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const YEAR_FIRST: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
    const DAY_FIRST: [&str; 3] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
    const DAY_FIRST_SHORT: [&str; 3] = ["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];
    const NAMED_MONTH: [&str; 2] = ["%d %b %Y", "%d %B %Y"];

    let cleaned = strip_quotes(s);
    let invalid = || format!("Invalid date '{}'.", s.trim());

    for fmt in NAMED_MONTH {
        if let Ok(d) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Ok(d);
        }
    }

    // A time part follows either whitespace or an ISO `T`.
    let date_part = cleaned
        .split_whitespace()
        .next()
        .and_then(|token| token.split('T').next())
        .filter(|token| !token.is_empty())
        .ok_or_else(invalid)?;
    let mut tokens = date_part.split(['-', '/', '.']);
    let first_len = tokens.next().map_or(0, str::len);
    let last_len = tokens.last().map_or(0, str::len);

    let candidates: &[&str] = if first_len == 4 {
        &YEAR_FIRST
    } else if last_len == 2 {
        &DAY_FIRST_SHORT
    } else {
        &DAY_FIRST
    };

    candidates
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .ok_or_else(invalid)
}

/// Coerce a numeric cell, stripping thousands separators and quotes.
///
/// Returns `None` for empty, unparseable, or non-finite input.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '\'' | '"'))
        .collect();
    let v = cleaned.trim().parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

fn parse_pods(s: &str) -> Option<u32> {
    let v = parse_number(s)?;
    if v < 1.0 {
        return None;
    }
    Some(v.trunc().min(u32::MAX as f64) as u32)
}

fn required_number(s: Option<&str>, name: &str) -> Result<f64, String> {
    let s = s.ok_or_else(|| format!("Missing `{name}` value."))?;
    parse_number(s).ok_or_else(|| format!("Missing/invalid `{name}` value '{}'.", s.trim()))
}

fn strip_quotes(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Sheet exports sometimes carry a BOM on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_cell(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<String> {
    let idx = header_map.get(name)?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(date: &str, gmv: &str, users: &str, marketing: &str) -> RawMetricRow {
        RawMetricRow {
            date: Some(date.to_string()),
            gmv: Some(gmv.to_string()),
            users: Some(users.to_string()),
            marketing_cost: Some(marketing.to_string()),
            fe_pods: None,
            be_pods: None,
        }
    }

    #[test]
    fn dates_prefer_day_first() {
        assert_eq!(parse_date("11/12/2024").unwrap(), date(2024, 12, 11));
        assert_eq!(parse_date("01-07-2024").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("01.07.24").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("2024-07-01").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("2024-07-01 00:00:00").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("2024-07-01T00:00:00").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("2024-07-01T13:45:00Z").unwrap(), date(2024, 7, 1));
        assert_eq!(parse_date("05 Jul 2024").unwrap(), date(2024, 7, 5));
    }

    #[test]
    fn dates_strip_whitespace_and_quotes() {
        assert_eq!(parse_date("  '11/12/2024' ").unwrap(), date(2024, 12, 11));
        assert_eq!(parse_date("\"2024-01-31\"").unwrap(), date(2024, 1, 31));
    }

    #[test]
    fn bad_dates_are_rejected() {
        assert!(parse_date("").is_err());
        assert!(parse_date("not a date").is_err());
        assert!(parse_date("31/02/2024").is_err());
        assert!(parse_date("13/13/2024").is_err());
    }

    #[test]
    fn numbers_drop_thousands_separators() {
        assert_eq!(parse_number("1,000,000"), Some(1_000_000.0));
        assert_eq!(parse_number(" 2,100,000.50 "), Some(2_100_000.5));
        assert_eq!(parse_number("'3800'"), Some(3800.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn row_with_bad_required_field_is_dropped() {
        let rows = vec![
            (2, raw("01/07/2024", "1,000", "50", "10")),
            (3, raw("garbage", "1,000", "50", "10")),
            (4, raw("02/07/2024", "n/a", "50", "10")),
            (
                5,
                RawMetricRow {
                    users: None,
                    ..raw("03/07/2024", "1", "1", "1")
                },
            ),
        ];
        let out = normalize_rows(rows);
        assert_eq!(out.rows_read, 4);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows_dropped(), 3);
        let lines: Vec<usize> = out.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn bad_pod_counts_become_missing() {
        let mut r = raw("01/07/2024", "1", "1", "1");
        r.fe_pods = Some("x".to_string());
        r.be_pods = Some("4.0".to_string());
        let row = normalize_row(&r).unwrap();
        assert_eq!(row.fe_pods, None);
        assert_eq!(row.be_pods, Some(4));

        r.fe_pods = Some("0".to_string());
        assert_eq!(normalize_row(&r).unwrap().fe_pods, None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut r = raw("11/12/2024", "1,234,567.89", "45,000", "9,999.5");
        r.fe_pods = Some("12".to_string());
        let once = normalize_row(&r).unwrap();
        let twice = normalize_row(&RawMetricRow::from(&once)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn csv_rows_keep_line_numbers() {
        let text = "\u{feff}Date,GMV,users,marketing_cost,fe_pods,be_pods\n\
                    01/06/2024,\"2,100,000\",3800,100,,\n\
                    bad,1,1,1,,\n\
                    03/06/2024,1,1,1,2,3\n";
        let records = read_raw_rows(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].0, 2);
        assert_eq!(records[0].1.gmv.as_deref(), Some("2,100,000"));
        assert_eq!(records[0].1.fe_pods, None);

        let out = normalize_rows(records);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.row_errors[0].line, 3);
        assert_eq!(out.rows[1].fe_pods, Some(2));
        assert_eq!(out.rows[1].be_pods, Some(3));
    }

    #[test]
    fn csv_without_required_column_fails() {
        let text = "date,gmv,users\n01/06/2024,1,1\n";
        let err = read_raw_rows(text.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("marketing_cost"));
    }

    #[test]
    fn json_rows_accept_strings_and_numbers() {
        let value = serde_json::json!({
            "date": "2024-07-01",
            "gmv": 1000000,
            "users": "50,000",
            "marketing_cost": 10000.5,
            "fe_pods": null
        });
        let raw = raw_row_from_json(&value).unwrap();
        assert_eq!(raw.gmv.as_deref(), Some("1000000"));
        assert_eq!(raw.fe_pods, None);

        let row = normalize_row(&raw).unwrap();
        assert_eq!(row.date, date(2024, 7, 1));
        assert_eq!(row.users, 50_000.0);
        assert_eq!(row.marketing_cost, 10_000.5);

        assert!(raw_row_from_json(&serde_json::json!([1, 2])).is_none());
    }
}
