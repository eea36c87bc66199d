//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized

use crate::domain::{MetricRow, PodForecast};
use crate::fit::TrainedModels;
use crate::io::ingest::IngestedRows;
use crate::report::Inspection;

/// Max row errors listed in an ingest summary.
const MAX_LISTED_ERRORS: usize = 10;

/// Format the forecast as a fixed-width table.
pub fn format_forecast_table(forecasts: &[PodForecast]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<10} {:>16} {:>12} {:>14} {:>7} {:>7}",
            "date", "gmv", "users", "marketing_cost", "fe_pods", "be_pods"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<10} {:-<16} {:-<12} {:-<14} {:-<7} {:-<7}\n",
        "", "", "", "", "", ""
    ));

    for f in forecasts {
        out.push_str(&format!(
            "{:<10} {:>16.2} {:>12.0} {:>14.2} {:>7} {:>7}\n",
            f.date, f.gmv, f.users, f.marketing_cost, f.fe_pods, f.be_pods
        ));
    }

    if let (Some(first), Some(last)) = (forecasts.first(), forecasts.last()) {
        let peak_fe = forecasts.iter().map(|f| f.fe_pods).max().unwrap_or(0);
        let peak_be = forecasts.iter().map(|f| f.be_pods).max().unwrap_or(0);
        out.push_str(&format!(
            "\n{} days ({} .. {}) | peak fe_pods={peak_fe} be_pods={peak_be}\n",
            forecasts.len(),
            first.date,
            last.date
        ));
    }
    out
}

/// Short summary of a CSV/sheet ingest.
pub fn format_ingest_summary(source: &str, ingest: &IngestedRows) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Source: {source}\nRows: read={} usable={} dropped={}\n",
        ingest.rows_read,
        ingest.rows.len(),
        ingest.rows_dropped()
    ));
    for err in ingest.row_errors.iter().take(MAX_LISTED_ERRORS) {
        out.push_str(&format!("  line {}: {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > MAX_LISTED_ERRORS {
        out.push_str(&format!(
            "  ... {} more\n",
            ingest.row_errors.len() - MAX_LISTED_ERRORS
        ));
    }
    out
}

/// Full data-quality report for `pods inspect`.
pub fn format_inspection(source: &str, report: &Inspection) -> String {
    let mut out = String::new();
    out.push_str("=== pods - sheet inspection ===\n");
    out.push_str(&format_ingest_summary(source, &report.ingest));

    match (report.first_date, report.last_date) {
        (Some(first), Some(last)) => out.push_str(&format!("Dates: {first} .. {last}\n")),
        _ => out.push_str("Dates: (none)\n"),
    }
    out.push_str(&format!(
        "Unparseable dates: {} | duplicate dates: {}\n",
        report.bad_dates, report.duplicate_dates
    ));

    out.push_str("\nMissing values:\n");
    for gap in &report.gaps {
        out.push_str(&format!("  {:<16} {:>6}\n", gap.name, gap.missing));
    }

    out.push_str("\nLatest rows:\n");
    out.push_str(&format_metric_rows(&report.tail));
    out
}

/// Summary printed after `pods train`.
pub fn format_training_summary(trained: &TrainedModels, fe_path: &str, be_path: &str) -> String {
    format!(
        "Trained {:?} models on {} rows.\n  fe_pods -> {fe_path} (rmse {:.3})\n  be_pods -> {be_path} (rmse {:.3})\n",
        trained.kind, trained.training_rows, trained.frontend_rmse, trained.backend_rmse
    )
}

fn format_metric_rows(rows: &[MetricRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:<10} {:>16} {:>12} {:>14} {:>7} {:>7}\n",
        "date", "gmv", "users", "marketing_cost", "fe_pods", "be_pods"
    ));
    for r in rows {
        out.push_str(&format!(
            "  {:<10} {:>16.2} {:>12.0} {:>14.2} {:>7} {:>7}\n",
            r.date,
            r.gmv,
            r.users,
            r.marketing_cost,
            fmt_pods(r.fe_pods),
            fmt_pods(r.be_pods)
        ));
    }
    out
}

fn fmt_pods(v: Option<u32>) -> String {
    v.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}
