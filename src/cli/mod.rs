//! Command-line parsing for the pod capacity forecaster.
//!
//! The goal of this module is to keep **argument parsing** separate from
//! command dispatch and from the pipeline code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::ModelKind;

pub const DEFAULT_CLEANED_CSV: &str = "cleaned_google_sheet.csv";
pub const DEFAULT_FORECAST_CSV: &str = "predicted_budget_pods.csv";
pub const DEFAULT_FE_MODEL: &str = "fe_model.json";
pub const DEFAULT_BE_MODEL: &str = "be_model.json";
pub const DEFAULT_SUBMIT_URL: &str = "http://127.0.0.1:8080/predict";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pods", version, about = "Daily frontend/backend pod capacity forecaster")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the metrics sheet, normalize it, impute early pod counts and write the cleaned table.
    Fetch(FetchArgs),
    /// Forecast the budget window from a cleaned table and write the forecast CSV.
    Predict(PredictArgs),
    /// Run the HTTP forecast service.
    Serve(ServeArgs),
    /// Fit baseline linear models from a cleaned table and write model artifacts.
    Train(TrainArgs),
    /// Send the sheet's budget-window rows to a running server and print the response.
    Submit(SubmitArgs),
    /// Print a data-quality summary of the raw sheet.
    Inspect(InspectArgs),
}

/// Options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// First day of the budget window.
    #[arg(long, default_value = "2024-07-01")]
    pub start: NaiveDate,

    /// Last day of the budget window (inclusive).
    #[arg(long, default_value = "2024-12-31")]
    pub end: NaiveDate,

    /// Rows before this day get missing pod counts imputed.
    #[arg(long, default_value = "2024-06-01")]
    pub cutoff: NaiveDate,

    /// Published sheet CSV URL (overrides POD_SHEET_URL).
    #[arg(long)]
    pub sheet_url: Option<String>,

    /// Frontend model artifact (overrides POD_FE_MODEL).
    #[arg(long, value_name = "JSON")]
    pub fe_model: Option<PathBuf>,

    /// Backend model artifact (overrides POD_BE_MODEL).
    #[arg(long, value_name = "JSON")]
    pub be_model: Option<PathBuf>,

    /// Seed for the backend perturbation (random when omitted).
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub common: ForecastArgs,

    /// Where to write the cleaned table.
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    #[command(flatten)]
    pub common: ForecastArgs,

    /// Cleaned table holding both history and the budget plan.
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub input: PathBuf,

    /// Where to write the forecast.
    #[arg(long, default_value = DEFAULT_FORECAST_CSV)]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: ForecastArgs,

    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Serve history from a cleaned table instead of fetching the sheet per request.
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    #[command(flatten)]
    pub common: ForecastArgs,

    /// Cleaned table to train on.
    #[arg(long, default_value = DEFAULT_CLEANED_CSV)]
    pub input: PathBuf,

    /// Model family to fit.
    #[arg(long, value_enum, default_value_t = ModelKind::Forest)]
    pub kind: ModelKind,

    /// Number of trees per forest.
    #[arg(long, default_value_t = 500)]
    pub trees: usize,

    /// Maximum tree depth (unlimited when omitted).
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Minimum rows per leaf.
    #[arg(long, default_value_t = 1)]
    pub min_samples_leaf: usize,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub common: ForecastArgs,

    /// Forecast endpoint.
    #[arg(long, default_value = DEFAULT_SUBMIT_URL)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub common: ForecastArgs,
}
