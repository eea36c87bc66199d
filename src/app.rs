//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves configuration (flags, `.env`, environment)
//! - runs the requested command
//! - prints reports and writes outputs

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::info;

use crate::cli::{
    Cli, Command, DEFAULT_BE_MODEL, DEFAULT_FE_MODEL, FetchArgs, ForecastArgs, InspectArgs, PredictArgs,
    ServeArgs, SubmitArgs, TrainArgs,
};
use crate::data::{DEFAULT_SHEET_CSV_URL, HistorySource, SheetClient, StaticHistory};
use crate::domain::{ForecastConfig, ForecastWindow, MetricRow};
use crate::error::{AppError, EXIT_UPSTREAM};
use crate::fit::{ForestParams, TrainOptions};
use crate::io::export::{write_forecast_csv, write_metric_csv};
use crate::io::ingest::load_metric_csv;
use crate::io::model_file::write_model_artifact;
use crate::models::PodPredictor;
use crate::postprocess::RandomPerturbation;
use crate::server::ServerState;
use crate::timeline::history_before;

pub mod pipeline;

/// Entry point for the `pods` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Fetch(args) => handle_fetch(args),
        Command::Predict(args) => handle_predict(args),
        Command::Serve(args) => handle_serve(args),
        Command::Train(args) => handle_train(args),
        Command::Submit(args) => handle_submit(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_fetch(args: FetchArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let sheet = SheetClient::new(&config.sheet_url, config.history_cutoff);
    let ingest = sheet.fetch_cleaned()?;

    write_metric_csv(&args.out, &ingest.rows)?;
    print!("{}", crate::report::format_ingest_summary(sheet.url(), &ingest));
    println!("Cleaned table written to {}", args.out.display());
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let ingest = load_metric_csv(&args.input)?;
    print!(
        "{}",
        crate::report::format_ingest_summary(&args.input.display().to_string(), &ingest)
    );

    let predictor = PodPredictor::load(&config)?;
    let mut source = RandomPerturbation::from_seed(config.seed)?;
    let forecasts = pipeline::run_batch(ingest.rows, &config.window, &predictor, &mut source)?;

    println!("{}", crate::report::format_forecast_table(&forecasts));
    write_forecast_csv(&args.out, &forecasts)?;
    println!("Forecast written to {}", args.out.display());
    Ok(())
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let predictor = PodPredictor::load(&config)?;

    let history: Arc<dyn HistorySource> = match &args.history {
        Some(path) => {
            let ingest = load_metric_csv(path)?;
            info!(path = %path.display(), rows = ingest.rows.len(), "serving history from table");
            Arc::new(StaticHistory::new(ingest.rows))
        }
        None => {
            info!(url = %config.sheet_url, "serving history from sheet");
            Arc::new(SheetClient::new(&config.sheet_url, config.history_cutoff))
        }
    };

    let state = ServerState {
        predictor,
        history,
        window: config.window,
        seed: config.seed,
    };

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(state, args.port))
}

fn handle_train(args: TrainArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let ingest = load_metric_csv(&args.input)?;
    let history = history_before(ingest.rows, config.window.start, true);

    let trained = crate::fit::train_models(&history, &train_options_from_args(&args))?;
    write_model_artifact(&config.fe_model, &trained.frontend)?;
    write_model_artifact(&config.be_model, &trained.backend)?;

    print!(
        "{}",
        crate::report::format_training_summary(
            &trained,
            &config.fe_model.display().to_string(),
            &config.be_model.display().to_string(),
        )
    );
    Ok(())
}

fn handle_submit(args: SubmitArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let sheet = SheetClient::new(&config.sheet_url, config.history_cutoff);
    let ingest = sheet.fetch_cleaned()?;
    let body = submission_body(&ingest.rows, &config.window);
    info!(url = %args.url, "submitting budget rows");

    let resp = Client::new()
        .post(&args.url)
        .json(&body)
        .send()
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Request to '{}' failed: {e}", args.url)))?;
    let status = resp.status();
    let text = resp
        .text()
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to read response body: {e}")))?;

    if !status.is_success() {
        return Err(AppError::new(
            EXIT_UPSTREAM,
            format!("Server responded with {status}: {text}"),
        ));
    }

    let pretty = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or(text);
    println!("{pretty}");
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.common)?;
    let sheet = SheetClient::new(&config.sheet_url, config.history_cutoff);
    let report = crate::report::inspect_rows(sheet.fetch_raw()?);
    print!("{}", crate::report::format_inspection(sheet.url(), &report));
    Ok(())
}

/// Trainer settings; the forest seed follows `--seed`, defaulting to 42.
pub fn train_options_from_args(args: &TrainArgs) -> TrainOptions {
    let defaults = ForestParams::default();
    TrainOptions {
        kind: args.kind,
        forest: ForestParams {
            n_trees: args.trees,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            seed: args.common.seed.unwrap_or(defaults.seed),
        },
    }
}

/// Resolve a `ForecastConfig`: explicit flags win over environment
/// (`POD_SHEET_URL`, `POD_FE_MODEL`, `POD_BE_MODEL`, `.env` included), which
/// win over built-in defaults.
pub fn forecast_config_from_args(args: &ForecastArgs) -> Result<ForecastConfig, AppError> {
    dotenvy::dotenv().ok();
    let window = ForecastWindow::new(args.start, args.end)?;

    Ok(ForecastConfig {
        window,
        history_cutoff: args.cutoff,
        sheet_url: args
            .sheet_url
            .clone()
            .or_else(|| env_value("POD_SHEET_URL"))
            .unwrap_or_else(|| DEFAULT_SHEET_CSV_URL.to_string()),
        fe_model: args
            .fe_model
            .clone()
            .or_else(|| env_value("POD_FE_MODEL").map(Into::into))
            .unwrap_or_else(|| Path::new(DEFAULT_FE_MODEL).to_path_buf()),
        be_model: args
            .be_model
            .clone()
            .or_else(|| env_value("POD_BE_MODEL").map(Into::into))
            .unwrap_or_else(|| Path::new(DEFAULT_BE_MODEL).to_path_buf()),
        seed: args.seed,
    })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Request body for `POST /predict`: the plan rows that fall in the window.
pub fn submission_body(rows: &[MetricRow], window: &ForecastWindow) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = rows
        .iter()
        .filter(|r| window.contains(r.date))
        .map(|r| {
            json!({
                "date": r.date.format("%Y-%m-%d").to_string(),
                "gmv": r.gmv,
                "users": r.users,
                "marketing_cost": r.marketing_cost,
            })
        })
        .collect();
    json!({ "rows": rows })
}
