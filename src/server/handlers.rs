//! Request handlers.
//!
//! The forecast itself is blocking work (sheet download + inference), so it
//! runs on tokio's blocking pool rather than on the async workers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::pipeline::run_online;
use crate::domain::{PodForecast, RawMetricRow};
use crate::error::{AppError, EXIT_INPUT, EXIT_MODEL};
use crate::io::ingest::raw_row_from_json;
use crate::postprocess::RandomPerturbation;
use crate::server::ServerState;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Prediction {
    pub date: NaiveDate,
    pub fe_pods: u32,
    pub be_pods: u32,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
}

impl From<&PodForecast> for Prediction {
    fn from(f: &PodForecast) -> Self {
        Self {
            date: f.date,
            fe_pods: f.fe_pods,
            be_pods: f.be_pods,
        }
    }
}

fn error_response(err: &AppError) -> Response {
    let status = if err.is_client_error() {
        warn!(error = %err, "rejected forecast request");
        StatusCode::BAD_REQUEST
    } else {
        error!(error = %err, "forecast request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorBody {
            error: err.message().to_string(),
        }),
    )
        .into_response()
}

/// GET /predict, GET /health
pub async fn health() -> impl IntoResponse {
    Json(StatusBody { status: "ok" })
}

/// POST /predict
pub async fn predict(State(state): State<ServerState>, body: Bytes) -> Response {
    let submitted = match parse_submission(&body) {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };
    info!(rows = submitted.len(), "forecast request");

    let outcome = tokio::task::spawn_blocking(move || {
        let history = state.history.load_history()?;
        let mut source = RandomPerturbation::from_seed(state.seed)?;
        run_online(submitted, history, &state.window, &state.predictor, &mut source)
    })
    .await;

    match outcome {
        Ok(Ok(forecasts)) => Json(PredictResponse {
            predictions: forecasts.iter().map(Prediction::from).collect(),
        })
        .into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => error_response(&AppError::new(EXIT_MODEL, format!("Forecast task failed: {e}"))),
    }
}

/// Pull `(position, record)` pairs out of a `{"rows": [...]}` body.
///
/// Entries that are not JSON objects become empty records and are dropped
/// during normalization like any other unusable row.
pub fn parse_submission(body: &[u8]) -> Result<Vec<(usize, RawMetricRow)>, AppError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid JSON body: {e}")))?;
    let rows = value
        .get("rows")
        .and_then(serde_json::Value::as_array)
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| AppError::new(EXIT_INPUT, "provide rows as list of objects"))?;
    Ok(rows
        .iter()
        .enumerate()
        .map(|(idx, v)| (idx + 1, raw_row_from_json(v).unwrap_or_default()))
        .collect())
}
