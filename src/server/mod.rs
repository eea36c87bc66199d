//! HTTP forecast service.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/predict` | Health check |
//! | POST | `/predict` | Forecast a submitted budget plan |
//! | GET | `/health` | Health check |
//!
//! Models are loaded once before the server starts and shared read-only by
//! every request. History is pulled from the configured [`HistorySource`] on
//! each request.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::{info, warn};

use crate::data::HistorySource;
use crate::domain::ForecastWindow;
use crate::error::{AppError, EXIT_UPSTREAM};
use crate::models::PodPredictor;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct ServerState {
    pub predictor: PodPredictor,
    pub history: Arc<dyn HistorySource>,
    pub window: ForecastWindow,
    /// Fixed perturbation seed for every request (random per request when absent).
    pub seed: Option<u64>,
}

/// Build the service router.
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/predict", get(handlers::health).post(handlers::predict))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Bind `0.0.0.0:<port>` and serve until Ctrl-C.
pub async fn serve(state: ServerState, port: u16) -> Result<(), AppError> {
    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "forecast server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::new(EXIT_UPSTREAM, format!("Server error: {e}")))?;

    info!("forecast server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
