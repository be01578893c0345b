//! Health check endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

/// Start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/live", get(liveness_check))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Configured directories, in run order.
    pub directories: Vec<String>,
    pub run_in_progress: bool,
}

/// Health check endpoint. Does not contact collaborators.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        directories: state
            .reconciler
            .directory_names()
            .into_iter()
            .map(String::from)
            .collect(),
        run_in_progress: state.run_in_progress(),
    })
}

/// Liveness probe.
async fn liveness_check() -> &'static str {
    "OK"
}
