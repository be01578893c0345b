//! Reconciliation trigger and run status.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rk_core::{Report, RunStatus};
use rk_observability::RunTally;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::Operator;
use crate::error::ApiError;
use crate::state::AppState;

/// Creates reconciliation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reconcile", post(trigger_reconcile))
        .route("/status", get(run_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileParams {
    pub dry_run: Option<String>,
}

/// Parses a boolean query value. Accepts `1`, `t`, `true` and `0`, `f`,
/// `false` in any case.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

/// Runs one reconciliation and returns its report.
///
/// `dry_run` defaults to `true`. The status is 200 for a clean run and
/// 207 for a degraded one.
async fn trigger_reconcile(
    State(state): State<AppState>,
    Operator(operator): Operator,
    Query(params): Query<ReconcileParams>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let simulate = match params.dry_run.as_deref() {
        None => true,
        Some(raw) => parse_flag(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Invalid dry_run value '{}'", raw))
        })?,
    };

    let _guard = state.run_lock.try_lock().map_err(|_| {
        warn!(%operator, "Rejected reconcile trigger, a run is already in progress");
        ApiError::Conflict("A reconciliation run is already in progress".to_string())
    })?;

    info!(%operator, simulate, "Reconciliation triggered over HTTP");
    let report = state.reconciler.run(simulate, &operator).await?;

    let status = match report.status {
        RunStatus::Clean => StatusCode::OK,
        RunStatus::Degraded => StatusCode::MULTI_STATUS,
    };
    Ok((status, Json(report)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub tally: RunTally,
    pub run_in_progress: bool,
    pub directories: Vec<String>,
}

/// Run tally since process start.
async fn run_status(State(state): State<AppState>, _operator: Operator) -> Json<StatusResponse> {
    Json(StatusResponse {
        tally: state.reconciler.metrics().tally(),
        run_in_progress: state.run_in_progress(),
        directories: state
            .reconciler
            .directory_names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("yes"), None);
        assert_eq!(parse_flag(""), None);
    }
}
