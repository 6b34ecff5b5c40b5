//! Handlers for the `/runs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use syncwatch_core::run::{RunStatus, SubmitRun};
use syncwatch_core::types::RunId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /runs`.
#[derive(Debug, Default, Deserialize)]
pub struct RunListQuery {
    /// Most recent N finished runs (N >= 1); all retained runs when absent.
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/runs
///
/// Submit a test run. Returns 202 as soon as the run is queued; progress is
/// reported over the WebSocket feed.
pub async fn submit_run(
    State(state): State<AppState>,
    Json(input): Json<SubmitRun>,
) -> AppResult<impl IntoResponse> {
    let submitted = state.orchestrator.submit(input).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: submitted })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/runs
///
/// Finished runs, most recent last.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<RunListQuery>,
) -> AppResult<impl IntoResponse> {
    if params.limit == Some(0) {
        return Err(AppError::BadRequest("limit must be at least 1".to_string()));
    }
    let runs = state.orchestrator.history(params.limit).await;
    Ok(Json(DataResponse { data: runs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/runs/{id}
///
/// Results of a live or finished run.
pub async fn get_run_results(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> AppResult<impl IntoResponse> {
    let results = state.orchestrator.get_result(run_id).await?;
    Ok(Json(DataResponse { data: results }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/runs/{id}/cancel
///
/// Cancel a live run. Finished runs are no longer cancellable and yield 404.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<RunId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.cancel(run_id).await?;
    Ok(Json(DataResponse {
        data: json!({
            "run_id": run_id,
            "status": RunStatus::Cancelled,
        }),
    }))
}
