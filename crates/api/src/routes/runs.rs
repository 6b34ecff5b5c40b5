//! Route definitions for the `/runs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /                -> list_runs
/// POST   /                -> submit_run
/// GET    /{id}            -> get_run_results
/// POST   /{id}/cancel     -> cancel_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(runs::list_runs).post(runs::submit_run))
        .route("/{id}", get(runs::get_run_results))
        .route("/{id}/cancel", post(runs::cancel_run))
}
