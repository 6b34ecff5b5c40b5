pub mod health;
pub mod runs;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// JSON routes under `/api/v1`.
///
/// ```text
/// /runs                    list, submit
/// /runs/{id}               results
/// /runs/{id}/cancel        cancel
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/runs", runs::router())
}

/// The long-lived WebSocket feed.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/api/v1/ws", get(ws::ws_handler))
}
