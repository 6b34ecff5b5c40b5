use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::RunOrchestrator;
use crate::ws::{ConnectionSettings, Hub};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Handle to the notification hub (browser clients).
    pub hub: Hub,
    /// Owner of live and finished test runs.
    pub orchestrator: Arc<RunOrchestrator>,
    /// Keep-alive timing and size limits for WebSocket clients.
    pub connection_settings: ConnectionSettings,
}
