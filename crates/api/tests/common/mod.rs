#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use syncwatch_api::config::ServerConfig;
use syncwatch_api::engine::{RunNotifier, RunOrchestrator};
use syncwatch_api::router::build_app_router;
use syncwatch_api::state::AppState;
use syncwatch_api::ws::Hub;
use syncwatch_core::execution::shell::ShellExecutor;
use syncwatch_core::execution::{ExecutorSet, ExecutorSettings};
use syncwatch_core::messages::MessageType;
use syncwatch_core::run::Run;
use syncwatch_core::types::RunId;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        history_capacity: 100,
        test_base_url: "http://localhost:3000".to_string(),
        test_project_dir: None,
        run_timeout_secs: 60,
        kill_grace_secs: 2,
        client_queue_capacity: 16,
        ws_pong_wait_secs: 60,
    }
}

/// Executor settings with short limits for test scripts.
pub fn test_executor_settings() -> ExecutorSettings {
    ExecutorSettings {
        run_timeout: Duration::from_secs(30),
        kill_grace: Duration::from_secs(2),
        ..ExecutorSettings::default()
    }
}

/// Every framework runs the same bash `script`.
pub fn shell_executors(script: &str) -> ExecutorSet {
    ExecutorSet::uniform(Arc::new(ShellExecutor::new(
        script,
        Arc::new(test_executor_settings()),
    )))
}

/// Application state with a running hub and an orchestrator that reports
/// through it.
pub fn test_state(executors: ExecutorSet) -> AppState {
    let config = test_config();
    let connection_settings = config.connection_settings();
    let (hub, _hub_loop) = Hub::spawn(config.client_queue_capacity);
    let notifier: Arc<dyn RunNotifier> = Arc::new(hub.clone());
    let orchestrator = Arc::new(RunOrchestrator::new(
        executors,
        notifier,
        config.history_capacity,
    ));

    AppState {
        config: Arc::new(config),
        hub,
        orchestrator,
        connection_settings,
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the same builder as `main.rs` so integration tests exercise the
/// production middleware stack.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Orchestrator helpers
// ---------------------------------------------------------------------------

/// Notifier that records every notification in order.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(MessageType, serde_json::Value)>>,
}

impl RunNotifier for RecordingNotifier {
    fn notify(&self, message_type: MessageType, payload: serde_json::Value) {
        self.events.lock().unwrap().push((message_type, payload));
    }
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(MessageType, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }

    /// `status_update` statuses emitted for `run_id`, in order.
    pub fn statuses(&self, run_id: RunId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(t, p)| *t == MessageType::StatusUpdate && p["run_id"] == run_id.to_string())
            .filter_map(|(_, p)| p["status"].as_str().map(str::to_string))
            .collect()
    }

    /// Payloads of `message_type` emitted for `run_id`.
    pub fn payloads(&self, message_type: MessageType, run_id: RunId) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|(t, p)| *t == message_type && p["run_id"] == run_id.to_string())
            .map(|(_, p)| p)
            .collect()
    }
}

/// Orchestrator wired to a fresh [`RecordingNotifier`].
pub fn recording_orchestrator(
    executors: ExecutorSet,
    history_capacity: usize,
) -> (Arc<RunOrchestrator>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = Arc::new(RunOrchestrator::new(
        executors,
        Arc::clone(&notifier) as Arc<dyn RunNotifier>,
        history_capacity,
    ));
    (orchestrator, notifier)
}

/// Wait until `run_id` has been moved to history and return it.
pub async fn wait_for_history(orchestrator: &RunOrchestrator, run_id: RunId) -> Run {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        if let Some(run) = orchestrator
            .history(None)
            .await
            .into_iter()
            .find(|r| r.id == run_id)
        {
            return run;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run {run_id} did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until `path` exists.
pub async fn wait_for_file(path: &std::path::Path) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} was never created",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
