use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncwatch_api::config::ServerConfig;
use syncwatch_api::engine::{RunNotifier, RunOrchestrator};
use syncwatch_api::router::build_app_router;
use syncwatch_api::state::AppState;
use syncwatch_api::ws::Hub;
use syncwatch_core::execution::ExecutorSet;

/// How long shutdown waits for cancelled runs to reach history.
const RUN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "syncwatch_api=debug,syncwatch_core=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Notification hub ---
    let (hub, hub_handle) = Hub::spawn(config.client_queue_capacity);
    tracing::info!(queue_capacity = config.client_queue_capacity, "Notification hub started");

    // --- Orchestrator ---
    let executors = ExecutorSet::new(config.executor_settings());
    let notifier: Arc<dyn RunNotifier> = Arc::new(hub.clone());
    let orchestrator = Arc::new(RunOrchestrator::new(
        executors,
        notifier,
        config.history_capacity,
    ));
    tracing::info!(
        history_capacity = config.history_capacity,
        base_url = %config.test_base_url,
        "Run orchestrator ready",
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        hub: hub.clone(),
        orchestrator: Arc::clone(&orchestrator),
        connection_settings: config.connection_settings(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let cancelled = orchestrator.cancel_all().await;
    tracing::info!(cancelled, "Cancelled live runs");
    if !orchestrator.wait_idle(RUN_DRAIN_TIMEOUT).await {
        tracing::warn!(
            remaining = orchestrator.active_runs().await,
            "Runs still live after drain timeout",
        );
    }

    hub.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), hub_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). Once a signal
/// arrives the hub is stopped so open WebSocket connections receive a close
/// frame and the server can drain.
async fn shutdown_signal(hub: Hub) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }

    let clients = hub.connected_clients().await;
    tracing::info!(clients, "Closing WebSocket connections");
    hub.shutdown();
}
