use std::time::Duration;

use syncwatch_core::execution::{ExecutorSettings, DEFAULT_PROGRAM};

use crate::ws::ConnectionSettings;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Number of finished runs kept in memory (default: `100`).
    pub history_capacity: usize,
    /// Base URL of the system under test (default: `http://localhost:3000`).
    pub test_base_url: String,
    /// Working directory for test processes (default: current directory).
    pub test_project_dir: Option<String>,
    /// Wall-clock limit per run in seconds (default: `1800`).
    pub run_timeout_secs: u64,
    /// Seconds between SIGTERM and SIGKILL on cancellation (default: `5`).
    pub kill_grace_secs: u64,
    /// Bound of each WebSocket client's outbound queue (default: `256`).
    pub client_queue_capacity: usize,
    /// Seconds without inbound traffic before a client is dropped
    /// (default: `60`). Pings go out at nine tenths of this.
    pub ws_pong_wait_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `8080`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `HISTORY_CAPACITY`      | `100`                      |
    /// | `TEST_BASE_URL`         | `http://localhost:3000`    |
    /// | `TEST_PROJECT_DIR`      | unset                      |
    /// | `RUN_TIMEOUT_SECS`      | `1800`                     |
    /// | `KILL_GRACE_SECS`       | `5`                        |
    /// | `CLIENT_QUEUE_CAPACITY` | `256`                      |
    /// | `WS_PONG_WAIT_SECS`     | `60`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let history_capacity: usize = std::env::var("HISTORY_CAPACITY")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .expect("HISTORY_CAPACITY must be a valid usize");

        let test_base_url =
            std::env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let test_project_dir = std::env::var("TEST_PROJECT_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let run_timeout_secs: u64 = std::env::var("RUN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".into())
            .parse()
            .expect("RUN_TIMEOUT_SECS must be a valid u64");

        let kill_grace_secs: u64 = std::env::var("KILL_GRACE_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("KILL_GRACE_SECS must be a valid u64");

        let client_queue_capacity: usize = std::env::var("CLIENT_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "256".into())
            .parse()
            .expect("CLIENT_QUEUE_CAPACITY must be a valid usize");

        let ws_pong_wait_secs: u64 = std::env::var("WS_PONG_WAIT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("WS_PONG_WAIT_SECS must be a valid u64");

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            history_capacity,
            test_base_url,
            test_project_dir,
            run_timeout_secs,
            kill_grace_secs,
            client_queue_capacity,
            ws_pong_wait_secs,
        };
        assert!(
            config.connection_settings().is_valid(),
            "WS_PONG_WAIT_SECS must be at least 1"
        );
        config
    }

    /// Per-client keep-alive timing derived from `ws_pong_wait_secs`.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings::with_pong_wait(Duration::from_secs(self.ws_pong_wait_secs))
    }

    /// Settings shared by every framework execution strategy.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            program: DEFAULT_PROGRAM.to_string(),
            base_url: self.test_base_url.clone(),
            project_dir: self.test_project_dir.clone(),
            run_timeout: Duration::from_secs(self.run_timeout_secs),
            kill_grace: Duration::from_secs(self.kill_grace_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::keepalive::{PING_PERIOD, PONG_WAIT};

    fn config(ws_pong_wait_secs: u64) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
            history_capacity: 100,
            test_base_url: "http://localhost:3000".into(),
            test_project_dir: None,
            run_timeout_secs: 60,
            kill_grace_secs: 1,
            client_queue_capacity: 8,
            ws_pong_wait_secs,
        }
    }

    #[test]
    fn default_pong_wait_matches_keepalive_constants() {
        let settings = config(60).connection_settings();
        assert_eq!(settings.pong_wait, PONG_WAIT);
        assert_eq!(settings.ping_period, PING_PERIOD);
        assert!(settings.is_valid());
    }

    #[test]
    fn zero_pong_wait_is_invalid() {
        assert!(!config(0).connection_settings().is_valid());
        assert!(config(1).connection_settings().is_valid());
    }
}
