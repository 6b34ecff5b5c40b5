//! Test execution strategy interface and shared types.
//!
//! Defines [`TestExecutor`], the trait every framework strategy implements,
//! along with the [`CommandSpec`] a strategy builds, the captured
//! [`ExecutionOutput`] and [`ExecutionError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::run::RunInvocation;

/// Default program used to launch node-based test runners.
pub const DEFAULT_PROGRAM: &str = "npx";

/// Config key that overrides the base URL for a single run.
pub const BASE_URL_CONFIG_KEY: &str = "base_url";

/// Settings shared by every framework strategy.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Launcher for the test runner (default: `npx`).
    pub program: String,
    /// Base URL of the system under test.
    pub base_url: String,
    /// Working directory for spawned processes (uses current dir if `None`).
    pub project_dir: Option<String>,
    /// Hard wall-clock limit per run.
    pub run_timeout: Duration,
    /// Time between SIGTERM and SIGKILL when a run is cancelled.
    pub kill_grace: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            base_url: "http://localhost:3000".to_string(),
            project_dir: None,
            run_timeout: Duration::from_secs(30 * 60),
            kill_grace: Duration::from_secs(5),
        }
    }
}

/// A fully-resolved external invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Additional environment variables set for the child process.
    pub env_vars: Vec<(String, String)>,
    pub working_directory: Option<String>,
    pub timeout: Duration,
    pub kill_grace: Duration,
}

impl CommandSpec {
    /// Build the invocation for `run`: framework base-URL variable, run
    /// metadata, and every config entry exported under the framework's
    /// prefix.
    pub fn for_run(
        settings: &ExecutorSettings,
        run: &RunInvocation,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        let framework = run.framework;

        let base_url = match run.config.get(BASE_URL_CONFIG_KEY) {
            Some(serde_json::Value::String(url)) => url.clone(),
            Some(other) => {
                tracing::debug!(
                    run_id = %run.run_id,
                    value = %other,
                    "Ignoring non-string base_url override",
                );
                settings.base_url.clone()
            }
            None => settings.base_url.clone(),
        };

        let mut env_vars = vec![
            (framework.base_url_var().to_string(), base_url),
            ("TEST_ENV".to_string(), run.environment.clone()),
            ("CI".to_string(), "true".to_string()),
            ("SYNCWATCH_RUN_ID".to_string(), run.run_id.to_string()),
        ];

        for (key, value) in run.config_strings() {
            if key == BASE_URL_CONFIG_KEY {
                continue;
            }
            env_vars.push((
                format!("{}{}", framework.env_prefix(), env_key(key)),
                value,
            ));
        }

        Self {
            program: program.into(),
            args,
            env_vars,
            working_directory: settings.project_dir.clone(),
            timeout: settings.run_timeout,
            kill_grace: settings.kill_grace,
        }
    }
}

/// Upper-case a config key and replace anything outside `[A-Z0-9_]`.
fn env_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Captured output from a test process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionOutput {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Errors that can occur while executing a test run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The process could not be started (launcher missing, bad cwd, ...).
    #[error("Failed to start test process: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting on the process failed.
    #[error("I/O error while waiting for test process: {0}")]
    Io(#[source] std::io::Error),

    /// The run exceeded its wall-clock limit and was killed.
    #[error("Test process timed out after {elapsed_ms}ms")]
    Timeout {
        elapsed_ms: u64,
        output: ExecutionOutput,
    },

    /// The run's cancellation token fired and the process was terminated.
    #[error("Test process was cancelled")]
    Cancelled { output: ExecutionOutput },

    /// The process exited with a non-zero code (usually: tests failed).
    #[error("Test process exited with code {exit_code}")]
    Failed {
        exit_code: i32,
        output: ExecutionOutput,
    },
}

impl ExecutionError {
    /// Output captured before the error, if the process ran at all.
    pub fn output(&self) -> Option<&ExecutionOutput> {
        match self {
            Self::Timeout { output, .. } | Self::Cancelled { output } | Self::Failed { output, .. } => {
                Some(output)
            }
            Self::Spawn(_) | Self::Io(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Strategy implemented by every framework runner.
///
/// Implementations build an external invocation bound to `cancel`, run it
/// and return the captured output. Cancellation must terminate any process
/// the strategy spawned.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(
        &self,
        run: &RunInvocation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, ExecutionError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
