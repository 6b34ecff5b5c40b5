//! Custom shell-command strategy.
//!
//! Runs a fixed `bash -c` script with the same environment a framework
//! strategy would export. Useful for projects that wrap their runner in a
//! script (`make e2e`, `./scripts/test.sh`) and for exercising the
//! orchestrator without a node toolchain.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::executor::{CommandSpec, ExecutionError, ExecutionOutput, ExecutorSettings, TestExecutor};
use super::subprocess;
use crate::run::RunInvocation;

/// Executor for an arbitrary bash script.
pub struct ShellExecutor {
    script: String,
    settings: Arc<ExecutorSettings>,
}

impl ShellExecutor {
    pub fn new(script: impl Into<String>, settings: Arc<ExecutorSettings>) -> Self {
        Self {
            script: script.into(),
            settings,
        }
    }
}

#[async_trait]
impl TestExecutor for ShellExecutor {
    async fn execute(
        &self,
        run: &RunInvocation,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutput, ExecutionError> {
        let spec = CommandSpec::for_run(
            &self.settings,
            run,
            "bash",
            vec!["-c".to_string(), self.script.clone()],
        );
        subprocess::run_command(&spec, &cancel).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
