//! Node-based framework strategies.
//!
//! Each strategy differs only in the runner arguments it passes; process
//! handling lives in [`subprocess`](super::subprocess).

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::executor::{CommandSpec, ExecutionError, ExecutionOutput, ExecutorSettings, TestExecutor};
use super::subprocess;
use crate::run::RunInvocation;

/// `npx cypress run --reporter json [--spec <suite>]`
pub struct CypressExecutor {
    settings: Arc<ExecutorSettings>,
}

/// `npx playwright test [<suite>] --reporter=json`
pub struct PlaywrightExecutor {
    settings: Arc<ExecutorSettings>,
}

/// `npx jest [<suite>] --json`
pub struct JestExecutor {
    settings: Arc<ExecutorSettings>,
}

/// `npx vitest run [<suite>] --reporter=json`
pub struct VitestExecutor {
    settings: Arc<ExecutorSettings>,
}

impl CypressExecutor {
    pub fn new(settings: Arc<ExecutorSettings>) -> Self {
        Self { settings }
    }

    fn args(run: &RunInvocation) -> Vec<String> {
        let mut args = vec!["cypress", "run", "--reporter", "json"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        if !run.test_suite.is_empty() {
            args.push("--spec".to_string());
            args.push(run.test_suite.clone());
        }
        args
    }
}

impl PlaywrightExecutor {
    pub fn new(settings: Arc<ExecutorSettings>) -> Self {
        Self { settings }
    }

    fn args(run: &RunInvocation) -> Vec<String> {
        let mut args = vec!["playwright".to_string(), "test".to_string()];
        if !run.test_suite.is_empty() {
            args.push(run.test_suite.clone());
        }
        args.push("--reporter=json".to_string());
        args
    }
}

impl JestExecutor {
    pub fn new(settings: Arc<ExecutorSettings>) -> Self {
        Self { settings }
    }

    fn args(run: &RunInvocation) -> Vec<String> {
        let mut args = vec!["jest".to_string()];
        if !run.test_suite.is_empty() {
            args.push(run.test_suite.clone());
        }
        args.push("--json".to_string());
        args
    }
}

impl VitestExecutor {
    pub fn new(settings: Arc<ExecutorSettings>) -> Self {
        Self { settings }
    }

    fn args(run: &RunInvocation) -> Vec<String> {
        let mut args = vec!["vitest".to_string(), "run".to_string()];
        if !run.test_suite.is_empty() {
            args.push(run.test_suite.clone());
        }
        args.push("--reporter=json".to_string());
        args
    }
}

macro_rules! node_strategy {
    ($executor:ty) => {
        #[async_trait]
        impl TestExecutor for $executor {
            async fn execute(
                &self,
                run: &RunInvocation,
                cancel: CancellationToken,
            ) -> Result<ExecutionOutput, ExecutionError> {
                let spec = CommandSpec::for_run(
                    &self.settings,
                    run,
                    self.settings.program.clone(),
                    Self::args(run),
                );
                subprocess::run_command(&spec, &cancel).await
            }
        }
    };
}

node_strategy!(CypressExecutor);
node_strategy!(PlaywrightExecutor);
node_strategy!(JestExecutor);
node_strategy!(VitestExecutor);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::execution::test_helpers::invocation;
    use crate::framework::Framework;

    #[test]
    fn cypress_passes_spec_flag() {
        let run = invocation(Framework::Cypress);
        assert_eq!(
            CypressExecutor::args(&run),
            vec!["cypress", "run", "--reporter", "json", "--spec", "e2e/login"]
        );
    }

    #[test]
    fn empty_suite_runs_everything() {
        let mut run = invocation(Framework::Jest);
        run.test_suite.clear();
        assert_eq!(JestExecutor::args(&run), vec!["jest", "--json"]);
        assert_eq!(
            PlaywrightExecutor::args(&run),
            vec!["playwright", "test", "--reporter=json"]
        );
        assert_eq!(
            VitestExecutor::args(&run),
            vec!["vitest", "run", "--reporter=json"]
        );
    }

    #[tokio::test]
    async fn missing_launcher_surfaces_spawn_error() {
        let settings = Arc::new(ExecutorSettings {
            program: "/nonexistent/npx".to_string(),
            ..ExecutorSettings::default()
        });
        let result = JestExecutor::new(settings)
            .execute(&invocation(Framework::Jest), CancellationToken::new())
            .await;
        assert_matches!(result, Err(ExecutionError::Spawn(_)));
    }
}
