//! Run orchestrator: owns live and finished runs and drives each run from
//! `queued` to a terminal status.
//!
//! Every submission gets its own supervised tokio task. The supervisor wraps
//! an inner task so that a panic inside a strategy, the parser or the
//! analyzer still lands the run in history as `failed`.
//!
//! All run state sits behind one `RwLock`; critical sections only touch the
//! live map and the history buffer. Execution, parsing and analysis happen
//! outside the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use syncwatch_core::analyzer;
use syncwatch_core::error::CoreError;
use syncwatch_core::execution::{ExecutionError, ExecutionOutput, ExecutorSet, TestExecutor};
use syncwatch_core::framework::Framework;
use syncwatch_core::messages::MessageType;
use syncwatch_core::parser;
use syncwatch_core::run::{
    ParsedResults, Results, Run, RunInvocation, RunStatus, SubmitRun, SubmittedRun,
};
use syncwatch_core::types::RunId;

use super::history::RunHistory;
use super::notifier::RunNotifier;

/// Live and finished runs, guarded together so the move from one to the
/// other is atomic for readers.
struct RunRegistry {
    live: HashMap<RunId, Run>,
    history: RunHistory,
}

/// How a run's task ended.
enum RunOutcome {
    /// The strategy returned; `results` holds parsed counters and issues.
    Executed {
        status: RunStatus,
        results: Results,
        error: Option<String>,
    },
    /// Cancelled before the strategy was dispatched.
    Skipped,
    /// The job task panicked or was aborted.
    Fault(String),
}

/// Coordinates submitted runs.
///
/// Construct once, wrap in `Arc`, and hand clones to every caller.
pub struct RunOrchestrator {
    registry: RwLock<RunRegistry>,
    executors: ExecutorSet,
    notifier: Arc<dyn RunNotifier>,
}

impl RunOrchestrator {
    pub fn new(
        executors: ExecutorSet,
        notifier: Arc<dyn RunNotifier>,
        history_capacity: usize,
    ) -> Self {
        Self {
            registry: RwLock::new(RunRegistry {
                live: HashMap::new(),
                history: RunHistory::new(history_capacity),
            }),
            executors,
            notifier,
        }
    }

    /// Validate `request`, register a `queued` run and start it in the
    /// background. Returns as soon as the run is registered.
    pub async fn submit(self: &Arc<Self>, request: SubmitRun) -> Result<SubmittedRun, CoreError> {
        let framework = request.validate()?;
        let executor = self
            .executors
            .get(framework)
            .ok_or_else(|| CoreError::UnsupportedFramework(framework.to_string()))?;

        let run = Run::new(uuid::Uuid::new_v4(), framework, request);
        let run_id = run.id;
        let submitted = SubmittedRun::from(&run);
        let invocation = run.invocation();
        let cancel = run.cancel.clone();
        let queued = status_payload(&run);

        self.registry.write().await.live.insert(run_id, run);

        tracing::info!(
            run_id = %run_id,
            framework = %framework,
            environment = %submitted.environment,
            "Run queued",
        );
        self.notifier.notify(MessageType::StatusUpdate, queued);

        tokio::spawn(Arc::clone(self).supervise(run_id, executor, invocation, cancel));

        Ok(submitted)
    }

    /// Results for `run_id`, looking at live runs first, then history.
    pub async fn get_result(&self, run_id: RunId) -> Result<Results, CoreError> {
        let registry = self.registry.read().await;
        registry
            .live
            .get(&run_id)
            .or_else(|| registry.history.get(&run_id))
            .map(|run| run.results.clone())
            .ok_or(CoreError::RunNotFound(run_id))
    }

    /// Cancel a live run. The run settles in `cancelled` regardless of how
    /// its execution ends. Finished or unknown runs yield `RunNotFound`;
    /// cancelling an already-cancelled live run is a no-op.
    pub async fn cancel(&self, run_id: RunId) -> Result<(), CoreError> {
        let mut registry = self.registry.write().await;
        let run = registry
            .live
            .get_mut(&run_id)
            .ok_or(CoreError::RunNotFound(run_id))?;

        if run.transition(RunStatus::Cancelled) {
            tracing::info!(run_id = %run_id, "Run cancelled");
        }
        run.cancel.cancel();
        Ok(())
    }

    /// The most recent `limit` finished runs, most-recent-last.
    pub async fn history(&self, limit: Option<usize>) -> Vec<Run> {
        self.registry.read().await.history.recent(limit)
    }

    /// Number of runs not yet moved to history.
    pub async fn active_runs(&self) -> usize {
        self.registry.read().await.live.len()
    }

    /// Cancel every live run. Used on shutdown.
    pub async fn cancel_all(&self) -> usize {
        let mut registry = self.registry.write().await;
        let mut count = 0;
        for run in registry.live.values_mut() {
            if run.transition(RunStatus::Cancelled) {
                count += 1;
            }
            run.cancel.cancel();
        }
        count
    }

    /// Wait until no live runs remain or `timeout` elapses. Returns whether
    /// the orchestrator drained.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.active_runs().await == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    // -----------------------------------------------------------------------
    // Job task
    // -----------------------------------------------------------------------

    /// Task boundary: run the job on an inner task and turn a panic into a
    /// `failed` run.
    async fn supervise(
        self: Arc<Self>,
        run_id: RunId,
        executor: Arc<dyn TestExecutor>,
        invocation: RunInvocation,
        cancel: CancellationToken,
    ) {
        let job = tokio::spawn(Arc::clone(&self).execute(run_id, executor, invocation, cancel));

        if let Err(e) = job.await {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                "Run task was aborted".to_string()
            };
            tracing::error!(run_id = %run_id, error = %reason, "Run task faulted");
            self.finalize(run_id, RunOutcome::Fault(reason)).await;
        }
    }

    async fn execute(
        self: Arc<Self>,
        run_id: RunId,
        executor: Arc<dyn TestExecutor>,
        invocation: RunInvocation,
        cancel: CancellationToken,
    ) {
        let Some(running) = self.mark_running(run_id).await else {
            self.finalize(run_id, RunOutcome::Skipped).await;
            return;
        };
        tracing::info!(run_id = %run_id, framework = %invocation.framework, "Run started");
        self.notifier.notify(MessageType::StatusUpdate, running);

        let outcome = executor.execute(&invocation, cancel.clone()).await;
        let cancelled = cancel.is_cancelled()
            || matches!(&outcome, Err(e) if e.is_cancelled());

        let outcome = evaluate(run_id, invocation.framework, outcome, cancelled);
        self.finalize(run_id, outcome).await;
    }

    /// `queued` → `running`. Returns the notification payload, or `None`
    /// when the run was cancelled (or vanished) before it could start.
    async fn mark_running(&self, run_id: RunId) -> Option<serde_json::Value> {
        let mut registry = self.registry.write().await;
        let run = registry.live.get_mut(&run_id)?;
        if run.status != RunStatus::Queued {
            return None;
        }
        run.transition(RunStatus::Running);
        Some(status_payload(run))
    }

    /// Record the outcome, move the run to history and emit its terminal
    /// notification. Runs no longer in the live map are ignored, so each run
    /// is finalized at most once.
    async fn finalize(&self, run_id: RunId, outcome: RunOutcome) {
        let (terminal, alert, status) = {
            let mut registry = self.registry.write().await;
            let Some(mut run) = registry.live.remove(&run_id) else {
                return;
            };

            match outcome {
                RunOutcome::Executed {
                    status,
                    results,
                    error,
                } => {
                    run.results.record(ParsedResults {
                        summary: results.summary,
                        test_cases: results.test_cases,
                    });
                    run.results.sync_issues = results.sync_issues;
                    run.results.duration_ms = results.duration_ms;
                    run.results.error = error;
                    run.transition(status);
                }
                RunOutcome::Skipped => {
                    run.results.record(ParsedResults::default());
                    run.transition(RunStatus::Cancelled);
                }
                RunOutcome::Fault(reason) => {
                    run.results.record(ParsedResults::default());
                    run.results.error = Some(reason);
                    // A concurrent cancel keeps its status.
                    run.transition(RunStatus::Failed);
                }
            }

            let terminal = terminal_payload(&run);
            let alert = (!run.results.sync_issues.is_empty()).then(|| {
                json!({
                    "run_id": run.id,
                    "issues": run.results.sync_issues,
                })
            });
            let status = run.status;

            if let Some(evicted) = registry.history.push(run) {
                tracing::debug!(run_id = %evicted.id, "Evicted run from history");
            }
            (terminal, alert, status)
        };

        tracing::info!(run_id = %run_id, status = status.as_str(), "Run finished");
        self.notifier.notify(MessageType::StatusUpdate, terminal);
        if let Some(alert) = alert {
            self.notifier.notify(MessageType::Alert, alert);
        }
    }
}

/// Turn the strategy's return value into a final status plus parsed,
/// analyzed results. Parsing is skipped for cancelled runs.
fn evaluate(
    run_id: RunId,
    framework: Framework,
    outcome: Result<ExecutionOutput, ExecutionError>,
    cancelled: bool,
) -> RunOutcome {
    let (output, error) = match &outcome {
        Ok(output) => (Some(output), None),
        Err(e) => {
            tracing::debug!(run_id = %run_id, error = %e, "Test execution returned an error");
            (e.output(), Some(e.to_string()))
        }
    };

    let mut results = Results::new(run_id);
    results.duration_ms = output.map(|o| o.duration_ms).unwrap_or_default();

    if cancelled {
        results.record(ParsedResults::default());
        return RunOutcome::Executed {
            status: RunStatus::Cancelled,
            results,
            error: None,
        };
    }

    let parsed = output
        .map(|o| parser::parse_output(framework, &o.combined()))
        .unwrap_or_default();
    results.record(parsed);
    results.sync_issues = analyzer::analyze(&results);

    let status = if error.is_some() {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    };

    RunOutcome::Executed {
        status,
        results,
        error,
    }
}

fn status_payload(run: &Run) -> serde_json::Value {
    json!({
        "run_id": run.id,
        "status": run.status,
        "framework": run.framework,
        "environment": run.environment,
        "start_time": run.start_time,
        "end_time": run.end_time,
    })
}

fn terminal_payload(run: &Run) -> serde_json::Value {
    let mut payload = status_payload(run);
    let summary = run.results.summary;
    if let Some(map) = payload.as_object_mut() {
        map.insert("total".into(), summary.total.into());
        map.insert("passed".into(), summary.passed.into());
        map.insert("failed".into(), summary.failed.into());
        map.insert("skipped".into(), summary.skipped.into());
        map.insert("duration_ms".into(), run.results.duration_ms.into());
        map.insert("issues".into(), run.results.sync_issues.len().into());
        if let Some(error) = &run.results.error {
            map.insert("error".into(), error.clone().into());
        }
    }
    payload
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Run task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Run task panicked: {s}")
    } else {
        "Run task panicked".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_exit_is_failed_but_still_parsed() {
        let output = ExecutionOutput {
            stdout: "  ✓ renders\n  ✗ saves\n".to_string(),
            exit_code: 1,
            ..Default::default()
        };
        let outcome = evaluate(
            uuid::Uuid::new_v4(),
            Framework::Jest,
            Err(ExecutionError::Failed {
                exit_code: 1,
                output,
            }),
            false,
        );
        match outcome {
            RunOutcome::Executed {
                status,
                results,
                error,
            } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(results.summary.passed, 1);
                assert_eq!(results.summary.failed, 1);
                assert!(error.is_some());
            }
            _ => panic!("expected executed outcome"),
        }
    }

    #[test]
    fn cancelled_outcome_skips_parsing() {
        let output = ExecutionOutput {
            stdout: "  ✓ renders\n".to_string(),
            ..Default::default()
        };
        let outcome = evaluate(
            uuid::Uuid::new_v4(),
            Framework::Jest,
            Err(ExecutionError::Cancelled { output }),
            true,
        );
        match outcome {
            RunOutcome::Executed {
                status, results, ..
            } => {
                assert_eq!(status, RunStatus::Cancelled);
                assert_eq!(results.summary.total, 0);
                assert!(results.test_cases.is_empty());
            }
            _ => panic!("expected executed outcome"),
        }
    }

    #[test]
    fn spawn_error_is_failed_with_empty_counts() {
        let outcome = evaluate(
            uuid::Uuid::new_v4(),
            Framework::Cypress,
            Err(ExecutionError::Spawn(std::io::Error::other("no npx"))),
            false,
        );
        match outcome {
            RunOutcome::Executed {
                status,
                results,
                error,
            } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(results.summary.total, 0);
                assert!(error.unwrap_or_default().contains("Failed to start"));
            }
            _ => panic!("expected executed outcome"),
        }
    }

    #[test]
    fn panic_message_extracts_payload() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed), "Run task panicked: boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed), "Run task panicked: bang");
    }
}
