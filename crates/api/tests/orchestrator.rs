//! Integration tests for `RunOrchestrator`.
//!
//! Runs are executed by real bash scripts through `ShellExecutor`, so these
//! tests exercise the full path: subprocess, parser, analyzer, history and
//! notifications.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use common::{recording_orchestrator, shell_executors, wait_for_file, wait_for_history};
use syncwatch_core::error::CoreError;
use syncwatch_core::execution::{ExecutionError, ExecutionOutput, ExecutorSet, TestExecutor};
use syncwatch_core::messages::MessageType;
use syncwatch_core::run::{RunInvocation, RunStatus, SubmitRun};

fn request(framework: &str) -> SubmitRun {
    SubmitRun {
        framework: framework.to_string(),
        test_suite: "e2e/checkout".to_string(),
        environment: "staging".to_string(),
        config: Default::default(),
    }
}

/// Strategy that panics instead of running anything.
struct PanickingExecutor;

#[async_trait]
impl TestExecutor for PanickingExecutor {
    async fn execute(
        &self,
        _run: &RunInvocation,
        _cancel: CancellationToken,
    ) -> Result<ExecutionOutput, ExecutionError> {
        panic!("executor exploded");
    }
}

// ---------------------------------------------------------------------------
// Test: submit returns immediately with a queued run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_queued_run() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("sleep 0.2"), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");

    assert_eq!(submitted.status, RunStatus::Queued);
    assert_eq!(submitted.environment, "staging");
    assert_eq!(submitted.estimated_duration, 60);

    let results = orchestrator.get_result(submitted.run_id).await.expect("live run");
    assert_eq!(results.run_id, submitted.run_id);

    wait_for_history(&orchestrator, submitted.run_id).await;
}

// ---------------------------------------------------------------------------
// Test: malformed JSON falls back to the heuristic parser
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_json_still_completes_with_counts() {
    let script = r#"
echo '{"numTotalTests": 3, "testResults": [ {"assertionResults": oops'
echo '  ✓ adds numbers (3 ms)'
echo '  ✓ subtracts numbers'
"#;
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors(script), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    let summary = run.results.summary;
    assert_eq!(
        summary.total,
        summary.passed + summary.failed + summary.skipped
    );
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 0);
}

// ---------------------------------------------------------------------------
// Test: absurd summary counts do not fail the run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overflowing_summary_counts_still_complete() {
    let script = "echo 'Tests: 4294967295 passed, 1 failed'";
    let (orchestrator, notifier) = recording_orchestrator(shell_executors(script), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.results.error.is_none());
    let summary = run.results.summary;
    assert_eq!(summary.total, u32::MAX);
    assert_eq!(
        u64::from(summary.total),
        u64::from(summary.passed) + u64::from(summary.failed) + u64::from(summary.skipped)
    );
    assert_eq!(
        notifier.statuses(submitted.run_id),
        vec!["queued", "running", "completed"]
    );
}

// ---------------------------------------------------------------------------
// Test: structured output is decoded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn structured_jest_output_populates_results() {
    let script = r#"
cat <<'JSON'
{"numTotalTests":2,"numPassedTests":1,"numFailedTests":1,"numPendingTests":0,
 "testResults":[{"name":"cart.test.js","assertionResults":[
   {"fullName":"cart adds item","status":"passed","duration":12},
   {"fullName":"cart loads prices","status":"failed","duration":30,
    "failureMessages":["TypeError: Cannot read properties of undefined (reading 'price')"]}
 ]}]}
JSON
exit 1
"#;
    let (orchestrator, notifier) = recording_orchestrator(shell_executors(script), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.results.summary.total, 2);
    assert_eq!(run.results.summary.failed, 1);
    assert_eq!(run.results.test_cases.len(), 2);

    assert_eq!(run.results.sync_issues.len(), 1);
    assert_eq!(run.results.sync_issues[0].category, "data_mismatch");
    assert_eq!(
        run.results.sync_issues[0].test_case.as_deref(),
        Some("cart loads prices")
    );

    let alerts = notifier.payloads(MessageType::Alert, submitted.run_id);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["issues"].as_array().map(Vec::len), Some(1));
}

// ---------------------------------------------------------------------------
// Test: notifications follow queued -> running -> terminal, exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exactly_one_terminal_notification_after_leaving_live_map() {
    let (orchestrator, notifier) =
        recording_orchestrator(shell_executors("echo '  ✓ works'"), 10);

    let submitted = orchestrator.submit(request("vitest")).await.expect("submit");
    wait_for_history(&orchestrator, submitted.run_id).await;

    // Give any stray duplicate a chance to show up.
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        notifier.statuses(submitted.run_id),
        vec!["queued", "running", "completed"]
    );
    assert_eq!(orchestrator.active_runs().await, 0);

    let terminal = notifier
        .payloads(MessageType::StatusUpdate, submitted.run_id)
        .pop()
        .expect("terminal payload");
    assert_eq!(terminal["total"], 1);
    assert_eq!(terminal["passed"], 1);
    assert!(terminal["end_time"].is_string());
}

// ---------------------------------------------------------------------------
// Test: cancelling mid-run terminates the process
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_mid_run_settles_cancelled_and_signals_process() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let ready = dir.path().join("ready");
    let marker = dir.path().join("terminated");
    let script = format!(
        "trap 'echo term > {marker}; exit 143' TERM; touch {ready}; sleep 30 & wait",
        marker = marker.display(),
        ready = ready.display(),
    );
    let (orchestrator, notifier) = recording_orchestrator(shell_executors(&script), 10);

    let submitted = orchestrator.submit(request("cypress")).await.expect("submit");
    wait_for_file(&ready).await;

    orchestrator.cancel(submitted.run_id).await.expect("cancel");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.results.status, RunStatus::Cancelled);
    assert!(run.end_time.is_some());
    assert!(marker.exists(), "process should have received SIGTERM");
    assert_eq!(
        notifier.statuses(submitted.run_id),
        vec!["queued", "running", "cancelled"]
    );
}

// ---------------------------------------------------------------------------
// Test: cancelling right after submit never yields completed/failed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_immediately_after_submit_wins() {
    let (orchestrator, notifier) = recording_orchestrator(shell_executors("echo '  ✓ fast'"), 10);

    let submitted = orchestrator.submit(request("playwright")).await.expect("submit");
    orchestrator.cancel(submitted.run_id).await.expect("cancel");

    let run = wait_for_history(&orchestrator, submitted.run_id).await;
    assert_eq!(run.status, RunStatus::Cancelled);

    let statuses = notifier.statuses(submitted.run_id);
    assert_eq!(statuses.last().map(String::as_str), Some("cancelled"));
    assert_eq!(
        statuses.iter().filter(|s| *s == "cancelled").count(),
        1,
        "terminal notification emitted once: {statuses:?}"
    );
}

// ---------------------------------------------------------------------------
// Test: cancelling a live run twice is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_twice_is_noop_while_live() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("sleep 5"), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    orchestrator.cancel(submitted.run_id).await.expect("first cancel");

    // Either still live (no-op) or already finished (not found).
    let second = orchestrator.cancel(submitted.run_id).await;
    assert!(matches!(second, Ok(()) | Err(CoreError::RunNotFound(_))));

    let run = wait_for_history(&orchestrator, submitted.run_id).await;
    assert_eq!(run.status, RunStatus::Cancelled);
}

// ---------------------------------------------------------------------------
// Test: finished and unknown runs cannot be cancelled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_finished_run_is_not_found() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("true"), 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    wait_for_history(&orchestrator, submitted.run_id).await;

    assert_matches!(
        orchestrator.cancel(submitted.run_id).await,
        Err(CoreError::RunNotFound(id)) if id == submitted.run_id
    );

    let unknown = uuid::Uuid::new_v4();
    assert_matches!(
        orchestrator.cancel(unknown).await,
        Err(CoreError::RunNotFound(_))
    );
}

// ---------------------------------------------------------------------------
// Test: unsupported framework is rejected synchronously
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_framework_is_rejected() {
    let (orchestrator, notifier) = recording_orchestrator(shell_executors("true"), 10);

    let result = orchestrator.submit(request("mocha")).await;

    assert_matches!(result, Err(CoreError::UnsupportedFramework(name)) if name == "mocha");
    assert_eq!(orchestrator.active_runs().await, 0);
    assert!(notifier.events().is_empty());
}

// ---------------------------------------------------------------------------
// Test: unknown run id is not found
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_result_unknown_run_is_not_found() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("true"), 10);

    assert_matches!(
        orchestrator.get_result(uuid::Uuid::new_v4()).await,
        Err(CoreError::RunNotFound(_))
    );
}

// ---------------------------------------------------------------------------
// Test: history is bounded and evicts the oldest run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_evicts_oldest_when_full() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("true"), 2);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let submitted = orchestrator.submit(request("jest")).await.expect("submit");
        wait_for_history(&orchestrator, submitted.run_id).await;
        ids.push(submitted.run_id);
    }

    let history: Vec<_> = orchestrator.history(None).await.iter().map(|r| r.id).collect();
    assert_eq!(history, ids[1..]);

    assert_matches!(
        orchestrator.get_result(ids[0]).await,
        Err(CoreError::RunNotFound(_))
    );

    let latest: Vec<_> = orchestrator.history(Some(1)).await.iter().map(|r| r.id).collect();
    assert_eq!(latest, vec![ids[2]]);
}

// ---------------------------------------------------------------------------
// Test: a panicking strategy fails the run without crashing anything
// ---------------------------------------------------------------------------

#[tokio::test]
async fn panicking_executor_fails_run_and_moves_it_to_history() {
    let executors = ExecutorSet::uniform(Arc::new(PanickingExecutor));
    let (orchestrator, notifier) = recording_orchestrator(executors, 10);

    let submitted = orchestrator.submit(request("jest")).await.expect("submit");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .results
        .error
        .as_deref()
        .is_some_and(|e| e.contains("executor exploded")));
    assert_eq!(orchestrator.active_runs().await, 0);
    assert_eq!(
        notifier.statuses(submitted.run_id),
        vec!["queued", "running", "failed"]
    );

    // The orchestrator keeps serving new runs.
    let next = orchestrator.submit(request("vitest")).await.expect("submit");
    wait_for_history(&orchestrator, next.run_id).await;
}

// ---------------------------------------------------------------------------
// Test: a missing launcher is recorded as a failed run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spawn_failure_is_recorded_as_failed() {
    let settings = syncwatch_core::execution::ExecutorSettings {
        program: "/nonexistent/npx".to_string(),
        ..common::test_executor_settings()
    };
    let (orchestrator, _notifier) = recording_orchestrator(ExecutorSet::new(settings), 10);

    let submitted = orchestrator.submit(request("playwright")).await.expect("submit");
    let run = wait_for_history(&orchestrator, submitted.run_id).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.results.summary.total, 0);
    assert!(run.results.error.is_some());
}

// ---------------------------------------------------------------------------
// Test: cancel_all settles every live run
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_all_drains_live_runs() {
    let (orchestrator, _notifier) = recording_orchestrator(shell_executors("sleep 30"), 10);

    let a = orchestrator.submit(request("jest")).await.expect("submit");
    let b = orchestrator.submit(request("vitest")).await.expect("submit");

    assert_eq!(orchestrator.cancel_all().await, 2);
    assert!(orchestrator.wait_idle(Duration::from_secs(10)).await);

    for id in [a.run_id, b.run_id] {
        let results = orchestrator.get_result(id).await.expect("in history");
        assert_eq!(results.status, RunStatus::Cancelled);
    }
}
