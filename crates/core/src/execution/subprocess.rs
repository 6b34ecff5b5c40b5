//! Cancellable subprocess runner shared by every framework strategy.
//!
//! Each strategy builds a [`CommandSpec`]; [`run_command`] spawns it in its
//! own process group, captures stdout/stderr, and races the exit against the
//! run's timeout and cancellation token. On timeout or cancellation the whole
//! group receives SIGTERM, then SIGKILL once the grace period elapses.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::{CommandSpec, ExecutionError, ExecutionOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose runners.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to wait for output readers after the process is gone. Orphaned
/// grandchildren can hold the pipes open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawn `spec`, capture its output and wait for it to exit, time out, or be
/// cancelled through `cancel`.
pub async fn run_command(
    spec: &CommandSpec,
    cancel: &CancellationToken,
) -> Result<ExecutionOutput, ExecutionError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so cancellation reaches the runner's children too
    // (npx → node → browser).
    #[cfg(unix)]
    cmd.process_group(0);

    for (key, value) in &spec.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &spec.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(ExecutionError::Spawn)?;

    tracing::debug!(
        program = %spec.program,
        pid = child.id(),
        "Spawned test process",
    );

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = tokio::time::sleep(spec.timeout) => Outcome::TimedOut,
        _ = cancel.cancelled() => Outcome::Cancelled,
    };

    let exit_code = match &outcome {
        Outcome::Exited(Ok(status)) => status.code().unwrap_or(-1),
        Outcome::Exited(Err(_)) => -1,
        Outcome::TimedOut | Outcome::Cancelled => {
            terminate(&mut child, spec.kill_grace).await;
            -1
        }
    };

    let output = ExecutionOutput {
        stdout: drain(stdout_task).await,
        stderr: drain(stderr_task).await,
        exit_code,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    match outcome {
        Outcome::Exited(Ok(status)) if status.success() => Ok(output),
        Outcome::Exited(Ok(_)) => Err(ExecutionError::Failed { exit_code, output }),
        Outcome::Exited(Err(e)) => Err(ExecutionError::Io(e)),
        Outcome::TimedOut => Err(ExecutionError::Timeout {
            elapsed_ms: output.duration_ms,
            output,
        }),
        Outcome::Cancelled => Err(ExecutionError::Cancelled { output }),
    }
}

/// SIGTERM the child's process group, wait up to `grace`, then SIGKILL.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let pgid = pid as libc::pid_t;
        // SAFETY: `pgid` is the group of a child we spawned and have not
        // reaped yet, so it cannot have been recycled.
        unsafe {
            libc::kill(-pgid, libc::SIGTERM);
        }

        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            // Leader is gone; make sure stragglers in the group follow.
            // SAFETY: as above; ESRCH is harmless if the group is empty.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
            return;
        }

        tracing::warn!(pid, "Test process ignored SIGTERM, sending SIGKILL");
        // SAFETY: as above.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Kill after termination failed");
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

async fn drain(task: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            tracing::debug!("Output reader still blocked after process exit");
            String::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn bash(script: &str) -> CommandSpec {
        CommandSpec {
            program: "bash".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env_vars: vec![],
            working_directory: None,
            timeout: Duration::from_secs(10),
            kill_grace: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let output = run_command(&bash("echo out; echo err >&2"), &CancellationToken::new())
            .await
            .expect("execute");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn applies_env_vars_and_working_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut spec = bash("echo $MY_VAR; pwd");
        spec.env_vars = vec![("MY_VAR".to_string(), "hello_world".to_string())];
        spec.working_directory = Some(dir.path().to_str().expect("path").to_string());

        let output = run_command(&spec, &CancellationToken::new())
            .await
            .expect("execute");
        assert!(output.stdout.contains("hello_world"));
        let expected = dir.path().canonicalize().expect("canonicalize");
        let expected = expected.to_str().expect("path");
        assert!(
            output.stdout.trim().ends_with(expected.trim_start_matches('/')),
            "pwd output '{}' should match '{}'",
            output.stdout.trim(),
            expected
        );
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed_with_output() {
        let result = run_command(&bash("echo partial; exit 3"), &CancellationToken::new()).await;
        assert_matches!(
            result,
            Err(ExecutionError::Failed { exit_code: 3, output }) if output.stdout.contains("partial")
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let mut spec = bash("true");
        spec.program = "/nonexistent/test-runner".to_string();
        let result = run_command(&spec, &CancellationToken::new()).await;
        assert_matches!(result, Err(ExecutionError::Spawn(_)));
    }

    #[tokio::test]
    async fn timeout_kills_process() {
        let mut spec = bash("sleep 60");
        spec.timeout = Duration::from_millis(200);
        let started = Instant::now();
        let result = run_command(&spec, &CancellationToken::new()).await;
        assert_matches!(result, Err(ExecutionError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancellation_sends_sigterm_to_process() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let marker = dir.path().join("terminated");
        let script = format!(
            "trap 'echo term > {}; exit 143' TERM; echo started; sleep 30 & wait",
            marker.display()
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let result = run_command(&bash(&script), &cancel).await;
        assert_matches!(
            result,
            Err(ExecutionError::Cancelled { output }) if output.stdout.contains("started")
        );
        assert!(marker.exists(), "process should have received SIGTERM");
    }

    #[tokio::test]
    async fn sigterm_ignoring_process_is_killed_after_grace() {
        let mut spec = bash("trap '' TERM; sleep 60");
        spec.kill_grace = Duration::from_millis(200);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let result = run_command(&spec, &cancel).await;
        assert_matches!(result, Err(ExecutionError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
