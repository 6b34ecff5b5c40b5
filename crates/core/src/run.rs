//! Run, result and diagnostic records.
//!
//! A [`Run`] is created `queued` at submission time and is only ever mutated
//! by the orchestrator. Its [`Results`] counters are written once, after the
//! external execution finishes and its output has been parsed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::execution::BASE_URL_CONFIG_KEY;
use crate::framework::Framework;
use crate::types::{RunId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a test-suite selector.
pub const MAX_TEST_SUITE_LEN: usize = 1_024;

/// Maximum length of an environment label.
pub const MAX_ENVIRONMENT_LEN: usize = 64;

/// Maximum number of user-supplied config entries.
pub const MAX_CONFIG_ENTRIES: usize = 50;

/// Environment label used when a submission omits one.
pub const DEFAULT_ENVIRONMENT: &str = "local";

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// `completed`, `failed` and `cancelled` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Severity attached to a [`SyncIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// A single normalized test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub status: TestCaseStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCase {
    pub fn passed(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestCaseStatus::Passed,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, duration_ms: u64, error: Option<String>) -> Self {
        Self {
            name: name.into(),
            status: TestCaseStatus::Failed,
            duration_ms,
            error,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestCaseStatus::Skipped,
            duration_ms: 0,
            error: None,
        }
    }
}

/// A suspected frontend/backend inconsistency derived from a failed case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncIssue {
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub remediation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case: Option<String>,
}

/// Aggregate counters. `total` is always derived, never set independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestSummary {
    /// Counts come from untrusted runner output, so the parts are clamped
    /// until their sum fits in `u32`.
    pub fn from_counts(passed: u32, failed: u32, skipped: u32) -> Self {
        let failed = failed.min(u32::MAX - passed);
        let skipped = skipped.min(u32::MAX - passed - failed);
        Self {
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
        }
    }

    pub fn from_cases(cases: &[TestCase]) -> Self {
        let count = |status| cases.iter().filter(|c| c.status == status).count() as u32;
        Self::from_counts(
            count(TestCaseStatus::Passed),
            count(TestCaseStatus::Failed),
            count(TestCaseStatus::Skipped),
        )
    }
}

/// Normalized parser output, ready to be recorded into [`Results`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResults {
    pub summary: TestSummary,
    pub test_cases: Vec<TestCase>,
}

/// The mutable result record owned by a [`Run`].
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    pub run_id: RunId,
    pub status: RunStatus,
    #[serde(flatten)]
    pub summary: TestSummary,
    pub test_cases: Vec<TestCase>,
    pub sync_issues: Vec<SyncIssue>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    recorded: bool,
}

impl Results {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Queued,
            summary: TestSummary::default(),
            test_cases: Vec::new(),
            sync_issues: Vec::new(),
            duration_ms: 0,
            error: None,
            recorded: false,
        }
    }

    /// Record parsed counters and cases. Counters are write-once: a second
    /// call is ignored and returns `false`.
    pub fn record(&mut self, parsed: ParsedResults) -> bool {
        if self.recorded {
            return false;
        }
        self.summary = parsed.summary;
        self.test_cases.extend(parsed.test_cases);
        self.recorded = true;
        true
    }

    /// Failed cases, in output order.
    pub fn failed_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases
            .iter()
            .filter(|c| c.status == TestCaseStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One submitted test-execution job and its tracked lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: RunId,
    pub framework: Framework,
    pub test_suite: String,
    pub environment: String,
    pub config: BTreeMap<String, serde_json::Value>,
    pub status: RunStatus,
    pub start_time: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    #[serde(skip)]
    pub cancel: CancellationToken,
    pub results: Results,
}

impl Run {
    /// Create a `queued` run from a validated submission.
    pub fn new(id: RunId, framework: Framework, request: SubmitRun) -> Self {
        let environment = if request.environment.trim().is_empty() {
            DEFAULT_ENVIRONMENT.to_string()
        } else {
            request.environment.trim().to_string()
        };

        Self {
            id,
            framework,
            test_suite: request.test_suite.trim().to_string(),
            environment,
            config: request.config,
            status: RunStatus::Queued,
            start_time: chrono::Utc::now(),
            end_time: None,
            cancel: CancellationToken::new(),
            results: Results::new(id),
        }
    }

    /// Move to `status`, mirroring it into the results record. Terminal
    /// statuses stamp the end time. A run that already reached a terminal
    /// status is left untouched and `false` is returned.
    pub fn transition(&mut self, status: RunStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.results.status = status;
        if status.is_terminal() {
            self.end_time = Some(chrono::Utc::now());
        }
        true
    }

    /// Immutable view of the run handed to an execution strategy.
    pub fn invocation(&self) -> RunInvocation {
        RunInvocation {
            run_id: self.id,
            framework: self.framework,
            test_suite: self.test_suite.clone(),
            environment: self.environment.clone(),
            config: self.config.clone(),
        }
    }
}

/// What an execution strategy needs to know about a run.
#[derive(Debug, Clone)]
pub struct RunInvocation {
    pub run_id: RunId,
    pub framework: Framework,
    pub test_suite: String,
    pub environment: String,
    pub config: BTreeMap<String, serde_json::Value>,
}

impl RunInvocation {
    /// Config entries rendered as strings (JSON strings unquoted, everything
    /// else in its JSON form).
    pub fn config_strings(&self) -> impl Iterator<Item = (&str, String)> {
        self.config.iter().map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), rendered)
        })
    }
}

// ---------------------------------------------------------------------------
// Submission DTOs
// ---------------------------------------------------------------------------

/// Request body for submitting a new run.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRun {
    pub framework: String,
    #[serde(default)]
    pub test_suite: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl SubmitRun {
    /// Validate the submission and resolve its framework.
    pub fn validate(&self) -> Result<Framework, CoreError> {
        let framework: Framework = self.framework.parse()?;

        if self.test_suite.len() > MAX_TEST_SUITE_LEN {
            return Err(CoreError::Validation(format!(
                "test_suite exceeds maximum length of {MAX_TEST_SUITE_LEN} characters (got {})",
                self.test_suite.len()
            )));
        }
        if self.test_suite.contains('\0') {
            return Err(CoreError::Validation(
                "test_suite must not contain NUL bytes".to_string(),
            ));
        }
        // The suite is passed positionally; a leading dash would be read as
        // a runner option.
        if self.test_suite.trim_start().starts_with('-') {
            return Err(CoreError::Validation(
                "test_suite must not start with '-'".to_string(),
            ));
        }

        let environment = self.environment.trim();
        if environment.len() > MAX_ENVIRONMENT_LEN {
            return Err(CoreError::Validation(format!(
                "environment exceeds maximum length of {MAX_ENVIRONMENT_LEN} characters (got {})",
                environment.len()
            )));
        }
        if !environment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(CoreError::Validation(format!(
                "environment '{environment}' may only contain letters, digits, '-', '_' and '.'"
            )));
        }

        if self.config.len() > MAX_CONFIG_ENTRIES {
            return Err(CoreError::Validation(format!(
                "Too many config entries: {} (max {MAX_CONFIG_ENTRIES})",
                self.config.len()
            )));
        }
        if self.config.keys().any(|k| k.trim().is_empty()) {
            return Err(CoreError::Validation(
                "config keys must not be empty".to_string(),
            ));
        }
        if let Some(base_url) = self.config.get(BASE_URL_CONFIG_KEY) {
            if !base_url.is_string() {
                return Err(CoreError::Validation(format!(
                    "config.{BASE_URL_CONFIG_KEY} must be a string"
                )));
            }
        }

        Ok(framework)
    }
}

/// Response returned immediately after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedRun {
    pub run_id: RunId,
    pub status: RunStatus,
    pub start_time: Timestamp,
    pub framework: Framework,
    pub environment: String,
    /// Static per-framework estimate, in seconds.
    pub estimated_duration: u64,
}

impl From<&Run> for SubmittedRun {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            start_time: run.start_time,
            framework: run.framework,
            environment: run.environment.clone(),
            estimated_duration: run.framework.estimated_duration().as_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
