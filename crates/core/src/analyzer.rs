//! Sync-issue triage over failed test cases.
//!
//! Each failed case's error text is matched against known signatures of
//! frontend/backend drift. The first matching category produces one
//! [`SyncIssue`]; unmatched failures produce nothing.

use crate::run::{Results, Severity, SyncIssue, TestCase};

/// A known failure signature.
struct IssueRule {
    category: &'static str,
    /// Lower-case substrings, any of which triggers the rule.
    needles: &'static [&'static str],
    severity: Severity,
    description: &'static str,
    remediation: &'static str,
}

/// Rules in priority order. Timing wins over data because a timed-out
/// request usually also reports an `undefined` payload.
const RULES: &[IssueRule] = &[
    IssueRule {
        category: "timing",
        needles: &["timeout", "timed out", "etimedout"],
        severity: Severity::Warning,
        description: "Test timed out waiting for the backend",
        remediation: "Check for slow API responses or add explicit waits for async data before asserting",
    },
    IssueRule {
        category: "connectivity",
        needles: &["econnrefused", "network error", "fetch failed", "socket hang up"],
        severity: Severity::Critical,
        description: "Frontend could not reach the backend",
        remediation: "Verify the backend is running and the configured base URL points at it",
    },
    IssueRule {
        category: "data_mismatch",
        needles: &["undefined", "null", "expected", "response", "status code", "schema"],
        severity: Severity::Critical,
        description: "Frontend received data that does not match its expectations",
        remediation: "Compare the API response shape with the frontend contract and update whichever side drifted",
    },
];

/// Derive sync issues from the failed cases in `results`.
pub fn analyze(results: &Results) -> Vec<SyncIssue> {
    results.failed_cases().filter_map(diagnose).collect()
}

/// Match a single failed case against [`RULES`].
fn diagnose(case: &TestCase) -> Option<SyncIssue> {
    let error = case.error.as_deref()?.to_lowercase();
    let rule = RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| error.contains(needle)))?;

    Some(SyncIssue {
        category: rule.category.to_string(),
        description: format!("{}: {}", rule.description, case.name),
        severity: rule.severity,
        remediation: rule.remediation.to_string(),
        test_case: Some(case.name.clone()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
