//! Decoder for the Jest `--json` schema (also emitted by Vitest's JSON
//! reporter).

use serde::Deserialize;

use super::{decode_json, millis};
use crate::run::{ParsedResults, TestCase, TestSummary};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestReport {
    num_total_tests: u32,
    #[serde(default)]
    num_passed_tests: u32,
    #[serde(default)]
    num_failed_tests: u32,
    #[serde(default)]
    num_pending_tests: u32,
    #[serde(default)]
    num_todo_tests: u32,
    test_results: Vec<JestFileResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestFileResult {
    #[serde(default)]
    assertion_results: Vec<JestAssertion>,
    /// Suite-level failure (syntax error, failed import) with no assertions.
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JestAssertion {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    status: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    failure_messages: Vec<String>,
}

/// Decode Jest/Vitest JSON output. Returns `None` when the output does not
/// follow the schema.
pub fn decode(output: &str) -> Option<ParsedResults> {
    let report: JestReport = decode_json(output)?;

    let mut test_cases = Vec::new();
    for file in &report.test_results {
        for assertion in &file.assertion_results {
            let name = assertion
                .full_name
                .clone()
                .or_else(|| assertion.title.clone())
                .unwrap_or_else(|| "unnamed test".to_string());
            let duration = millis(assertion.duration);

            let case = match assertion.status.as_str() {
                "passed" => TestCase::passed(name, duration),
                "failed" => {
                    let error = if assertion.failure_messages.is_empty() {
                        None
                    } else {
                        Some(assertion.failure_messages.join("\n"))
                    };
                    TestCase::failed(name, duration, error)
                }
                // pending, skipped, todo, disabled
                _ => TestCase::skipped(name),
            };
            test_cases.push(case);
        }

        if file.assertion_results.is_empty() {
            if let Some(message) = file.message.as_deref().filter(|m| !m.trim().is_empty()) {
                let name = file.name.clone().unwrap_or_else(|| "test file".to_string());
                test_cases.push(TestCase::failed(name, 0, Some(message.to_string())));
            }
        }
    }

    let summary = if test_cases.is_empty() {
        TestSummary::from_counts(
            report.num_passed_tests,
            report.num_failed_tests,
            report.num_pending_tests.saturating_add(report.num_todo_tests),
        )
    } else {
        TestSummary::from_cases(&test_cases)
    };

    if test_cases.is_empty() && summary.total != report.num_total_tests {
        tracing::debug!(
            reported = report.num_total_tests,
            derived = summary.total,
            "Jest total disagrees with per-status counts",
        );
    }

    Some(ParsedResults {
        summary,
        test_cases,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
