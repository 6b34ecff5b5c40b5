//! Decoder for Cypress runs using the mocha `json` reporter.

use serde::Deserialize;

use super::{decode_json, millis};
use crate::run::{ParsedResults, TestCase, TestSummary};

#[derive(Debug, Deserialize)]
struct MochaReport {
    stats: MochaStats,
    #[serde(default)]
    tests: Vec<MochaTest>,
    #[serde(default)]
    passes: Vec<MochaTest>,
    #[serde(default)]
    failures: Vec<MochaTest>,
    #[serde(default)]
    pending: Vec<MochaTest>,
}

#[derive(Debug, Deserialize)]
struct MochaStats {
    #[serde(default)]
    passes: u32,
    #[serde(default)]
    failures: u32,
    #[serde(default)]
    pending: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MochaTest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    full_title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    err: Option<MochaError>,
}

#[derive(Debug, Default, Deserialize)]
struct MochaError {
    #[serde(default)]
    message: Option<String>,
}

impl MochaTest {
    fn name(&self) -> String {
        self.full_title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.title.clone())
    }

    fn error_message(&self) -> Option<String> {
        self.err
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.is_empty())
    }
}

/// Decode mocha JSON output. Returns `None` when the output does not follow
/// the schema.
pub fn decode(output: &str) -> Option<ParsedResults> {
    let report: MochaReport = decode_json(output)?;

    let mut test_cases = Vec::new();
    if report.passes.is_empty() && report.failures.is_empty() && report.pending.is_empty() {
        // Older reporters only emit `tests`; an error object marks a failure.
        for test in &report.tests {
            let case = match test.error_message() {
                Some(message) => TestCase::failed(test.name(), millis(test.duration), Some(message)),
                None => TestCase::passed(test.name(), millis(test.duration)),
            };
            test_cases.push(case);
        }
    } else {
        test_cases.extend(
            report
                .passes
                .iter()
                .map(|t| TestCase::passed(t.name(), millis(t.duration))),
        );
        test_cases.extend(
            report
                .failures
                .iter()
                .map(|t| TestCase::failed(t.name(), millis(t.duration), t.error_message())),
        );
        test_cases.extend(report.pending.iter().map(|t| TestCase::skipped(t.name())));
    }

    let summary = if test_cases.is_empty() {
        TestSummary::from_counts(
            report.stats.passes,
            report.stats.failures,
            report.stats.pending,
        )
    } else {
        TestSummary::from_cases(&test_cases)
    };

    Some(ParsedResults {
        summary,
        test_cases,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
